use crate::error::{BenchError, Result};
use crate::types::{ProxyEndpoint, TargetSet};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const CONFIG_FILE_NAME: &str = "proxies.toml";

pub const MAX_STABILITY_ATTEMPTS: u32 = 1000;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// 运行参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 稳定性测试的重复次数
    pub stability_attempts: u32,
    pub ping_timeout_secs: u64,
    pub speed_timeout_secs: u64,
    /// 同时测试的代理数上限, 0 = 不限制
    pub max_concurrency: usize,
    /// 同一个代理的稳定性样本是否并发发送
    pub concurrent_samples: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stability_attempts: 5,
            ping_timeout_secs: 10,
            speed_timeout_secs: 20,
            max_concurrency: 0,
            concurrent_samples: false,
        }
    }
}

impl Settings {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn speed_timeout(&self) -> Duration {
        Duration::from_secs(self.speed_timeout_secs)
    }

    pub fn concurrency_limit(&self) -> Option<usize> {
        (self.max_concurrency > 0).then_some(self.max_concurrency)
    }
}

/// 一次运行所需的全部输入: 代理池 + 目标 URL + 参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub targets: TargetSet,
    #[serde(default)]
    pub settings: Settings,
    pub proxies: Vec<ProxyEndpoint>,
}

impl Config {
    /// Parse from TOML, or JSON when `path` ends in `.json`.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(content)?
        } else {
            toml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.proxies.is_empty() {
            return Err(BenchError::Custom("No proxies configured.".to_string()));
        }

        let mut seen = HashSet::new();
        for proxy in &self.proxies {
            if proxy.name.trim().is_empty() {
                return Err(BenchError::Custom(format!(
                    "Proxy with url '{}' has an empty name.",
                    proxy.masked_url()
                )));
            }
            if !seen.insert(proxy.name.as_str()) {
                return Err(BenchError::DuplicateProxy(proxy.name.clone()));
            }
            check_http_url(&proxy.url)?;
        }

        check_http_url(&self.targets.ping)?;
        check_http_url(&self.targets.speed)?;

        if !(1..=MAX_STABILITY_ATTEMPTS).contains(&self.settings.stability_attempts) {
            return Err(BenchError::Custom(format!(
                "stability_attempts must be between 1 and {}.",
                MAX_STABILITY_ATTEMPTS
            )));
        }
        for secs in [self.settings.ping_timeout_secs, self.settings.speed_timeout_secs] {
            if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
                return Err(BenchError::Custom(format!(
                    "Timeouts must be between 1 and {} seconds.",
                    MAX_TIMEOUT_SECS
                )));
            }
        }
        Ok(())
    }
}

fn check_http_url(raw: &str) -> Result<()> {
    let url = reqwest::Url::parse(raw).map_err(|e| BenchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "http" | "https" => Err(BenchError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        }),
        other => Err(BenchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// 默认配置文件位置: ~/.config/proxyrank/proxies.toml (按平台不同)
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "proxyrank").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load the configuration
/// Strategy:
/// 1. Explicit `--config` path
/// 2. Fallback to the user config directory
pub async fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            BenchError::Custom("Cannot determine the user config directory.".to_string())
        })?,
    };

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(BenchError::ConfigNotFound(path.display().to_string()));
    }

    let content = tokio::fs::read_to_string(&path).await?;
    let config = Config::parse(&content, &path)?;
    info!(
        "Loaded {} proxies from {}",
        config.proxies.len(),
        path.display()
    );
    Ok(config)
}
