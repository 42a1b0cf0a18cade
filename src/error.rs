use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Duplicate proxy name: {0}")]
    DuplicateProxy(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, BenchError>;

/// 单次探测失败的原因
///
/// 这些错误只会出现在 `ProbeOutcome::Failure` 里，永远不会向上传播。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// 代理不可达 / 拒绝连接 / DNS / TLS 失败
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// 非 200 状态码或畸形响应
    #[error("protocol error: {0}")]
    Protocol(String),

    /// body 读取中途中断
    #[error("transfer interrupted: {0}")]
    Transfer(String),
}

impl ProbeFailure {
    /// Classify a reqwest error raised while sending the request.
    pub fn from_send(err: &reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            ProbeFailure::Timeout(timeout)
        } else if err.is_connect() {
            ProbeFailure::Connection(error_chain(err))
        } else if err.is_body() || err.is_decode() {
            ProbeFailure::Transfer(error_chain(err))
        } else if err.is_status() || err.is_redirect() {
            ProbeFailure::Protocol(error_chain(err))
        } else if err.is_request() && !has_io_source(err) {
            // 代理回了无法解析的响应 (hyper 解析错误), 不是 socket 层面的问题
            ProbeFailure::Protocol(error_chain(err))
        } else {
            ProbeFailure::Connection(error_chain(err))
        }
    }

    /// Classify a reqwest error raised while draining the body.
    pub fn from_body(err: &reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            ProbeFailure::Timeout(timeout)
        } else {
            ProbeFailure::Transfer(error_chain(err))
        }
    }
}

fn has_io_source(err: &dyn std::error::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.is::<std::io::Error>() {
            return true;
        }
        source = inner.source();
    }
    false
}

// reqwest 的 Display 只有最外层信息，把 source 链拼起来 (跳过重复的部分)
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = inner.source();
    }
    msg
}
