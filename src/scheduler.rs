use crate::config::{Config, Settings};
use crate::strategy;
use crate::traits::Probe;
use crate::types::{Metric, MetricResult, ProxyEndpoint, TargetSet};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// 一次完整运行的结果
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    pub results: Vec<(Metric, MetricResult)>,
}

impl RunResults {
    pub fn get(&self, metric: Metric) -> Option<&MetricResult> {
        self.results.iter().find(|(m, _)| *m == metric).map(|(_, r)| r)
    }
}

/// 并发调度器
///
/// 每一轮 (pass) 为池中的每个代理 spawn 一个任务，
/// 任务的返回值按代理在池中的位置归属, 与完成顺序无关。
/// 任何一个代理失败 / 超时 / panic 都只会让它自己在结果里缺席。
pub struct Scheduler {
    pool: Arc<[ProxyEndpoint]>,
    targets: Arc<TargetSet>,
    settings: Arc<Settings>,
    probe: Arc<dyn Probe>,
    limit: Option<Arc<Semaphore>>,
    show_progress: bool,
}

impl Scheduler {
    pub fn new(config: Config, probe: Arc<dyn Probe>) -> Self {
        let limit = config
            .settings
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            pool: config.proxies.into(),
            targets: Arc::new(config.targets),
            settings: Arc::new(config.settings),
            probe,
            limit,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 依次跑完给定的指标 (每个指标内部是并发的)
    pub async fn run(&self, metrics: &[Metric]) -> RunResults {
        let mut results = Vec::with_capacity(metrics.len());
        for &metric in metrics {
            results.push((metric, self.run_metric(metric).await));
        }
        RunResults { results }
    }

    /// 对整个代理池并发执行一项指标
    ///
    /// 逻辑:
    /// 1. 为每个代理生成一个任务 (tokio::spawn)，受可选的信号量限制
    /// 2. 并行等待所有任务完成 (join_all)
    /// 3. 按池中顺序把结果写入 MetricResult; JoinError 记为缺席
    pub async fn run_metric(&self, metric: Metric) -> MetricResult {
        let started = Instant::now();
        info!(
            "Starting {} pass over {} proxies (per-proxy budget {:?})",
            metric,
            self.pool.len(),
            self.per_proxy_budget(metric)
        );
        let pb = self.progress_bar(metric);

        let handles = self.pool.iter().cloned().map(|endpoint| {
            let probe = self.probe.clone();
            let targets = self.targets.clone();
            let settings = self.settings.clone();
            let limit = self.limit.clone();
            let pb = pb.clone();

            tokio::spawn(async move {
                // 信号量从不 close, acquire 不会失败
                let _permit = match limit {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                let value =
                    strategy::measure_metric(metric, probe.as_ref(), &endpoint, &targets, &settings)
                        .await;
                pb.inc(1);
                value
            })
        });

        let joined = futures::future::join_all(handles).await;
        pb.finish_and_clear();

        let mut result = MetricResult::new();
        for (endpoint, outcome) in self.pool.iter().zip(joined) {
            let value = match outcome {
                Ok(value) => value,
                Err(e) => {
                    error!(proxy = %endpoint.name, %metric, "measurement task failed: {}", e);
                    None
                }
            };
            debug!(proxy = %endpoint.name, %metric, ?value, "collected");
            result.insert(&endpoint.name, value);
        }

        info!(
            "{} pass finished: {}/{} proxies answered in {:.2?}",
            metric,
            result.success_count(),
            result.len(),
            started.elapsed()
        );
        result
    }

    fn progress_bar(&self, metric: Metric) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(self.pool.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("|| "));
        }
        pb.set_message(format!("Testing {}...", metric));
        pb
    }

    /// Upper bound of a single proxy's work for `metric`, without queueing.
    pub fn per_proxy_budget(&self, metric: Metric) -> Duration {
        match metric {
            Metric::Ping => self.settings.ping_timeout(),
            Metric::Stability if self.settings.concurrent_samples => self.settings.ping_timeout(),
            Metric::Stability => self
                .settings
                .ping_timeout()
                .saturating_mul(self.settings.stability_attempts),
            Metric::Speed => self.settings.speed_timeout(),
        }
    }
}
