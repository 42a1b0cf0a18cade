use crate::config::Settings;
use crate::traits::Probe;
use crate::types::{Metric, ProbeMode, ProxyEndpoint, TargetSet};
use std::time::Duration;
use tracing::debug;

/// 按指标分派到具体的测量策略
pub async fn measure_metric(
    metric: Metric,
    probe: &dyn Probe,
    endpoint: &ProxyEndpoint,
    targets: &TargetSet,
    settings: &Settings,
) -> Option<Duration> {
    match metric {
        Metric::Ping => ping(probe, endpoint, &targets.ping, settings.ping_timeout()).await,
        Metric::Stability => {
            stability(
                probe,
                endpoint,
                &targets.ping,
                settings.ping_timeout(),
                settings.stability_attempts,
                settings.concurrent_samples,
            )
            .await
        }
        Metric::Speed => speed(probe, endpoint, &targets.speed, settings.speed_timeout()).await,
    }
}

/// 单次延迟: 收到响应头即停表
pub async fn ping(
    probe: &dyn Probe,
    endpoint: &ProxyEndpoint,
    url: &str,
    timeout: Duration,
) -> Option<Duration> {
    probe
        .measure(endpoint, url, timeout, ProbeMode::Headers)
        .await
        .elapsed()
}

/// Repeats the ping `attempts` times and averages the successful samples.
///
/// Returns `None` when no attempt succeeded. Samples run one after another
/// unless `concurrent` is set; either way all of them finish before the mean
/// is taken.
pub async fn stability(
    probe: &dyn Probe,
    endpoint: &ProxyEndpoint,
    url: &str,
    timeout: Duration,
    attempts: u32,
    concurrent: bool,
) -> Option<Duration> {
    let samples: Vec<Option<Duration>> = if concurrent {
        let tasks = (0..attempts).map(|_| ping(probe, endpoint, url, timeout));
        futures::future::join_all(tasks).await
    } else {
        let mut samples = Vec::new();
        for _ in 0..attempts {
            samples.push(ping(probe, endpoint, url, timeout).await);
        }
        samples
    };

    let ok: Vec<Duration> = samples.into_iter().flatten().collect();
    debug!(
        proxy = %endpoint.name,
        succeeded = ok.len(),
        attempts,
        "stability samples collected"
    );
    mean(&ok)
}

/// 下载大文件: body 读完才停表
pub async fn speed(
    probe: &dyn Probe,
    endpoint: &ProxyEndpoint,
    url: &str,
    timeout: Duration,
) -> Option<Duration> {
    probe
        .measure(endpoint, url, timeout, ProbeMode::DrainBody)
        .await
        .elapsed()
}

/// 算术平均; 空集合返回 None 而不是 0
pub fn mean(samples: &[Duration]) -> Option<Duration> {
    if samples.is_empty() {
        return None;
    }
    let total: Duration = samples.iter().sum();
    Some(total / samples.len() as u32)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ProbeFailure;
    use crate::types::ProbeOutcome;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes per proxy name and records every
    /// call it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedProbe {
        scripts: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
        pub(crate) calls: Mutex<Vec<(String, String, Duration, ProbeMode)>>,
    }

    impl ScriptedProbe {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn script(self, name: &str, outcomes: Vec<ProbeOutcome>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(name.to_string(), outcomes.into());
            self
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn measure(
            &self,
            endpoint: &ProxyEndpoint,
            url: &str,
            timeout: Duration,
            mode: ProbeMode,
        ) -> ProbeOutcome {
            self.calls.lock().unwrap().push((
                endpoint.name.clone(),
                url.to_string(),
                timeout,
                mode,
            ));
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&endpoint.name)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| ProbeOutcome::Failure(ProbeFailure::Connection("unscripted".into())))
        }
    }

    pub(crate) fn ok(secs: f64) -> ProbeOutcome {
        ProbeOutcome::Success(Duration::from_secs_f64(secs))
    }

    pub(crate) fn timeout() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeFailure::Timeout(Duration::from_secs(10)))
    }

    pub(crate) fn refused() -> ProbeOutcome {
        ProbeOutcome::Failure(ProbeFailure::Connection("refused".into()))
    }

    fn proxy(name: &str) -> ProxyEndpoint {
        ProxyEndpoint::new(name, "http://127.0.0.1:1")
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(
            mean(&[Duration::from_secs(1), Duration::from_secs(3)]),
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_ping_uses_headers_mode() {
        let probe = ScriptedProbe::new().script("A", vec![ok(0.5)]);
        let result = ping(&probe, &proxy("A"), "https://google.com", Duration::from_secs(10)).await;

        assert_eq!(result, Some(Duration::from_millis(500)));
        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].3, ProbeMode::Headers);
    }

    #[tokio::test]
    async fn test_stability_averages_only_successes() {
        let probe = ScriptedProbe::new().script(
            "A",
            vec![refused(), ok(1.0), timeout(), ok(3.0), refused()],
        );
        let result = stability(&probe, &proxy("A"), "u", Duration::from_secs(10), 5, false).await;

        assert_eq!(result, Some(Duration::from_secs(2)));
        assert_eq!(probe.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_stability_all_failed_is_absent() {
        let probe = ScriptedProbe::new().script("A", vec![refused(), timeout(), refused()]);
        let result = stability(&probe, &proxy("A"), "u", Duration::from_secs(10), 3, true).await;

        assert_eq!(result, None);
        assert_eq!(probe.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_and_refusal_are_treated_alike() {
        let probe = ScriptedProbe::new()
            .script("A", vec![timeout()])
            .script("B", vec![refused()]);
        let t = Duration::from_secs(10);

        assert_eq!(ping(&probe, &proxy("A"), "u", t).await, None);
        assert_eq!(ping(&probe, &proxy("B"), "u", t).await, None);
    }

    #[tokio::test]
    async fn test_measure_metric_routes_targets_and_timeouts() {
        let probe = ScriptedProbe::new().script("A", vec![ok(4.32)]);
        let targets = TargetSet {
            ping: "http://ping.test".into(),
            speed: "http://speed.test/10Mb.dat".into(),
        };
        let settings = Settings::default();

        let result = measure_metric(Metric::Speed, &probe, &proxy("A"), &targets, &settings).await;
        assert_eq!(result, Some(Duration::from_secs_f64(4.32)));

        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls[0].1, "http://speed.test/10Mb.dat");
        assert_eq!(calls[0].2, Duration::from_secs(20));
        assert_eq!(calls[0].3, ProbeMode::DrainBody);
    }
}
