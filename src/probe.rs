use crate::error::ProbeFailure;
use crate::traits::Probe;
use crate::types::{ProbeMode, ProbeOutcome, ProxyEndpoint};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 走真实网络的探测器
///
/// 每次测量都新建一个只走该代理的 Client，不复用连接，
/// 这样每个样本都包含完整的 (代理) 建连耗时。
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }

    fn client_for(endpoint: &ProxyEndpoint, timeout: Duration) -> Result<Client, ProbeFailure> {
        let proxy = reqwest::Proxy::all(&endpoint.url)
            .map_err(|e| ProbeFailure::Connection(format!("invalid proxy url: {}", e)))?;

        Client::builder()
            .proxy(proxy)
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeFailure::Connection(format!("failed to build client: {}", e)))
    }

    async fn run(
        endpoint: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
        mode: ProbeMode,
    ) -> Result<Duration, ProbeFailure> {
        let client = Self::client_for(endpoint, timeout)?;
        let start = Instant::now();

        let mut resp = client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeFailure::from_send(&e, timeout))?;

        if resp.status() != StatusCode::OK {
            return Err(ProbeFailure::Protocol(format!("HTTP {}", resp.status())));
        }

        if mode == ProbeMode::DrainBody {
            // 必须把 body 读完再停表，否则测到的只是首包时间
            let mut received: u64 = 0;
            while let Some(chunk) = resp
                .chunk()
                .await
                .map_err(|e| ProbeFailure::from_body(&e, timeout))?
            {
                received += chunk.len() as u64;
            }
            debug!(proxy = %endpoint.name, bytes = received, "body drained");
        }

        Ok(start.elapsed())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn measure(
        &self,
        endpoint: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
        mode: ProbeMode,
    ) -> ProbeOutcome {
        // 外层的墙钟超时兜底: 超时后 future 被丢弃，Client 和 socket 随之关闭
        let result = match tokio::time::timeout(timeout, Self::run(endpoint, url, timeout, mode)).await {
            Ok(inner) => inner,
            Err(_) => Err(ProbeFailure::Timeout(timeout)),
        };

        match result {
            Ok(elapsed) => {
                debug!(proxy = %endpoint.name, url, ?elapsed, "probe succeeded");
                ProbeOutcome::Success(elapsed)
            }
            Err(reason) => {
                warn!(
                    proxy = %endpoint.name,
                    via = %endpoint.masked_url(),
                    url,
                    "probe failed: {}",
                    reason
                );
                ProbeOutcome::Failure(reason)
            }
        }
    }
}
