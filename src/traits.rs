use crate::types::{ProbeMode, ProbeOutcome, ProxyEndpoint};
use async_trait::async_trait;
use std::time::Duration;

/// Probe: 所有测量实现必须提供的接口
#[async_trait]
pub trait Probe: Sync + Send {
    /// 通过 `endpoint` 代理请求 `url`，在 `timeout` 内完成一次测量
    ///
    /// 实现必须把所有错误 (连接 / 超时 / 状态码 / body 中断) 转换为
    /// `ProbeOutcome::Failure`，不能 panic 或返回 Err。
    async fn measure(
        &self,
        endpoint: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
        mode: ProbeMode,
    ) -> ProbeOutcome;
}
