//! Pacer
//!
//! 所有等待（话题查询间隔、首帧轮询、发布后冷却）都通过此接口进行，
//! 便于测试中替换为记录型实现

use std::time::Duration;

/// 等待接口
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    /// 等待指定时长
    async fn pause(&self, duration: Duration);
}

/// 基于 tokio 计时器的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}
