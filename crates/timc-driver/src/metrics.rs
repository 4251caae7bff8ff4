//! 链路指标模块
//!
//! 原子计数器，用于监控链路健康状态与各通道的流量。所有计数器都可以在任意
//! 线程读取，不引入锁竞争。

use crate::channel::Channel;
use std::sync::atomic::{AtomicU64, Ordering};
use timc_protocol::Reply;

/// 链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use timc_driver::{Channel, LinkMetrics};
/// use std::sync::atomic::Ordering;
///
/// let metrics = LinkMetrics::new();
/// metrics.exchanges[Channel::Control.index()].fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.exchanges_total(), 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 各通道完成的交换次数（按 [`Channel::index`] 下标）
    pub exchanges: [AtomicU64; Channel::COUNT],

    /// 分发线程空闲轮询次数
    pub idle_cycles: AtomicU64,

    /// 链路层 I/O 错误次数（已按空响应处理）
    pub transport_errors: AtomicU64,

    /// `!` 响应次数
    pub bad_execution: AtomicU64,

    /// `#` 响应次数
    pub cannot_execute: AtomicU64,

    /// `$` 响应次数
    pub timeouts: AtomicU64,

    /// 空响应（链路断开）次数
    pub link_down: AtomicU64,

    /// 无法分类的响应次数
    pub unclassified: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按分类累计
    pub fn record_reply(&self, reply: &Reply) {
        let counter = match reply {
            Reply::Data(_) | Reply::Ack => return,
            Reply::BadExecution => &self.bad_execution,
            Reply::CannotExecute => &self.cannot_execute,
            Reply::Timeout => &self.timeouts,
            Reply::LinkDown => &self.link_down,
            Reply::Unclassified(_) => &self.unclassified,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges: std::array::from_fn(|i| self.exchanges[i].load(Ordering::Relaxed)),
            idle_cycles: self.idle_cycles.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            bad_execution: self.bad_execution.load(Ordering::Relaxed),
            cannot_execute: self.cannot_execute.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            link_down: self.link_down.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in &self.exchanges {
            counter.store(0, Ordering::Relaxed);
        }
        self.idle_cycles.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.bad_execution.store(0, Ordering::Relaxed);
        self.cannot_execute.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.link_down.store(0, Ordering::Relaxed);
        self.unclassified.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub exchanges: [u64; Channel::COUNT],
    pub idle_cycles: u64,
    pub transport_errors: u64,
    pub bad_execution: u64,
    pub cannot_execute: u64,
    pub timeouts: u64,
    pub link_down: u64,
    pub unclassified: u64,
}

impl MetricsSnapshot {
    pub fn exchanges_total(&self) -> u64 {
        self.exchanges.iter().sum()
    }

    pub fn exchanges_on(&self, channel: Channel) -> u64 {
        self.exchanges[channel.index()]
    }

    /// 失败分类总数
    pub fn failures_total(&self) -> u64 {
        self.bad_execution + self.cannot_execute + self.timeouts + self.link_down + self.unclassified
    }

    /// 失败率（百分比）
    pub fn failure_rate(&self) -> f64 {
        let total = self.exchanges_total();
        if total == 0 {
            0.0
        } else {
            (self.failures_total() as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_reply() {
        let metrics = LinkMetrics::new();
        metrics.record_reply(&Reply::Ack);
        metrics.record_reply(&Reply::BadExecution);
        metrics.record_reply(&Reply::Timeout);
        metrics.record_reply(&Reply::Unclassified("?".into()));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bad_execution, 1);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.unclassified, 1);
        assert_eq!(snapshot.failures_total(), 3);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = LinkMetrics::new();
        assert_eq!(metrics.snapshot().failure_rate(), 0.0);

        metrics.exchanges[Channel::Scan.index()].store(4, Ordering::Relaxed);
        metrics.record_reply(&Reply::CannotExecute);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.exchanges_on(Channel::Scan), 4);
        assert_eq!(snapshot.failure_rate(), 25.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
