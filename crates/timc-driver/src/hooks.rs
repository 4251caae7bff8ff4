//! 钩子系统（Hook System）
//!
//! 运行时回调管理：
//!
//! - [`ExchangeCallback`]: 分发线程每完成一次链路交换后触发（命令审计、录制）
//! - [`AxisCallback`]: 轴被去使能后触发，用于级联动作（扫描暂停）
//!
//! # 使用示例
//!
//! ```rust
//! use timc_driver::hooks::{ExchangeCallback, ExchangeRecorder, HookManager};
//! use timc_driver::Channel;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (recorder, rx) = ExchangeRecorder::new();
//! hooks.add_exchange_callback(Arc::new(recorder));
//!
//! hooks.trigger_exchange(Channel::Control, "ENABLE TRANSLATOR", "%\n");
//! assert_eq!(rx.try_recv().unwrap().command, "ENABLE TRANSLATOR");
//! ```

use crate::channel::Channel;
use crate::state::AxisId;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 链路交换回调
///
/// # 性能要求
///
/// 在分发线程中同步调用，必须非阻塞（推荐 `try_send`）。阻塞会直接拖慢
/// 所有通道的命令交换。
pub trait ExchangeCallback: Send + Sync {
    /// 一次交换完成（`raw` 为原始响应行，未分类）
    fn on_exchange(&self, channel: Channel, command: &str, raw: &str);
}

/// 轴去使能原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableCause {
    /// 操作者手动去使能
    Operator,
    /// 轴故障
    Fault,
    /// 急停
    Estop,
    /// 启动时复位
    Startup,
    /// 控制器复位
    Reset,
    /// 程序退出
    Shutdown,
}

/// 轴状态回调
///
/// 在触发去使能的线程中同步调用（操作者线程或故障监视线程）。实现者可以
/// 发送命令，但不得再次去使能轴。
pub trait AxisCallback: Send + Sync {
    fn on_axis_disabled(&self, axis: AxisId, cause: DisableCause);
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（`RwLock<HookManager>`）。
#[derive(Default)]
pub struct HookManager {
    exchange_callbacks: Vec<Arc<dyn ExchangeCallback>>,
    axis_callbacks: Vec<Arc<dyn AxisCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exchange_callbacks: Vec::new(),
            axis_callbacks: Vec::new(),
        }
    }

    pub fn add_exchange_callback(&mut self, callback: Arc<dyn ExchangeCallback>) {
        self.exchange_callbacks.push(callback);
    }

    pub fn add_axis_callback(&mut self, callback: Arc<dyn AxisCallback>) {
        self.axis_callbacks.push(callback);
    }

    /// 移除所有回调
    pub fn clear(&mut self) {
        self.exchange_callbacks.clear();
        self.axis_callbacks.clear();
    }

    /// 触发所有交换回调（在分发线程中调用）
    pub fn trigger_exchange(&self, channel: Channel, command: &str, raw: &str) {
        for callback in self.exchange_callbacks.iter() {
            callback.on_exchange(channel, command, raw);
        }
    }

    /// 轴回调列表的副本
    ///
    /// 调用方先释放读锁再逐个触发，回调中注册新钩子不会死锁。
    pub fn axis_callbacks(&self) -> Vec<Arc<dyn AxisCallback>> {
        self.axis_callbacks.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exchange_callbacks.len() + self.axis_callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchange_callbacks.is_empty() && self.axis_callbacks.is_empty()
    }
}

/// 一次链路交换的记录
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRecord {
    pub at: Instant,
    pub channel: Channel,
    pub command: String,
    pub raw: String,
}

/// 基于 Channel 的交换录制钩子
///
/// 队列满时丢弃记录而不是阻塞分发线程，丢弃数量可通过 [`dropped`](Self::dropped)
/// 读取。
pub struct ExchangeRecorder {
    tx: Sender<ExchangeRecord>,
    dropped: Arc<AtomicU64>,
}

impl ExchangeRecorder {
    /// 默认队列容量
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new() -> (Self, Receiver<ExchangeRecord>) {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<ExchangeRecord>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }
}

impl ExchangeCallback for ExchangeRecorder {
    fn on_exchange(&self, channel: Channel, command: &str, raw: &str) {
        let record = ExchangeRecord {
            at: Instant::now(),
            channel,
            command: command.to_string(),
            raw: raw.to_string(),
        };
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct CountingAxisCallback {
        seen: Mutex<Vec<(AxisId, DisableCause)>>,
    }

    impl AxisCallback for CountingAxisCallback {
        fn on_axis_disabled(&self, axis: AxisId, cause: DisableCause) {
            self.seen.lock().push((axis, cause));
        }
    }

    #[test]
    fn test_hook_manager_basic() {
        let mut hooks = HookManager::new();
        assert!(hooks.is_empty());

        let (recorder, _rx) = ExchangeRecorder::new();
        hooks.add_exchange_callback(Arc::new(recorder));
        hooks.add_axis_callback(Arc::new(CountingAxisCallback {
            seen: Mutex::new(Vec::new()),
        }));
        assert_eq!(hooks.len(), 2);

        hooks.clear();
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_axis_callbacks_snapshot() {
        let mut hooks = HookManager::new();
        let callback = Arc::new(CountingAxisCallback {
            seen: Mutex::new(Vec::new()),
        });
        hooks.add_axis_callback(callback.clone());

        for cb in hooks.axis_callbacks() {
            cb.on_axis_disabled(AxisId::Axis2, DisableCause::Fault);
        }
        assert_eq!(
            *callback.seen.lock(),
            vec![(AxisId::Axis2, DisableCause::Fault)]
        );
    }

    #[test]
    fn test_recorder_drops_when_full() {
        let (recorder, rx) = ExchangeRecorder::with_capacity(2);
        let dropped = recorder.dropped().clone();
        let mut hooks = HookManager::new();
        hooks.add_exchange_callback(Arc::new(recorder));

        for i in 0..5 {
            hooks.trigger_exchange(Channel::Feedback, &format!("PFBKPROG({i})"), "%0\n");
        }

        assert_eq!(rx.len(), 2);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        let first = rx.recv().unwrap();
        assert_eq!(first.channel, Channel::Feedback);
        assert_eq!(first.command, "PFBKPROG(0)");
    }
}
