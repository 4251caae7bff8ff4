//! 逻辑命令通道
//!
//! 四个通道共享同一条物理链路，分发线程按固定优先级服务：
//! Control > Scan > Status > Feedback。不做老化或公平调度，持续的 Control
//! 流量可以无限期饿死 Feedback。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 逻辑命令通道（判别值即优先级，越小越优先）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Channel {
    /// 手动操作与安全命令（使能/去使能/中止）
    #[default]
    Control = 0,
    /// 扫描序列
    Scan = 1,
    /// 故障轮询
    Status = 2,
    /// 遥测反馈
    Feedback = 3,
}

impl Channel {
    /// 通道数量
    pub const COUNT: usize = 4;

    /// 按优先级从高到低排列
    pub const ALL: [Channel; Self::COUNT] =
        [Channel::Control, Channel::Scan, Channel::Status, Channel::Feedback];

    /// 通道在固定表中的下标
    pub fn index(self) -> usize {
        self as usize
    }

    /// 从 u8 转换，无效值返回 Control
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Channel::Scan,
            2 => Channel::Status,
            3 => Channel::Feedback,
            _ => Channel::Control,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Control => "CTRL",
            Channel::Scan => "SCAN",
            Channel::Status => "STATUS",
            Channel::Feedback => "FDBK",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 通道（原子版本，用于线程间共享）
///
/// 每个轴记录自己当前使用的通道：手动操作时为 Control，被扫描序列接管时
/// 为 Scan。
#[derive(Debug)]
pub struct AtomicChannel {
    inner: AtomicU8,
}

impl AtomicChannel {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: AtomicU8::new(channel as u8),
        }
    }

    pub fn get(&self, ordering: Ordering) -> Channel {
        Channel::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, channel: Channel, ordering: Ordering) {
        self.inner.store(channel as u8, ordering);
    }

    /// 比较并交换
    ///
    /// 如果当前值等于 `current`，则设置为 `new` 并返回 true。
    pub fn compare_exchange(
        &self,
        current: Channel,
        new: Channel,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current as u8, new as u8, success, failure)
            .is_ok()
    }
}

impl Default for AtomicChannel {
    fn default() -> Self {
        Self::new(Channel::Control)
    }
}
