//! 时钟抽象
//!
//! 所有后台线程的轮询间隔与运动计时都通过 [`Clock`] 完成，测试中可以注入
//! [`ManualClock`] 以虚拟时间驱动，不依赖真实睡眠。

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// 单调时钟
pub trait Clock: Send + Sync {
    /// 自时钟创建以来经过的时间
    fn now(&self) -> Duration;

    /// 睡眠指定时长
    fn sleep(&self, duration: Duration);
}

/// 系统时钟
///
/// 使用 `spin_sleep` 提供微秒级睡眠精度（相比 `std::thread::sleep` 的 1-2ms）。
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

/// 虚拟时钟
///
/// `sleep` 立即返回并把虚拟时间向前推进；测试也可以用 `advance` 手动推进。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock() += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        // 让出时间片，避免虚拟时间驱动的循环独占 CPU
        std::thread::yield_now();
    }
}
