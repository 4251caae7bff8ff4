//! 剩余时间估算
//!
//! 控制器的加减速特性对本层不可见，因此单次运动耗时无法预先计算：当前
//! 目标按距离 / 速度估算，其后的点在有历史数据时使用该轴的平均运动耗时，
//! 否则退回到相邻目标间距 / 速度。

use std::time::Duration;

/// 单轴运动耗时的累计平均
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveTimer {
    average_secs: f64,
    count: u32,
}

impl MoveTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次完成的运动：`avg = (avg * count + elapsed) / (count + 1)`
    pub fn record(&mut self, elapsed: Duration) {
        let n = f64::from(self.count);
        self.average_secs = (self.average_secs * n + elapsed.as_secs_f64()) / (n + 1.0);
        self.count = self.count.saturating_add(1);
    }

    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(secs(self.average_secs))
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// 单轴剩余时间
///
/// `targets` 为该轴的目标序列，`cursor` 为下一个（或正在执行的）目标。
pub fn axis_remaining(
    targets: &[f64],
    cursor: usize,
    position: f64,
    speed: f64,
    timer: &MoveTimer,
) -> Duration {
    let Some(current) = targets.get(cursor) else {
        return Duration::ZERO;
    };
    if !(speed.is_finite() && speed > 0.0) {
        return Duration::ZERO;
    }
    let to_current = secs((current - position).abs() / speed);
    let beyond = &targets[cursor..];
    let rest = match timer.average() {
        Some(average) => average.saturating_mul(beyond.len().saturating_sub(1) as u32),
        None => {
            let distance: f64 = beyond.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
            secs(distance / speed)
        },
    };
    to_current.saturating_add(rest)
}

/// `HH:MM:SS`（小时不封顶）
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs_f64().round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
