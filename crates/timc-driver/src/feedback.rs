//! 反馈采样
//!
//! 在 Feedback 通道上轮流查询两轴的位置、电流、速度与位置误差。
//!
//! 写游标指向下一条要入队的查询，读游标指向下一条要解释的响应，两者在同一
//! 张固定表上以相同模数回绕。Feedback 通道上同一时刻最多只有一个在途请求，
//! 且同一通道内响应按入队顺序返回，因此响应总是按读游标解释，不需要从响应
//! 内容反推它回答的是哪条查询。

use crate::channel::Channel;
use crate::clock::Clock;
use crate::state::{AxisId, AxisTelemetry, MotionContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use timc_protocol::{Command, Reply, round2};
use tracing::{error, info, trace, warn};

/// 遥测字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryField {
    Position,
    Current,
    Velocity,
    PositionError,
}

impl TelemetryField {
    /// 对应的只读查询命令
    pub fn command(self, axis: &str) -> Command<'_> {
        match self {
            TelemetryField::Position => Command::PositionFeedback { axis },
            TelemetryField::Current => Command::CurrentFeedback { axis },
            TelemetryField::Velocity => Command::VelocityFeedback { axis },
            TelemetryField::PositionError => Command::PositionError { axis },
        }
    }

    fn store(self, telemetry: &mut AxisTelemetry, value: f64) {
        match self {
            TelemetryField::Position => telemetry.position = value,
            TelemetryField::Current => telemetry.current = value,
            TelemetryField::Velocity => telemetry.velocity = value,
            TelemetryField::PositionError => telemetry.position_error = value,
        }
    }
}

/// 查询表（读写游标共用，按此顺序回绕）
pub const FEEDBACK_TABLE: [(AxisId, TelemetryField); 8] = [
    (AxisId::Axis1, TelemetryField::Position),
    (AxisId::Axis1, TelemetryField::Current),
    (AxisId::Axis1, TelemetryField::Velocity),
    (AxisId::Axis1, TelemetryField::PositionError),
    (AxisId::Axis2, TelemetryField::Position),
    (AxisId::Axis2, TelemetryField::Current),
    (AxisId::Axis2, TelemetryField::Velocity),
    (AxisId::Axis2, TelemetryField::PositionError),
];

/// 反馈采样配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackConfig {
    /// 两次 tick 之间的睡眠
    pub tick_interval: Duration,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_micros(200),
        }
    }
}

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTick {
    /// 本次没有收到响应
    Waiting,
    /// 解释了一个响应
    Received(AxisId, TelemetryField),
    /// 链路断开
    Offline,
}

/// 反馈采样器
pub struct FeedbackSampler {
    ctx: Arc<MotionContext>,
    write: usize,
    read: usize,
}

impl FeedbackSampler {
    pub fn new(ctx: Arc<MotionContext>) -> Self {
        Self {
            ctx,
            write: 0,
            read: 0,
        }
    }

    pub fn write_cursor(&self) -> usize {
        self.write
    }

    pub fn read_cursor(&self) -> usize {
        self.read
    }

    /// 是否有已入队但尚未解释的查询
    pub fn outstanding(&self) -> bool {
        self.write != self.read
    }

    /// 先取响应（按读游标解释），再在没有在途查询时按写游标入队下一条
    pub fn tick(&mut self) -> FeedbackTick {
        let mut outcome = FeedbackTick::Waiting;

        if self.outstanding() {
            let (id, field) = FEEDBACK_TABLE[self.read];
            let text = field.command(self.ctx.axis(id).name()).to_string();
            if let Some(reply) = self.ctx.facade().try_response(Channel::Feedback, &text) {
                if reply.is_link_down() {
                    return FeedbackTick::Offline;
                }
                self.interpret(id, field, &reply);
                self.read = (self.read + 1) % FEEDBACK_TABLE.len();
                outcome = FeedbackTick::Received(id, field);
            }
        }

        let facade = self.ctx.facade();
        if !self.outstanding() && facade.pending_requests(Channel::Feedback) == 0 {
            let (id, field) = FEEDBACK_TABLE[self.write];
            let text = field.command(self.ctx.axis(id).name()).to_string();
            if facade.enqueue(Channel::Feedback, &text).is_err() {
                return FeedbackTick::Offline;
            }
            self.write = (self.write + 1) % FEEDBACK_TABLE.len();
        }
        outcome
    }

    /// 采样循环，离线或 `is_running` 置为 false 时退出
    pub fn run(&mut self, clock: &dyn Clock, config: &FeedbackConfig, is_running: &AtomicBool) {
        info!("Feedback sampler started");
        while is_running.load(Ordering::Acquire) {
            if self.tick() == FeedbackTick::Offline {
                error!("Feedback sampling stopped: controller offline");
                break;
            }
            clock.sleep(config.tick_interval);
        }
        info!("Feedback sampler stopped");
    }

    fn interpret(&self, id: AxisId, field: TelemetryField, reply: &Reply) {
        let axis = self.ctx.axis(id);
        if !reply.is_success() {
            trace!("{:?}({}) skipped: {}", field, axis.name(), reply);
            return;
        }
        match reply.as_f64() {
            Ok(value) => axis.update_telemetry(|t| field.store(t, round2(value))),
            Err(e) => warn!("{:?}({}) unreadable: {}", field, axis.name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_field_per_axis() {
        for id in AxisId::BOTH {
            let fields: Vec<_> = FEEDBACK_TABLE
                .iter()
                .filter(|(axis, _)| *axis == id)
                .map(|(_, field)| *field)
                .collect();
            assert_eq!(
                fields,
                vec![
                    TelemetryField::Position,
                    TelemetryField::Current,
                    TelemetryField::Velocity,
                    TelemetryField::PositionError,
                ]
            );
        }
    }

    #[test]
    fn test_field_commands() {
        assert_eq!(TelemetryField::Position.command("X").to_string(), "PFBKPROG(X)");
        assert_eq!(TelemetryField::Current.command("X").to_string(), "IFBK(X)");
        assert_eq!(TelemetryField::Velocity.command("X").to_string(), "VFBK(X)");
        assert_eq!(TelemetryField::PositionError.command("X").to_string(), "PERR(X)");
    }

    #[test]
    fn test_store() {
        let mut telemetry = AxisTelemetry::default();
        TelemetryField::Velocity.store(&mut telemetry, 4.5);
        TelemetryField::PositionError.store(&mut telemetry, -0.25);
        assert_eq!(telemetry.velocity, 4.5);
        assert_eq!(telemetry.position_error, -0.25);
        assert_eq!(telemetry.position, 0.0);
    }
}
