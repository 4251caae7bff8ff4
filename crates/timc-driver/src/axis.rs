//! 轴操作
//!
//! 手动操作（使能、点动、GoTo、SetTo、增量运动、中止）全部走 Control 通道。
//! 运动类操作要求控制器在线、轴已使能且未被扫描序列接管；去使能与中止在
//! 任何状态下都可以调用。

use crate::channel::Channel;
use crate::error::DriverError;
use crate::hooks::DisableCause;
use crate::state::{AxisId, MotionContext};
use timc_protocol::{
    AxisParameter, AxisParameters, AxisStatus, Command, MAX_DISPLAY_MAGNITUDE, Reply, round2,
};
use tracing::{debug, info, warn};

/// 点动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Forward,
    Reverse,
}

impl JogDirection {
    fn sign(self) -> f64 {
        match self {
            JogDirection::Forward => 1.0,
            JogDirection::Reverse => -1.0,
        }
    }
}

/// 成功分类以外的响应转换为错误
fn expect_success(command: &Command<'_>, reply: Reply) -> Result<Reply, DriverError> {
    if reply.is_success() {
        Ok(reply)
    } else if reply.is_link_down() {
        Err(DriverError::Offline)
    } else {
        Err(DriverError::Rejected {
            command: command.to_string(),
            reply,
        })
    }
}

/// 校验操作者输入的数值
fn check_value(label: &str, value: f64) -> Result<f64, DriverError> {
    if !value.is_finite() || value.abs() > MAX_DISPLAY_MAGNITUDE {
        return Err(DriverError::InvalidInput(format!(
            "{label} must be a number within ±{MAX_DISPLAY_MAGNITUDE}, got {value}"
        )));
    }
    Ok(round2(value))
}

fn check_speed(speed: f64) -> Result<f64, DriverError> {
    let speed = check_value("speed", speed)?;
    if speed <= 0.0 {
        return Err(DriverError::InvalidInput(format!(
            "speed must be positive, got {speed}"
        )));
    }
    Ok(speed)
}

impl MotionContext {
    /// 使能轴
    ///
    /// 发送 `ENABLE` 后查询状态字，只有控制器确认使能位时才把标志置为 true。
    /// 返回确认结果。
    pub fn enable(&self, id: AxisId) -> Result<bool, DriverError> {
        self.ensure_online()?;
        let axis = self.axis(id);
        let name = axis.name();

        let reply = self.send(Channel::Control, &Command::Enable { axis: name });
        if !reply.is_success() {
            warn!("ENABLE {} not accepted: {}", name, reply);
        }
        let confirmed = self
            .status(id, Channel::Control)
            .is_some_and(|status| status.enabled());
        if confirmed {
            axis.set_enabled(true);
            info!("Axis {} enabled", name);
        } else {
            warn!("Axis {} did not confirm enable", name);
        }
        Ok(confirmed)
    }

    /// 去使能轴（操作者触发）
    ///
    /// 标志总是被强制置为 false，并触发去使能级联回调（扫描暂停）。
    pub fn disable(&self, id: AxisId) -> Reply {
        self.disable_with(id, DisableCause::Operator)
    }

    pub(crate) fn disable_with(&self, id: AxisId, cause: DisableCause) -> Reply {
        let axis = self.axis(id);
        let reply = if self.is_online() {
            self.send(Channel::Control, &Command::Disable { axis: axis.name() })
        } else {
            Reply::LinkDown
        };
        let was_enabled = axis.set_enabled(false);
        if was_enabled {
            info!("Axis {} disabled ({:?})", axis.name(), cause);
        } else {
            debug!("Axis {} disable requested ({:?})", axis.name(), cause);
        }

        let callbacks = self.hooks().read().axis_callbacks();
        for callback in callbacks {
            callback.on_axis_disabled(id, cause);
        }
        reply
    }

    /// 点动
    ///
    /// 先中止当前运动，再以 `FREERUN` 自由运行。速度被钳位到轴的最大点动速度，
    /// 方向由点动方向、工具方向系数与方向反转参数共同决定。
    pub fn jog(&self, id: AxisId, direction: JogDirection, speed: f64) -> Result<(), DriverError> {
        self.ensure_manual(id)?;
        let axis = self.axis(id);
        let params = axis.params();
        let speed = check_speed(speed)?.min(params.max_jog_speed);
        let signed = direction.sign() * axis.jog_multiplier() * params.direction_sign() * speed;

        let abort = Command::Abort { axis: axis.name() };
        let reply = self.send(Channel::Control, &abort);
        expect_success(&abort, reply)?;

        let run = Command::FreeRun {
            axis: axis.name(),
            speed: signed,
        };
        let reply = self.send(Channel::Control, &run);
        expect_success(&run, reply).map(|_| ())
    }

    /// 停止点动（`FREERUN <axis> 0`）
    pub fn stop_jog(&self, id: AxisId) -> Result<(), DriverError> {
        self.ensure_online()?;
        let command = Command::FreeRun {
            axis: self.axis(id).name(),
            speed: 0.0,
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply).map(|_| ())
    }

    /// 绝对运动到 `position`
    pub fn go_to(&self, id: AxisId, position: f64, speed: f64) -> Result<(), DriverError> {
        self.ensure_manual(id)?;
        let command = Command::MoveAbs {
            axis: self.axis(id).name(),
            position: check_value("position", position)?,
            speed: check_speed(speed)?,
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply).map(|_| ())
    }

    /// 把当前位置设置为 `position`（不产生运动）
    pub fn set_to(&self, id: AxisId, position: f64) -> Result<(), DriverError> {
        self.ensure_manual(id)?;
        let command = Command::PosOffsetSet {
            axis: self.axis(id).name(),
            position: check_value("position", position)?,
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply).map(|_| ())
    }

    /// 增量运动 `distance`
    pub fn move_inc(&self, id: AxisId, distance: f64, speed: f64) -> Result<(), DriverError> {
        self.ensure_manual(id)?;
        let command = Command::MoveInc {
            axis: self.axis(id).name(),
            distance: check_value("distance", distance)?,
            speed: check_speed(speed)?,
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply).map(|_| ())
    }

    /// 中止轴上的运动
    pub fn abort(&self, id: AxisId) -> Result<(), DriverError> {
        self.ensure_online()?;
        let command = Command::Abort {
            axis: self.axis(id).name(),
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply).map(|_| ())
    }

    /// 查询状态字，非成功或解析失败时返回 None
    pub fn status(&self, id: AxisId, channel: Channel) -> Option<AxisStatus> {
        let reply = self.send(
            channel,
            &Command::AxisStatus {
                axis: self.axis(id).name(),
            },
        );
        if !reply.is_success() {
            return None;
        }
        AxisStatus::from_reply(&reply)
            .map_err(|e| warn!("AXISSTATUS({}) unreadable: {}", self.axis(id).name(), e))
            .ok()
    }

    /// 读取程序位置（保留两位小数）
    pub fn sample_position(&self, id: AxisId, channel: Channel) -> Option<f64> {
        let reply = self.send(
            channel,
            &Command::PositionFeedback {
                axis: self.axis(id).name(),
            },
        );
        if !reply.is_success() {
            return None;
        }
        reply
            .as_f64()
            .map(round2)
            .map_err(|e| warn!("PFBKPROG({}) unreadable: {}", self.axis(id).name(), e))
            .ok()
    }

    /// 写入轴参数（`SETPARM`），成功后同步本地参数
    pub fn set_parameter(
        &self,
        id: AxisId,
        param: AxisParameter,
        value: &str,
    ) -> Result<(), DriverError> {
        self.ensure_online()?;
        let axis = self.axis(id);
        let mut params = AxisParameters::clone(&axis.params());
        params.apply(param, value)?;

        let command = Command::SetParam {
            axis: axis.name(),
            param,
            value: value.trim(),
        };
        let reply = self.send(Channel::Control, &command);
        expect_success(&command, reply)?;
        axis.set_params(params);
        info!("{} {} set to {}", axis.name(), param, value.trim());
        Ok(())
    }

    /// 提交参数到控制器（`COMMITPARAMETERS`）
    pub fn commit_parameters(&self) -> Result<(), DriverError> {
        self.ensure_online()?;
        let reply = self.send(Channel::Control, &Command::CommitParameters);
        expect_success(&Command::CommitParameters, reply).map(|_| ())
    }

    fn ensure_online(&self) -> Result<(), DriverError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(DriverError::Offline)
        }
    }

    /// 手动运动的前置条件：在线、已使能、未被扫描接管
    fn ensure_manual(&self, id: AxisId) -> Result<(), DriverError> {
        self.ensure_online()?;
        let axis = self.axis(id);
        if axis.channel() == Channel::Scan {
            return Err(DriverError::AxisBusy(axis.name().to_string()));
        }
        if !axis.is_enabled() {
            return Err(DriverError::AxisDisabled(axis.name().to_string()));
        }
        Ok(())
    }
}
