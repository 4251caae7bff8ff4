//! 控制器复位
//!
//! 复位会让控制器重启，重启后两轴位置归零。复位流程保留复位前的位置：
//!
//! 1. 中止并去使能两轴（扫描因此暂停），停止故障监视与反馈采样线程
//! 2. 读取两轴位置（可选：先提交参数 `COMMITPARAMETERS`）
//! 3. 发送 `RESET`，重复上线握手直到控制器重新应答
//! 4. 重新读取轴参数；方向反转参数发生变化的轴，位置取反
//! 5. `POSOFFSET SET` 恢复位置，重启后台线程
//!
//! 复位期间控制器不应答是正常现象，因此 `RESET` 与握手使用不分类的原始
//! 交换，不会触发离线状态。

use crate::builder::read_parameters;
use crate::channel::Channel;
use crate::error::DriverError;
use crate::facade::CommandFacade;
use crate::fault_monitor::OFFLINE_MESSAGE;
use crate::hooks::DisableCause;
use crate::state::{AxisId, MotionContext};
use crate::timc::Timc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use timc_link::{LinkError, LinkTransport, handshake};
use timc_protocol::Command;
use tracing::{debug, error, info, warn};

/// 复位中的提示文本
pub const RESET_MESSAGE: &str = "RESETTING CONTROLLER...";

/// 提交参数并复位时的提示文本
pub const COMMIT_MESSAGE: &str = "SAVING AND COMMITTING PARAMETERS...";

/// 复位后的最大握手次数
const RECONNECT_ATTEMPTS: usize = 50;

/// 两次握手之间的间隔
const RECONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// 等待反馈请求被分发线程取走的上限
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 复位结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResetReport {
    /// 写回控制器的位置（按轴下标）
    pub positions: [f64; 2],
    /// 方向反转参数是否发生了变化
    pub direction_changed: [bool; 2],
    /// 控制器重新应答前的握手次数
    pub attempts: usize,
}

/// Control 通道上的原始交换，供握手复用
struct ControlLane<'a>(&'a CommandFacade);

impl LinkTransport for ControlLane<'_> {
    fn exchange(&mut self, line: &str) -> Result<String, LinkError> {
        Ok(self.0.exchange_raw(Channel::Control, line))
    }

    fn describe(&self) -> String {
        "control lane".to_string()
    }
}

impl Timc {
    /// 复位控制器并恢复两轴位置
    ///
    /// 结束后两轴处于去使能状态。控制器在握手次数内没有重新应答时进入
    /// 离线模式并返回错误。
    pub fn reset_controller(&mut self) -> Result<ResetReport, DriverError> {
        self.reset(false)
    }

    /// 提交参数（`COMMITPARAMETERS`）后复位，使新参数生效
    pub fn commit_and_reset(&mut self) -> Result<ResetReport, DriverError> {
        self.reset(true)
    }

    fn reset(&mut self, commit: bool) -> Result<ResetReport, DriverError> {
        let ctx = self.ctx.clone();
        if !ctx.is_online() {
            return Err(DriverError::Offline);
        }
        ctx.set_info(if commit { COMMIT_MESSAGE } else { RESET_MESSAGE });
        info!("Resetting controller (commit: {})", commit);

        for id in AxisId::BOTH {
            let command = Command::Abort {
                axis: ctx.axis(id).name(),
            };
            let reply = ctx.send(Channel::Control, &command);
            if !reply.is_success() {
                warn!("`{}` failed before reset: {}", command, reply);
            }
        }
        for id in AxisId::BOTH {
            ctx.disable_with(id, DisableCause::Reset);
        }
        self.stop_workers();

        let result = self.reset_stopped(&ctx, commit);
        if ctx.is_online() {
            self.start_workers()?;
        }
        result
    }

    /// 后台线程已停止时的复位步骤
    fn reset_stopped(
        &mut self,
        ctx: &Arc<MotionContext>,
        commit: bool,
    ) -> Result<ResetReport, DriverError> {
        let facade = ctx.facade();
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while facade.pending_requests(Channel::Feedback) > 0 && Instant::now() < deadline {
            std::thread::yield_now();
        }

        let positions = AxisId::BOTH.map(|id| {
            ctx.sample_position(id, Channel::Control).unwrap_or_else(|| {
                warn!("{} position unavailable before reset, using 0", ctx.axis(id).name());
                0.0
            })
        });
        if !ctx.is_online() {
            return Err(DriverError::Offline);
        }
        // 分发线程串行交换：位置读取完成时，采样器留下的反馈交换也已完成
        let stale = facade.discard_responses(Channel::Feedback);
        if stale > 0 {
            debug!("Discarded {} stale feedback responses", stale);
        }

        if commit {
            ctx.commit_parameters()?;
            info!("Parameters committed");
        }

        let raw = facade.exchange_raw(Channel::Control, &Command::Reset.to_string());
        debug!("RESET -> {:?}", raw);
        let attempts = self.reconnect(facade)?;
        info!("Controller back online after {} handshake attempts", attempts);

        let mut report = ResetReport {
            positions,
            direction_changed: [false; 2],
            attempts,
        };
        for id in AxisId::BOTH {
            let i = id.index();
            let axis = ctx.axis(id);
            let params = read_parameters(facade, axis.name());
            let changed = params.reverse_motion_direction != self.active_direction[i];
            self.active_direction[i] = params.reverse_motion_direction;
            axis.set_params(params);
            if changed {
                report.positions[i] = -report.positions[i];
                info!("{} direction changed, negating position", axis.name());
            }
            report.direction_changed[i] = changed;

            let command = Command::PosOffsetSet {
                axis: axis.name(),
                position: report.positions[i],
            };
            let reply = ctx.send(Channel::Control, &command);
            if !reply.is_success() {
                warn!("`{}` failed after reset: {}", command, reply);
            }
        }

        ctx.clear_info();
        info!(
            "Controller reset complete, positions restored to {:?}",
            report.positions
        );
        Ok(report)
    }

    /// 重复握手直到控制器应答，返回握手次数
    fn reconnect(&self, facade: &CommandFacade) -> Result<usize, DriverError> {
        let mut lane = ControlLane(facade);
        for attempt in 1..=RECONNECT_ATTEMPTS {
            match handshake(&mut lane) {
                Ok(()) => return Ok(attempt),
                Err(e) => debug!("Reset handshake attempt {} failed: {}", attempt, e),
            }
            self.worker_config.clock.sleep(RECONNECT_INTERVAL);
        }
        facade.set_offline();
        self.ctx.set_info(OFFLINE_MESSAGE);
        error!(
            "Controller did not respond within {} attempts after RESET",
            RECONNECT_ATTEMPTS
        );
        Err(DriverError::Link(LinkError::Handshake(format!(
            "no response to ACKNOWLEDGEALL after RESET ({RECONNECT_ATTEMPTS} attempts)"
        ))))
    }
}
