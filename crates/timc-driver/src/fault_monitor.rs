//! 故障监视
//!
//! 以固定间隔在 Status 通道上查询两轴的 `AXISFAULT`，解码位图并触发安全级联：
//!
//! 1. 任一轴急停位（bit 11）置位：两轴无条件去使能，只报告急停文本
//! 2. 否则逐轴解码非零位图：每个置位都上报，已使能的轴被去使能
//!
//! 去使能会触发轴回调，正在运行的扫描因此被暂停（而非停止）。
//! 查询返回链路断开时监视线程进入离线状态并退出，不会无限重试。

use crate::channel::Channel;
use crate::clock::Clock;
use crate::hooks::DisableCause;
use crate::state::{AxisId, MotionContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use timc_protocol::{Command, FaultMask, FaultSlot, Reply};
use tracing::{debug, error, info, warn};

/// 急停文本
pub const ESTOP_MESSAGE: &str = "ESTOP was pressed";

/// 离线提示文本
pub const OFFLINE_MESSAGE: &str = "OFFLINE MODE";

/// 故障监视配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultMonitorConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for FaultMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// 单个置位的故障
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub axis: AxisId,
    pub axis_name: String,
    pub bit: u8,
    pub slot: FaultSlot,
}

impl FaultReport {
    /// 操作者可见的故障文本
    pub fn message(&self) -> String {
        match self.slot {
            FaultSlot::Unknown => {
                format!("FAULT: {} {} (bit {})", self.axis_name, self.slot, self.bit)
            },
            slot => format!("FAULT: {} {}", self.axis_name, slot),
        }
    }
}

/// 单次轮询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultPoll {
    /// 两轴均无故障
    Clear,
    /// 急停
    Estop,
    /// 按位解码的故障
    Faulted(Vec<FaultReport>),
    /// 链路断开
    Offline,
}

/// 故障监视器
pub struct FaultMonitor {
    ctx: Arc<MotionContext>,
}

impl FaultMonitor {
    pub fn new(ctx: Arc<MotionContext>) -> Self {
        Self { ctx }
    }

    /// 查询一次两轴故障位图并执行级联动作
    pub fn poll_once(&self) -> FaultPoll {
        let mut masks = [FaultMask::default(); 2];
        for id in AxisId::BOTH {
            match self.read_mask(id) {
                Some(mask) => masks[id.index()] = mask,
                None => {
                    error!("Fault polling stopped: controller offline");
                    self.ctx.set_info(OFFLINE_MESSAGE);
                    return FaultPoll::Offline;
                },
            }
        }

        if masks.iter().any(|mask| mask.is_estop()) {
            if self.ctx.push_fault(ESTOP_MESSAGE.to_string()) {
                error!("{}", ESTOP_MESSAGE);
            }
            for id in AxisId::BOTH {
                self.ctx.disable_with(id, DisableCause::Estop);
            }
            return FaultPoll::Estop;
        }

        let mut reports = Vec::new();
        for id in AxisId::BOTH {
            let mask = masks[id.index()];
            if mask.is_clear() {
                continue;
            }
            let axis = self.ctx.axis(id);
            if axis.is_enabled() {
                self.ctx.disable_with(id, DisableCause::Fault);
            }
            for (bit, slot) in mask.decode() {
                let report = FaultReport {
                    axis: id,
                    axis_name: axis.name().to_string(),
                    bit,
                    slot,
                };
                let message = report.message();
                if self.ctx.push_fault(message.clone()) {
                    warn!("{} (bit {})", message, bit);
                }
                reports.push(report);
            }
        }

        if reports.is_empty() {
            FaultPoll::Clear
        } else {
            FaultPoll::Faulted(reports)
        }
    }

    /// 监视循环：先睡眠再轮询，离线或 `is_running` 置为 false 时退出
    pub fn run(&self, clock: &dyn Clock, config: &FaultMonitorConfig, is_running: &AtomicBool) {
        info!("Fault monitor started ({:?} interval)", config.poll_interval);
        while is_running.load(Ordering::Acquire) {
            clock.sleep(config.poll_interval);
            if !is_running.load(Ordering::Acquire) {
                break;
            }
            if self.poll_once() == FaultPoll::Offline {
                break;
            }
        }
        info!("Fault monitor stopped");
    }

    /// 链路断开时返回 None；其他失败按无故障处理并记录日志
    fn read_mask(&self, id: AxisId) -> Option<FaultMask> {
        let name = self.ctx.axis(id).name();
        let reply = self
            .ctx
            .send(Channel::Status, &Command::AxisFault { axis: name });
        match reply {
            Reply::LinkDown => None,
            reply if reply.is_success() => match reply.as_i64() {
                Ok(raw) => Some(FaultMask(u32::try_from(raw).unwrap_or_else(|_| {
                    warn!("AXISFAULT({}) out of range: {}", name, raw);
                    0
                }))),
                Err(e) => {
                    warn!("AXISFAULT({}) unreadable: {}", name, e);
                    Some(FaultMask::default())
                },
            },
            reply => {
                debug!("AXISFAULT({}) skipped: {}", name, reply);
                Some(FaultMask::default())
            },
        }
    }
}

impl MotionContext {
    /// 确认所有故障（`ACKNOWLEDGEALL`），成功后清除故障文本
    pub fn acknowledge_faults(&self) -> Reply {
        let reply = self.send(Channel::Control, &Command::AcknowledgeAll);
        if reply.is_success() {
            self.clear_faults();
            info!("Faults acknowledged");
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timc_protocol::FaultKind;

    #[test]
    fn test_report_message() {
        let report = FaultReport {
            axis: AxisId::Axis1,
            axis_name: "TRANSLATOR".to_string(),
            bit: 1,
            slot: FaultSlot::Fault(FaultKind::OverCurrent),
        };
        assert_eq!(report.message(), "FAULT: TRANSLATOR OverCurrent Fault");

        let unused = FaultReport {
            bit: 13,
            slot: FaultSlot::Unused,
            ..report
        };
        assert_eq!(unused.message(), "FAULT: TRANSLATOR N/A");

        let unknown = FaultReport {
            bit: 30,
            slot: FaultSlot::Unknown,
            ..unused
        };
        assert_eq!(unknown.message(), "FAULT: TRANSLATOR Unknown Fault (bit 30)");
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(
            FaultMonitorConfig::default().poll_interval,
            Duration::from_millis(500)
        );
    }
}
