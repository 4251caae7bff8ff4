//! 手动轴操作
//!
//! 一次性命令：启动时两轴均为去使能状态，运动类命令先使能目标轴，执行后
//! 等待到位；退出时 `Timc` 析构会再次去使能两轴。

use crate::commands::reset;
use crate::utils;
use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use timc_driver::{AxisId, COMMIT_MESSAGE, Channel, JogDirection, MotionContext, Timc};
use timc_protocol::AxisParameter;

/// 点动方向
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogArg {
    Forward,
    Reverse,
}

impl From<JogArg> for JogDirection {
    fn from(arg: JogArg) -> Self {
        match arg {
            JogArg::Forward => JogDirection::Forward,
            JogArg::Reverse => JogDirection::Reverse,
        }
    }
}

/// 轴命令
#[derive(Subcommand, Debug)]
pub enum AxisCommand {
    /// 使能轴
    Enable {
        /// axis1 | axis2
        axis: AxisId,
    },

    /// 去使能轴
    Disable { axis: AxisId },

    /// 绝对定位
    Goto {
        axis: AxisId,
        #[arg(allow_hyphen_values = true)]
        position: f64,
        /// 速度（单位/秒）
        #[arg(short, long, default_value_t = 12.4)]
        speed: f64,
        /// 等待到位的超时（秒）
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// 相对移动
    MoveInc {
        axis: AxisId,
        #[arg(allow_hyphen_values = true)]
        distance: f64,
        #[arg(short, long, default_value_t = 12.4)]
        speed: f64,
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },

    /// 设置当前位置（不运动）
    SetPosition {
        axis: AxisId,
        #[arg(allow_hyphen_values = true)]
        position: f64,
    },

    /// 点动一段时间（Ctrl+C 提前停止）
    Jog {
        axis: AxisId,
        #[arg(value_enum)]
        direction: JogArg,
        /// 速度（超过最大点动速度时钳位）
        #[arg(short, long, default_value_t = 5.0)]
        speed: f64,
        /// 持续时间（毫秒）
        #[arg(short, long, default_value_t = 1000)]
        duration: u64,
    },

    /// 中止运动
    Abort { axis: AxisId },

    /// 写入轴参数（名称或编号）
    SetParam {
        axis: AxisId,
        param: AxisParameter,
        value: String,
        /// 同时提交到控制器并复位（保留两轴位置）
        #[arg(long)]
        commit: bool,
    },
}

impl AxisCommand {
    pub fn execute(self, timc: &mut Timc) -> Result<()> {
        let shared = timc.context().clone();
        let ctx = shared.as_ref();
        match self {
            AxisCommand::Enable { axis } => {
                utils::ensure_enabled(ctx, axis)?;
                println!("✅ {} 已使能", ctx.axis(axis).name());
                Ok(())
            },

            AxisCommand::Disable { axis } => {
                let reply = ctx.disable(axis);
                if !reply.is_success() {
                    anyhow::bail!("DISABLE {} rejected: {:?}", ctx.axis(axis).name(), reply);
                }
                println!("✅ {} 已去使能", ctx.axis(axis).name());
                Ok(())
            },

            AxisCommand::Goto {
                axis,
                position,
                speed,
                timeout,
            } => {
                utils::ensure_enabled(ctx, axis)?;
                ctx.go_to(axis, position, speed).context("MOVEABS failed")?;
                println!("⏳ {} → {} ...", ctx.axis(axis).name(), position);
                wait(ctx, axis, timeout)
            },

            AxisCommand::MoveInc {
                axis,
                distance,
                speed,
                timeout,
            } => {
                utils::ensure_enabled(ctx, axis)?;
                ctx.move_inc(axis, distance, speed).context("MOVEINC failed")?;
                println!("⏳ {} 移动 {} ...", ctx.axis(axis).name(), distance);
                wait(ctx, axis, timeout)
            },

            AxisCommand::SetPosition { axis, position } => {
                utils::ensure_enabled(ctx, axis)?;
                ctx.set_to(axis, position).context("POSOFFSET failed")?;
                println!("✅ {} 当前位置设为 {}", ctx.axis(axis).name(), position);
                Ok(())
            },

            AxisCommand::Jog {
                axis,
                direction,
                speed,
                duration,
            } => {
                let running = utils::interrupt_flag()?;
                utils::ensure_enabled(ctx, axis)?;
                ctx.jog(axis, direction.into(), speed).context("FREERUN failed")?;
                println!("⏳ {} 点动中 ...", ctx.axis(axis).name());

                let deadline = Instant::now() + Duration::from_millis(duration);
                while running.load(Ordering::SeqCst) && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(20));
                }
                ctx.stop_jog(axis).context("FREERUN stop failed")?;
                println!("✅ 点动结束");
                Ok(())
            },

            AxisCommand::Abort { axis } => {
                ctx.abort(axis).context("ABORT failed")?;
                println!("🛑 {} 已中止", ctx.axis(axis).name());
                Ok(())
            },

            AxisCommand::SetParam {
                axis,
                param,
                value,
                commit,
            } => {
                ctx.set_parameter(axis, param, &value)
                    .with_context(|| format!("SETPARM {} failed", param))?;
                println!("✅ {} {} = {}", ctx.axis(axis).name(), param, value);
                if commit {
                    println!("⏳ {}", COMMIT_MESSAGE);
                    let report = timc
                        .commit_and_reset()
                        .context("Commit and reset failed")?;
                    println!("✅ 参数已提交");
                    reset::print_report(timc, &report);
                }
                Ok(())
            },
        }
    }
}

fn wait(ctx: &MotionContext, axis: AxisId, timeout: u64) -> Result<()> {
    let running = utils::interrupt_flag()?;
    if utils::wait_in_position(ctx, axis, Duration::from_secs(timeout), &running) {
        let position = ctx.sample_position(axis, Channel::Control);
        match position {
            Some(position) => println!("✅ 到位: {:.2}", position),
            None => println!("✅ 到位"),
        }
        return Ok(());
    }
    // 超时或被中断时中止运动
    ctx.abort(axis).context("ABORT failed")?;
    anyhow::bail!("{} did not reach position", ctx.axis(axis).name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jog_arg_conversion() {
        assert_eq!(JogDirection::from(JogArg::Forward), JogDirection::Forward);
        assert_eq!(JogDirection::from(JogArg::Reverse), JogDirection::Reverse);
    }

    #[test]
    fn test_offline_axis_commands_fail() {
        let mut timc = Timc::builder().offline().build().unwrap();
        let result = AxisCommand::Abort {
            axis: AxisId::Axis1,
        }
        .execute(&mut timc);
        assert!(result.is_err());
    }
}
