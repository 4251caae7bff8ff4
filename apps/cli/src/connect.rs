//! 连接控制器
//!
//! 命令行参数优先，其次是运行时配置文件；两者都没有串口时以离线模式启动。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use timc_driver::{ExchangeRecorder, FaultMonitorConfig, FeedbackConfig, RouterConfig, Timc};
use timc_protocol::ToolKind;
use timc_tools::{RuntimeConfig, StationSettings};
use tracing::info;

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 串口设备（如 /dev/ttyUSB0, COM3）
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// 不连接控制器
    #[arg(long, global = true)]
    pub offline: bool,

    /// 运行时配置文件（默认 <config_dir>/timc/timc.toml）
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// 站点设置文件（默认 <config_dir>/timc/settings.toml）
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// 会话日志文件；给出目录时在其中按时间命名
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl ConnectArgs {
    pub fn config_path(&self) -> Result<PathBuf> {
        self.config
            .clone()
            .or_else(RuntimeConfig::default_path)
            .context("Cannot determine config directory")
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        self.settings
            .clone()
            .or_else(StationSettings::default_path)
            .context("Cannot determine config directory")
    }

    /// 实际使用的串口
    pub fn port<'a>(&'a self, config: &'a RuntimeConfig) -> Option<&'a str> {
        if self.offline {
            return None;
        }
        self.port.as_deref().or(config.serial.port.as_deref())
    }
}

/// 打开控制器
///
/// 握手失败不是错误：返回的实例处于离线模式，状态栏显示 "OFFLINE MODE"。
/// `recorder` 为会话日志的交换钩子。
pub fn open(
    args: &ConnectArgs,
    config: &RuntimeConfig,
    tool: ToolKind,
    recorder: Option<ExchangeRecorder>,
) -> Result<Timc> {
    let mut builder = Timc::builder()
        .read_timeout(config.serial.read_timeout())
        .offline_tool(tool)
        .router_config(RouterConfig {
            idle_interval: config.intervals.router_idle(),
        })
        .fault_monitor_config(FaultMonitorConfig {
            poll_interval: config.intervals.fault_poll(),
        })
        .feedback_config(FeedbackConfig {
            tick_interval: config.intervals.feedback_tick(),
        });

    if let Some(recorder) = recorder {
        builder = builder.exchange_callback(Arc::new(recorder));
    }

    if let Some([axis1, axis2]) = &config.axis_names {
        builder = builder.axis_names(axis1.as_str(), axis2.as_str());
    }

    builder = match args.port(config) {
        Some(port) => {
            let baud_rate = args.baud.unwrap_or(config.serial.baud_rate);
            info!("Connecting to {} at {} baud", port, baud_rate);
            builder.serial(port, baud_rate)
        },
        None => {
            info!("No serial port selected, starting offline");
            builder.offline()
        },
    };

    builder.build().context("Failed to start controller")
}
