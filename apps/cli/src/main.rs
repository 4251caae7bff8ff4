//! # TIMC CLI
//!
//! 扫描夹具运动控制器的命令行工具。
//!
//! 每个命令独立执行：读取配置 → 连接控制器 → 执行操作 → 去使能两轴并断开。
//! 站点设置在启动时读取一次、退出时写回一次。
//!
//! ```bash
//! # 配置默认串口
//! timc-cli config set --port /dev/ttyUSB0
//!
//! # 查看状态 / 持续监控
//! timc-cli status
//! timc-cli monitor --interval 250
//!
//! # 手动轴操作
//! timc-cli axis goto axis1 12.5 --speed 5
//! timc-cli axis jog axis2 reverse --speed 2 --duration 500
//!
//! # 写入方向参数，提交并复位（两轴位置保留）
//! timc-cli axis set-param axis1 ReverseMotionDirection 0 --commit
//! timc-cli reset
//!
//! # 扫描（窗口默认取上次的设置），同时记录会话日志
//! timc-cli --log-file ./logs scan --scan-stop 20 --index-stop 10 --index-step 1 --direction bi
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use timc_driver::{ExchangeRecorder, Timc};
use timc_tools::{RuntimeConfig, StationSettings};
use tracing_subscriber::EnvFilter;

mod commands;
mod connect;
mod session_log;
mod utils;

use commands::{AxisCommand, ConfigCommand, MonitorCommand, ScanCommand, StatusCommand};
use connect::ConnectArgs;
use session_log::SessionLog;

/// TIMC CLI - 扫描夹具命令行工具
#[derive(Parser, Debug)]
#[command(name = "timc-cli")]
#[command(about = "TIMC scanning fixture controller", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 列出可用串口
    Ports,

    /// 打印一次状态
    Status(StatusCommand),

    /// 持续监控状态
    Monitor(MonitorCommand),

    /// 确认所有故障
    Ack,

    /// 手动轴操作
    #[command(subcommand)]
    Axis(AxisCommand),

    /// 运行光栅扫描
    Scan(ScanCommand),

    /// 复位控制器（保留两轴位置）
    Reset {
        /// 先提交参数（COMMITPARAMETERS）
        #[arg(long)]
        commit: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("timc=info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.connect.config_path()?;
    let mut config = RuntimeConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let settings_path = cli.connect.settings_path()?;
    let mut settings = StationSettings::load(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;

    let (log, recorder) = match &cli.connect.log_file {
        Some(path) => {
            let (log, recorder) = SessionLog::create(path, cli.connect.port(&config))?;
            println!("📝 会话日志: {}", log.path().display());
            (Some(log), Some(recorder))
        },
        None => (None, None),
    };

    let mut session = Session {
        log: log.as_ref(),
        recorder,
    };
    let result = run(
        cli.command,
        &cli.connect,
        &mut config,
        &mut settings,
        &mut session,
    );
    // 控制器句柄已在 run 内析构，日志写线程可以收尾
    drop(session);
    drop(log);

    let saved = settings
        .save(&settings_path)
        .with_context(|| format!("Failed to write {}", settings_path.display()));
    result?;
    saved
}

/// 会话日志与尚未注册的交换钩子
struct Session<'a> {
    log: Option<&'a SessionLog>,
    recorder: Option<ExchangeRecorder>,
}

fn run(
    command: Commands,
    connect: &ConnectArgs,
    config: &mut RuntimeConfig,
    settings: &mut StationSettings,
    session: &mut Session<'_>,
) -> Result<()> {
    match command {
        Commands::Config(cmd) => cmd.execute(connect, config, settings),

        Commands::Ports => {
            let ports = timc_link::available_ports().context("Failed to enumerate serial ports")?;
            if ports.is_empty() {
                println!("(没有可用串口)");
            }
            for port in ports {
                println!("{}", port);
            }
            Ok(())
        },

        Commands::Status(cmd) => cmd.execute(&open(connect, config, settings, session)?),

        Commands::Monitor(cmd) => cmd.execute(&open(connect, config, settings, session)?),

        Commands::Ack => commands::status::acknowledge(&open(connect, config, settings, session)?),

        Commands::Axis(cmd) => cmd.execute(&mut open(connect, config, settings, session)?),

        Commands::Reset { commit } => {
            let mut timc = open(connect, config, settings, session)?;
            commands::reset::execute(&mut timc, commit)
        },

        Commands::Scan(cmd) => {
            let request = cmd.request(&mut settings.scan)?;
            if cmd.dry_run {
                return cmd.dry_run(&request);
            }
            let timc = open(connect, config, settings, session)?;
            cmd.execute(timc, &request, config, session.log)
        },
    }
}

/// 连接控制器；在线时记录识别出的工具类型
fn open(
    connect: &ConnectArgs,
    config: &RuntimeConfig,
    settings: &mut StationSettings,
    session: &mut Session<'_>,
) -> Result<Timc> {
    let timc = connect::open(connect, config, settings.tool, session.recorder.take())?;
    if timc.is_online() {
        settings.tool = timc.context().tool();
        session_log::event(
            session.log,
            &format!("Controller online, tool {}", settings.tool),
        );
    } else {
        println!("⚠️  控制器未连接，离线模式（工具: {}）", settings.tool);
        session_log::event(session.log, "Offline mode");
    }
    Ok(timc)
}
