//! 扫描命令
//!
//! 扫描窗口默认取自站点设置，命令行参数覆盖后写回设置。
//!
//! 运行中从标准输入读取操作者命令（见 [`OperatorInput`]），Ctrl+C 停止扫描。
//! 扫描因故障或去使能暂停后保持暂停，操作者确认故障、重新使能两轴后继续。

use crate::session_log::{self, SessionLog};
use crate::utils;
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::Receiver;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use timc_client::{
    Console, ConsoleView, ScanDirection, ScanPlan, ScanRequest, ScanState, SequencerConfig,
    format_hms,
};
use timc_driver::{AxisId, SystemClock, Timc};
use timc_tools::{RuntimeConfig, ScanSettings};

/// 扫描参数
#[derive(Args, Debug, Default)]
pub struct ScanCommand {
    /// 扫描起点
    #[arg(long, allow_hyphen_values = true)]
    pub scan_start: Option<String>,

    /// 扫描终点
    #[arg(long, allow_hyphen_values = true)]
    pub scan_stop: Option<String>,

    /// 索引起点
    #[arg(long, allow_hyphen_values = true)]
    pub index_start: Option<String>,

    /// 索引终点
    #[arg(long, allow_hyphen_values = true)]
    pub index_stop: Option<String>,

    /// 索引步长
    #[arg(long, allow_hyphen_values = true)]
    pub index_step: Option<String>,

    /// uni | bi
    #[arg(long)]
    pub direction: Option<ScanDirection>,

    /// 扫描轴（axis1 | axis2），另一轴为索引轴
    #[arg(long)]
    pub scan_axis: Option<AxisId>,

    #[arg(long)]
    pub scan_speed: Option<f64>,

    #[arg(long)]
    pub index_speed: Option<f64>,

    /// 只校验并打印扫描点，不连接控制器
    #[arg(long)]
    pub dry_run: bool,
}

impl ScanCommand {
    /// 合并命令行覆盖项并写回设置
    pub fn request(&self, settings: &mut ScanSettings) -> Result<ScanRequest> {
        let mut request = ScanRequest::from_settings(settings)?;
        let overrides = [
            (&self.scan_start, &mut request.scan_start),
            (&self.scan_stop, &mut request.scan_stop),
            (&self.index_start, &mut request.index_start),
            (&self.index_stop, &mut request.index_stop),
            (&self.index_step, &mut request.index_step),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value.clone();
            }
        }
        if let Some(direction) = self.direction {
            request.direction = direction;
        }
        if let Some(axis) = self.scan_axis {
            request.scan_axis = axis;
        }
        if let Some(speed) = self.scan_speed {
            request.scan_speed = speed;
        }
        if let Some(speed) = self.index_speed {
            request.index_speed = speed;
        }
        request.write_settings(settings);
        Ok(request)
    }

    /// 只打印扫描计划
    pub fn dry_run(&self, request: &ScanRequest) -> Result<()> {
        let plan = ScanPlan::from_request(request)?;
        println!(
            "{} 扫描，{} 个点（扫描轴 {}，索引轴 {}）",
            plan.direction,
            plan.len(),
            plan.scan_axis,
            plan.index_axis()
        );
        for (n, point) in plan.points().iter().enumerate() {
            println!("  {:>4}: scan {:>9.2}  index {:>9.2}", n, point.scan, point.index);
        }
        Ok(())
    }

    pub fn execute(
        &self,
        timc: Timc,
        request: &ScanRequest,
        config: &RuntimeConfig,
        log: Option<&SessionLog>,
    ) -> Result<()> {
        let running = utils::interrupt_flag()?;
        let console = Console::new(
            timc,
            Arc::new(SystemClock::new()),
            SequencerConfig {
                poll_interval: config.intervals.scan_poll(),
                spawn_worker: true,
            },
        );
        let ctx = console.context();
        for id in AxisId::BOTH {
            utils::ensure_enabled(ctx, id)?;
        }

        let total = console.start_scan(request).context("Failed to start scan")?;
        session_log::event(log, &format!("Scan started ({} points)", total));
        println!("⏳ 扫描开始：{} 个点，按 Ctrl+C 停止", total);
        println!("{}", OperatorInput::HELP);
        let inputs = spawn_operator_input()?;

        let mut last_state = ScanState::Running;
        let mut last_report = Instant::now();
        loop {
            if !running.load(Ordering::SeqCst) {
                console.stop_scan();
            }
            while let Ok(line) = inputs.try_recv() {
                match line.parse::<OperatorInput>() {
                    Ok(OperatorInput::Help) => println!("{}", OperatorInput::HELP),
                    Ok(input) => {
                        if let Err(e) = apply(&console, input) {
                            println!("⚠️  {}", e);
                        }
                    },
                    Err(e) => println!("⚠️  {}", e),
                }
            }

            let view = console.view();
            let state = view.scan.state;
            if state != last_state {
                session_log::event(log, &transition_text(state, &view));
                last_state = state;
                if state == ScanState::Paused {
                    println!("⏸️  扫描已暂停: {}", view.status_line());
                    println!("   a 确认故障 / e 使能两轴 / r 继续 / s 停止");
                } else if state == ScanState::Running {
                    println!("▶️  扫描继续");
                }
            }
            match state {
                ScanState::Running | ScanState::Paused => {},
                ScanState::Completed => {
                    println!("✅ 扫描完成（{} 个点）", view.scan.total);
                    break;
                },
                ScanState::StoppedByUser => {
                    println!("🛑 扫描已停止");
                    break;
                },
                state => anyhow::bail!("Scan ended: {} ({})", state, view.status_line()),
            }
            if state == ScanState::Running && last_report.elapsed() >= Duration::from_secs(1) {
                last_report = Instant::now();
                println!(
                    "  点 {:>4}/{:<4}  剩余 {}",
                    view.scan.scan_cursor.min(view.scan.index_cursor),
                    view.scan.total,
                    format_hms(view.scan.remaining)
                );
            }
            thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }
}

/// 扫描期间的操作者命令（标准输入每行一个）
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorInput {
    Pause,
    /// 继续，可附带新的扫描/索引速度
    Resume(Option<(f64, f64)>),
    Acknowledge,
    Enable,
    Stop,
    Help,
}

impl OperatorInput {
    pub const HELP: &'static str =
        "命令: p 暂停 | r [扫描速度 索引速度] 继续 | a 确认故障 | e 使能两轴 | s 停止 | ? 帮助";
}

impl FromStr for OperatorInput {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(OperatorInput::Help);
        };
        let input = match word.to_ascii_lowercase().as_str() {
            "p" | "pause" => OperatorInput::Pause,
            "a" | "ack" => OperatorInput::Acknowledge,
            "e" | "enable" => OperatorInput::Enable,
            "s" | "stop" | "q" => OperatorInput::Stop,
            "?" | "h" | "help" => OperatorInput::Help,
            "r" | "resume" => {
                let speeds: Vec<&str> = words.by_ref().collect();
                return match speeds.as_slice() {
                    [] => Ok(OperatorInput::Resume(None)),
                    [scan, index] => {
                        let scan = scan
                            .parse()
                            .with_context(|| format!("Invalid scan speed '{scan}'"))?;
                        let index = index
                            .parse()
                            .with_context(|| format!("Invalid index speed '{index}'"))?;
                        Ok(OperatorInput::Resume(Some((scan, index))))
                    },
                    _ => anyhow::bail!("resume takes no speeds or both speeds"),
                };
            },
            other => anyhow::bail!("Unknown command '{other}' (? for help)"),
        };
        if let Some(extra) = words.next() {
            anyhow::bail!("Unexpected argument '{extra}'");
        }
        Ok(input)
    }
}

/// 执行一条操作者命令
pub fn apply(console: &Console, input: OperatorInput) -> Result<()> {
    let ctx = console.context();
    match input {
        OperatorInput::Pause => console.pause_scan()?,
        OperatorInput::Resume(speeds) => console.resume_scan(speeds)?,
        OperatorInput::Acknowledge => {
            let reply = ctx.acknowledge_faults();
            if !reply.is_success() {
                anyhow::bail!("ACKNOWLEDGEALL rejected: {}", reply);
            }
        },
        OperatorInput::Enable => {
            for id in AxisId::BOTH {
                utils::ensure_enabled(ctx, id)?;
            }
        },
        OperatorInput::Stop => {
            console.stop_scan();
        },
        OperatorInput::Help => {},
    }
    Ok(())
}

fn transition_text(state: ScanState, view: &ConsoleView) -> String {
    match state {
        ScanState::Paused if view.status_line().is_empty() => "Scan paused".to_string(),
        ScanState::Paused => format!("Scan paused: {}", view.status_line()),
        ScanState::Running => "Scan resumed".to_string(),
        ScanState::Completed => format!("Scan complete ({} points)", view.scan.total),
        ScanState::StoppedByUser => format!("Scan stopped at point {}", view.scan.scan_cursor),
        state => format!("Scan ended: {} ({})", state, view.status_line()),
    }
}

/// 后台读取标准输入；线程随进程退出
fn spawn_operator_input() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("timc-operator-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn operator input thread")?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use timc_driver::{FaultMonitor, FaultPoll, ManualClock};
    use timc_link::mock::SimulatedController;

    fn manual_console(sim: &SimulatedController) -> Console {
        let timc = Timc::builder()
            .link(sim.link())
            .background_workers(false)
            .build()
            .unwrap();
        let console = Console::new(
            timc,
            Arc::new(ManualClock::new()),
            SequencerConfig {
                poll_interval: Duration::from_millis(250),
                spawn_worker: false,
            },
        );
        for id in AxisId::BOTH {
            utils::ensure_enabled(console.context(), id).unwrap();
        }
        console
    }

    #[test]
    fn test_parse_operator_input() {
        assert_eq!("p".parse::<OperatorInput>().unwrap(), OperatorInput::Pause);
        assert_eq!(" RESUME ".parse::<OperatorInput>().unwrap(), OperatorInput::Resume(None));
        assert_eq!(
            "r 5 2.5".parse::<OperatorInput>().unwrap(),
            OperatorInput::Resume(Some((5.0, 2.5)))
        );
        assert_eq!("ack".parse::<OperatorInput>().unwrap(), OperatorInput::Acknowledge);
        assert_eq!("e".parse::<OperatorInput>().unwrap(), OperatorInput::Enable);
        assert_eq!("q".parse::<OperatorInput>().unwrap(), OperatorInput::Stop);
        assert_eq!("".parse::<OperatorInput>().unwrap(), OperatorInput::Help);

        assert!("r 5".parse::<OperatorInput>().is_err());
        assert!("r fast 2".parse::<OperatorInput>().is_err());
        assert!("p now".parse::<OperatorInput>().is_err());
        assert!("x".parse::<OperatorInput>().is_err());
    }

    #[test]
    fn test_fault_pause_recovered_by_operator() {
        let sim = SimulatedController::new(&["TRANSLATOR", "CIRCUMFERENTIAL"]);
        let console = manual_console(&sim);
        sim.set_move_latency(5);
        let request = ScanCommand::default()
            .request(&mut ScanSettings::default())
            .unwrap();
        console.start_scan(&request).unwrap();
        console.sequencer().tick();

        sim.set_fault("TRANSLATOR", 0b10);
        let monitor = FaultMonitor::new(console.context().clone());
        assert!(matches!(monitor.poll_once(), FaultPoll::Faulted(_)));
        assert_eq!(console.view().scan.state, ScanState::Paused);

        // 故障未确认、轴未使能时不能继续
        assert!(apply(&console, OperatorInput::Resume(None)).is_err());
        apply(&console, "a".parse().unwrap()).unwrap();
        assert!(!console.context().has_fault());
        assert!(apply(&console, OperatorInput::Resume(None)).is_err());
        apply(&console, OperatorInput::Enable).unwrap();
        assert!(sim.is_enabled("TRANSLATOR"));

        apply(&console, "r 5 2".parse().unwrap()).unwrap();
        assert_eq!(console.view().scan.state, ScanState::Running);
        assert_eq!(console.last_request().unwrap().scan_speed, 5.0);

        apply(&console, OperatorInput::Pause).unwrap();
        assert_eq!(console.view().scan.state, ScanState::Paused);
        apply(&console, OperatorInput::Stop).unwrap();
        assert_eq!(console.view().scan.state, ScanState::StoppedByUser);
        assert!(apply(&console, OperatorInput::Pause).is_err());
    }

    #[test]
    fn test_overrides_written_back() {
        let mut settings = ScanSettings::default();
        let cmd = ScanCommand {
            scan_stop: Some("-20".to_string()),
            index_step: Some("50".to_string()),
            direction: Some(ScanDirection::Unidirectional),
            scan_axis: Some(AxisId::Axis2),
            ..Default::default()
        };
        let request = cmd.request(&mut settings).unwrap();

        assert_eq!(request.scan_start, "0");
        assert_eq!(request.scan_stop, "-20");
        assert_eq!(request.scan_axis, AxisId::Axis2);
        assert_eq!(settings.scan_stop, "-20");
        assert_eq!(settings.index_step, "50");
        assert_eq!(settings.direction, "Unidirectional");
        assert_eq!(settings.scan_axis, "axis2");
        assert_eq!(ScanPlan::from_request(&request).unwrap().len(), 9);
    }

    #[test]
    fn test_defaults_plan() {
        let mut settings = ScanSettings::default();
        let request = ScanCommand::default().request(&mut settings).unwrap();
        // 0→100 步长 25：双向 2×4+2
        assert_eq!(ScanPlan::from_request(&request).unwrap().len(), 10);
        assert_eq!(settings, ScanSettings::default());
    }
}
