//! 会话日志（`--log-file`）
//!
//! 每行以本地时间开头，记录：
//!
//! - Control / Scan 通道上的命令（状态与位置查询除外），失败时附带分类结果
//! - Status 通道 `AXISFAULT` 报告的故障（确认之前只记录一次）
//! - 扫描开始、暂停、继续、停止、完成等操作事件
//!
//! 链路交换经 [`ExchangeRecorder`] 送入写线程，不阻塞分发线程；操作事件由
//! 调用线程直接写入。跨天时插入日期分隔行。

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use timc_driver::{Channel, ExchangeRecord, ExchangeRecorder};
use timc_protocol::{FaultMask, FaultSlot, Reply};
use tracing::warn;

const RULE: &str = "===============================================================";

/// 不记录的查询命令
const QUIET_COMMANDS: [&str; 2] = ["AXISSTATUS", "PFBKPROG"];

/// 日志行格式化（与文件无关，便于测试）
struct LogWriter<W: Write> {
    out: W,
    day: Option<NaiveDate>,
    /// 已记录故障、尚未确认
    fault_logged: bool,
}

impl<W: Write> LogWriter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            day: None,
            fault_logged: false,
        }
    }

    fn header(&mut self, port: Option<&str>) -> std::io::Result<()> {
        let now = Local::now();
        self.day = Some(now.date_naive());
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "          Tooling Inspection Motion Controller - TIMC")?;
        writeln!(self.out, "                         - LOG FILE -")?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Session started:")?;
        writeln!(self.out, "    Date: {}", now.format("%Y-%m-%d"))?;
        writeln!(self.out, "    Time: {}", now.format("%H:%M:%S"))?;
        writeln!(self.out, "    Port: {}", port.unwrap_or("(offline)"))?;
        writeln!(self.out, "    Version: {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(self.out)?;
        writeln!(self.out, "RECORDED EVENTS")?;
        writeln!(self.out, "{RULE}")
    }

    /// 写一行，跨天时先写日期分隔
    fn line(&mut self, text: &str) -> std::io::Result<()> {
        let now = Local::now();
        let today = now.date_naive();
        if self.day != Some(today) {
            writeln!(self.out)?;
            writeln!(self.out, "{RULE}")?;
            writeln!(self.out, "\t\t\t{}", today.format("%Y-%m-%d"))?;
            writeln!(self.out, "{RULE}")?;
            writeln!(self.out)?;
            self.day = Some(today);
        }
        writeln!(self.out, "{} {}", now.format("%H:%M:%S"), text)
    }

    fn record(&mut self, record: &ExchangeRecord) -> std::io::Result<()> {
        let tag = match record.channel {
            Channel::Control => "CTRL",
            Channel::Scan => "SCAN",
            Channel::Status => return self.fault(record),
            Channel::Feedback => return Ok(()),
        };
        if QUIET_COMMANDS
            .iter()
            .any(|quiet| record.command.starts_with(quiet))
        {
            return Ok(());
        }
        if record.command == "ACKNOWLEDGEALL" {
            self.fault_logged = false;
        }
        let reply = Reply::classify(&record.raw);
        if reply.is_success() {
            self.line(&format!("{}: {}", tag, record.command))
        } else {
            self.line(&format!("{}: {} ({})", tag, record.command, reply))
        }
    }

    /// `AXISFAULT (<axis>)` 的非零位图
    fn fault(&mut self, record: &ExchangeRecord) -> std::io::Result<()> {
        let Some(axis) = record
            .command
            .strip_prefix("AXISFAULT (")
            .and_then(|rest| rest.strip_suffix(')'))
        else {
            return Ok(());
        };
        let mask = match Reply::classify(&record.raw).as_i64() {
            Ok(raw) => FaultMask(u32::try_from(raw).unwrap_or(0)),
            Err(_) => return Ok(()),
        };
        if mask.is_clear() || self.fault_logged {
            return Ok(());
        }
        self.fault_logged = true;
        if mask.is_estop() {
            return self.line("ESTOP Pressed");
        }
        for (bit, slot) in mask.decode() {
            match slot {
                FaultSlot::Unknown => self.line(&format!("FAULT: {axis} {slot} (bit {bit})"))?,
                slot => self.line(&format!("FAULT: {axis} {slot}"))?,
            }
        }
        Ok(())
    }
}

/// 会话日志
///
/// Drop 时等待写线程写完剩余记录。写线程在所有 [`ExchangeRecorder`] 被释放
/// （控制器句柄析构）后退出，因此必须在控制器句柄之后析构。
pub struct SessionLog {
    path: PathBuf,
    writer: Arc<Mutex<LogWriter<LineWriter<File>>>>,
    worker: Option<JoinHandle<()>>,
    dropped: Arc<std::sync::atomic::AtomicU64>,
}

impl SessionLog {
    /// 创建日志文件并返回需要注册到控制器的交换钩子
    ///
    /// `path` 为目录时在其中创建 `TIMC_LOG_<日期>__<时间>.txt`；为文件时追加写入。
    pub fn create(path: &Path, port: Option<&str>) -> Result<(Self, ExchangeRecorder)> {
        let path = if path.is_dir() {
            path.join(
                Local::now()
                    .format("TIMC_LOG_%Y-%m-%d__%H-%M-%S.txt")
                    .to_string(),
            )
        } else {
            path.to_path_buf()
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        let mut writer = LogWriter::new(LineWriter::new(file));
        writer
            .header(port)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        let writer = Arc::new(Mutex::new(writer));

        let (recorder, records) = ExchangeRecorder::new();
        let dropped = recorder.dropped().clone();
        let sink = writer.clone();
        let worker = thread::Builder::new()
            .name("timc-session-log".to_string())
            .spawn(move || {
                for record in records.iter() {
                    if let Err(e) = sink.lock().record(&record) {
                        warn!("Session log write failed: {}", e);
                    }
                }
            })
            .context("Failed to spawn session log writer")?;

        Ok((
            Self {
                path,
                writer,
                worker: Some(worker),
                dropped,
            },
            recorder,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 记录一条操作事件
    pub fn event(&self, text: &str) {
        if let Err(e) = self.writer.lock().line(&format!("LOG: {text}")) {
            warn!("Session log write failed: {}", e);
        }
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("Session log writer panicked");
        }
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("Session log skipped {} exchanges (queue full)", dropped);
        }
        if let Err(e) = self.writer.lock().out.flush() {
            warn!("Session log flush failed: {}", e);
        }
    }
}

/// 可选会话日志上的事件（未启用时忽略）
pub fn event(log: Option<&SessionLog>, text: &str) {
    if let Some(log) = log {
        log.event(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use timc_driver::ExchangeCallback;

    fn record(channel: Channel, command: &str, raw: &str) -> ExchangeRecord {
        ExchangeRecord {
            at: Instant::now(),
            channel,
            command: command.to_string(),
            raw: raw.to_string(),
        }
    }

    /// 去掉时间戳后的日志行
    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out)
            .lines()
            .filter_map(|line| line.split_once(' ').map(|(_, text)| text.to_string()))
            .collect()
    }

    #[test]
    fn test_command_and_fault_lines() {
        let mut writer = LogWriter::new(Vec::new());
        writer.day = Some(Local::now().date_naive());
        let exchanges = [
            record(Channel::Control, "ENABLE TRANSLATOR", "%\n"),
            record(Channel::Control, "AXISSTATUS(TRANSLATOR)", "%5\n"),
            record(Channel::Scan, "MOVEABS TRANSLATOR 20 F 12.4", "!\n"),
            record(Channel::Feedback, "VFBK(TRANSLATOR)", "%0\n"),
            record(Channel::Status, "AXISFAULT (TRANSLATOR)", "%0\n"),
            record(Channel::Status, "AXISFAULT (TRANSLATOR)", "%2\n"),
            record(Channel::Status, "AXISFAULT (TRANSLATOR)", "%2\n"),
            record(Channel::Control, "ACKNOWLEDGEALL", "%\n"),
            record(Channel::Status, "AXISFAULT (CIRCUMFERENTIAL)", "%2048\n"),
        ];
        for exchange in &exchanges {
            writer.record(exchange).unwrap();
        }

        assert_eq!(
            lines(&writer.out),
            vec![
                "CTRL: ENABLE TRANSLATOR",
                "SCAN: MOVEABS TRANSLATOR 20 F 12.4 (bad execution)",
                "FAULT: TRANSLATOR OverCurrent Fault",
                "CTRL: ACKNOWLEDGEALL",
                "ESTOP Pressed",
            ]
        );
    }

    #[test]
    fn test_unknown_fault_bit_logged() {
        let mut writer = LogWriter::new(Vec::new());
        writer.day = Some(Local::now().date_naive());
        writer
            .record(&record(Channel::Status, "AXISFAULT (X)", "%1073741824\n"))
            .unwrap();
        assert_eq!(lines(&writer.out), vec!["FAULT: X Unknown Fault (bit 30)"]);
    }

    #[test]
    fn test_day_change_inserts_separator() {
        let mut writer = LogWriter::new(Vec::new());
        writer.day = NaiveDate::from_ymd_opt(2020, 1, 1);
        writer.line("LOG: first").unwrap();
        let text = String::from_utf8_lossy(&writer.out).into_owned();
        assert!(text.contains(&Local::now().format("%Y-%m-%d").to_string()));
        assert!(text.ends_with("LOG: first\n"));
    }

    #[test]
    fn test_session_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let (log, recorder) = SessionLog::create(dir.path(), Some("/dev/ttyUSB0")).unwrap();
        let path = log.path().to_path_buf();
        assert_eq!(path.parent(), Some(dir.path()));

        recorder.on_exchange(Channel::Control, "ENABLE TRANSLATOR", "%\n");
        log.event("Scan started (22 points)");
        drop(recorder);
        drop(log);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Port: /dev/ttyUSB0"));
        assert!(text.contains("CTRL: ENABLE TRANSLATOR"));
        assert!(text.contains("LOG: Scan started (22 points)"));
    }
}
