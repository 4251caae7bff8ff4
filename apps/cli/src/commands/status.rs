//! 状态查询、监控与故障确认

use crate::utils;
use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use timc_driver::{AxisSnapshot, MotionSnapshot, Timc};

/// 状态查询参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub fn execute(&self, timc: &Timc) -> Result<()> {
        // 等待反馈线程完成第一轮采样
        if timc.is_online() {
            thread::sleep(Duration::from_millis(100));
        }
        let snapshot = timc.snapshot();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot_json(&snapshot))?);
        } else {
            print_snapshot(&snapshot);
        }
        Ok(())
    }
}

/// 监控参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 刷新间隔（毫秒）
    #[arg(short, long, default_value_t = 500)]
    pub interval: u64,
}

impl MonitorCommand {
    pub fn execute(&self, timc: &Timc) -> Result<()> {
        let running = utils::interrupt_flag()?;
        println!("📊 监控中（每 {} ms）...", self.interval);
        println!("按 Ctrl+C 停止\n");

        let interval = Duration::from_millis(self.interval.max(50));
        while running.load(Ordering::SeqCst) {
            print_snapshot(&timc.snapshot());
            thread::sleep(interval);
        }

        println!("✅ 监控已结束");
        Ok(())
    }
}

/// 确认故障（`ACKNOWLEDGEALL`）
pub fn acknowledge(timc: &Timc) -> Result<()> {
    let ctx = timc.context();
    let previous = ctx.fault_text();
    let reply = ctx.acknowledge_faults();
    if !reply.is_success() {
        anyhow::bail!("ACKNOWLEDGEALL rejected: {:?}", reply);
    }
    match previous {
        Some(text) => println!("✅ 已确认故障: {}", text),
        None => println!("✅ 没有未确认的故障"),
    }
    Ok(())
}

pub fn print_snapshot(snapshot: &MotionSnapshot) {
    println!("========================================");
    println!(
        "控制器: {}   工具: {}",
        if snapshot.online { "在线" } else { "离线" },
        snapshot.tool
    );
    for axis in &snapshot.axes {
        print_axis(axis);
    }
    if let Some(fault) = &snapshot.fault {
        println!("⚠️  {}", fault);
    } else if !snapshot.info.is_empty() {
        println!("ℹ️  {}", snapshot.info);
    }
    println!("========================================\n");
}

fn print_axis(axis: &AxisSnapshot) {
    let t = &axis.telemetry;
    let flag = |exceeded: bool| if exceeded { " !" } else { "" };
    println!(
        "  {:<16} {:<8} [{}]",
        axis.name,
        if axis.enabled { "使能" } else { "未使能" },
        axis.channel
    );
    println!(
        "    位置 {:>9.2} {}   速度 {:>8.2}   电流 {:>6.2}{}   位置误差 {:>8.3}{}",
        t.position,
        axis.units,
        t.velocity,
        t.current,
        flag(axis.current_exceeded()),
        t.position_error,
        flag(axis.position_error_exceeded()),
    );
}

fn snapshot_json(snapshot: &MotionSnapshot) -> serde_json::Value {
    let axes: Vec<_> = snapshot
        .axes
        .iter()
        .map(|axis| {
            json!({
                "name": axis.name,
                "enabled": axis.enabled,
                "channel": axis.channel.to_string(),
                "units": axis.units,
                "position": axis.telemetry.position,
                "velocity": axis.telemetry.velocity,
                "current": axis.telemetry.current,
                "position_error": axis.telemetry.position_error,
                "position_error_exceeded": axis.position_error_exceeded(),
                "current_exceeded": axis.current_exceeded(),
            })
        })
        .collect();
    json!({
        "online": snapshot.online,
        "tool": snapshot.tool.to_string(),
        "axes": axes,
        "fault": snapshot.fault,
        "info": snapshot.info,
    })
}
