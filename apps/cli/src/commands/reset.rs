//! 控制器复位
//!
//! 复位后控制器重启，两轴位置按复位前的值恢复（方向参数改变的轴取反），
//! 两轴保持去使能。

use anyhow::{Context, Result};
use timc_driver::{AxisId, COMMIT_MESSAGE, RESET_MESSAGE, ResetReport, Timc};

pub fn execute(timc: &mut Timc, commit: bool) -> Result<()> {
    if commit {
        println!("⏳ {}", COMMIT_MESSAGE);
        let report = timc.commit_and_reset().context("Commit and reset failed")?;
        println!("✅ 参数已提交");
        print_report(timc, &report);
    } else {
        println!("⏳ {}", RESET_MESSAGE);
        let report = timc.reset_controller().context("Controller reset failed")?;
        print_report(timc, &report);
    }
    Ok(())
}

pub fn print_report(timc: &Timc, report: &ResetReport) {
    println!("✅ 控制器已复位（握手 {} 次）", report.attempts);
    for id in AxisId::BOTH {
        let i = id.index();
        let note = if report.direction_changed[i] {
            "（方向已反转，位置取反）"
        } else {
            ""
        };
        println!(
            "   {:<16} {:>10.3}{}",
            timc.context().axis(id).name(),
            report.positions[i],
            note
        );
    }
}
