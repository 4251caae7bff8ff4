//! 命令共用的小工具

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use timc_driver::{AxisId, Channel, MotionContext};

/// 安装 Ctrl+C 处理，返回"继续运行"标志
pub fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\n收到退出信号，正在停止...");
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(running)
}

/// 轮询轴状态直到到位
///
/// 返回 false 表示超时或被中断。
pub fn wait_in_position(
    ctx: &MotionContext,
    id: AxisId,
    timeout: Duration,
    running: &AtomicBool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while running.load(Ordering::SeqCst) && Instant::now() < deadline {
        if ctx.status(id, Channel::Control).is_some_and(|s| s.in_position()) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

/// 确保轴已使能（一次性命令在启动时两轴都是去使能状态）
pub fn ensure_enabled(ctx: &MotionContext, id: AxisId) -> Result<()> {
    if ctx.axis(id).is_enabled() {
        return Ok(());
    }
    let confirmed = ctx
        .enable(id)
        .with_context(|| format!("Failed to enable {}", ctx.axis(id).name()))?;
    if !confirmed {
        anyhow::bail!("{} did not confirm enable", ctx.axis(id).name());
    }
    Ok(())
}
