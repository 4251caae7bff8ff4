//! 控制器句柄
//!
//! [`Timc`] 持有分发线程与后台工作线程（故障监视、反馈采样），并对外暴露共享
//! 的 [`MotionContext`]。Drop 时依次去使能两轴、停止工作线程、停止分发线程。

use crate::builder::{TimcBuilder, spawn_named};
use crate::clock::Clock;
use crate::error::DriverError;
use crate::fault_monitor::{FaultMonitor, FaultMonitorConfig};
use crate::feedback::{FeedbackConfig, FeedbackSampler};
use crate::hooks::DisableCause;
use crate::metrics::MetricsSnapshot;
use crate::state::{AxisId, MotionContext, MotionSnapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info};

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程负责真正的 join
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 已启动的线程
pub(crate) struct Workers {
    pub(crate) dispatcher: Option<JoinHandle<()>>,
    pub(crate) fault_monitor: Option<JoinHandle<()>>,
    pub(crate) feedback: Option<JoinHandle<()>>,
}

impl Workers {
    pub(crate) fn none() -> Self {
        Self {
            dispatcher: None,
            fault_monitor: None,
            feedback: None,
        }
    }
}

/// 故障监视与反馈采样线程的启动参数（复位后按同样参数重启）
pub(crate) struct WorkerConfig {
    pub(crate) enabled: bool,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) fault_monitor: FaultMonitorConfig,
    pub(crate) feedback: FeedbackConfig,
}

/// TIMC 控制器（对外 API）
///
/// # Example
///
/// ```no_run
/// use timc_driver::{AxisId, Timc};
///
/// let timc = Timc::builder().serial("/dev/ttyUSB0", 115_200).build().unwrap();
/// let ctx = timc.context();
/// ctx.enable(AxisId::Axis1).unwrap();
/// println!("{:?}", ctx.axis(AxisId::Axis1).telemetry());
/// ```
pub struct Timc {
    pub(crate) ctx: Arc<MotionContext>,
    /// 故障监视与反馈采样线程的运行标志
    workers_running: Arc<AtomicBool>,
    /// 分发线程的运行标志
    dispatcher_running: Arc<AtomicBool>,
    workers: Workers,
    pub(crate) worker_config: WorkerConfig,
    /// 控制器当前生效的方向反转参数（启动或上次复位时读取）
    pub(crate) active_direction: [bool; 2],
}

impl Timc {
    /// 线程 join 超时
    const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn builder() -> TimcBuilder {
        TimcBuilder::new()
    }

    pub(crate) fn from_parts(
        ctx: Arc<MotionContext>,
        dispatcher_running: Arc<AtomicBool>,
        workers: Workers,
        worker_config: WorkerConfig,
    ) -> Self {
        let active_direction =
            AxisId::BOTH.map(|id| ctx.axis(id).params().reverse_motion_direction);
        Self {
            ctx,
            workers_running: Arc::new(AtomicBool::new(false)),
            dispatcher_running,
            workers,
            worker_config,
            active_direction,
        }
    }

    /// 启动故障监视与反馈采样线程（离线或已关闭后台线程时不启动）
    pub(crate) fn start_workers(&mut self) -> Result<(), DriverError> {
        if !self.worker_config.enabled || !self.ctx.is_online() {
            return Ok(());
        }
        self.workers_running.store(true, Ordering::Release);

        let monitor = FaultMonitor::new(self.ctx.clone());
        let clock = self.worker_config.clock.clone();
        let config = self.worker_config.fault_monitor.clone();
        let running = self.workers_running.clone();
        self.workers.fault_monitor = Some(spawn_named("timc-faults", move || {
            monitor.run(clock.as_ref(), &config, &running);
        })?);

        let mut sampler = FeedbackSampler::new(self.ctx.clone());
        let clock = self.worker_config.clock.clone();
        let config = self.worker_config.feedback.clone();
        let running = self.workers_running.clone();
        self.workers.feedback = Some(spawn_named("timc-feedback", move || {
            sampler.run(clock.as_ref(), &config, &running);
        })?);
        debug!("Background workers started");
        Ok(())
    }

    /// 停止故障监视与反馈采样线程
    pub(crate) fn stop_workers(&mut self) {
        self.workers_running.store(false, Ordering::Release);
        Self::join("Fault monitor", self.workers.fault_monitor.take());
        Self::join("Feedback", self.workers.feedback.take());
    }

    /// 共享运动上下文（可克隆后交给扫描序列或界面线程）
    pub fn context(&self) -> &Arc<MotionContext> {
        &self.ctx
    }

    pub fn is_online(&self) -> bool {
        self.ctx.is_online()
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        self.ctx.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics().snapshot()
    }

    /// 后台工作线程是否仍在运行（离线后会自行退出）
    pub fn workers_alive(&self) -> bool {
        [&self.workers.fault_monitor, &self.workers.feedback]
            .into_iter()
            .flatten()
            .any(|handle| !handle.is_finished())
    }

    fn join(name: &str, handle: Option<JoinHandle<()>>) {
        if let Some(handle) = handle
            && let Err(_e) = handle.join_timeout(Self::JOIN_TIMEOUT)
        {
            error!(
                "{} thread panicked or failed to shut down within {:?}",
                name,
                Self::JOIN_TIMEOUT
            );
        }
    }
}

impl Drop for Timc {
    fn drop(&mut self) {
        if self.ctx.is_online() {
            for id in AxisId::BOTH {
                self.ctx.disable_with(id, DisableCause::Shutdown);
            }
        }

        self.stop_workers();

        self.dispatcher_running.store(false, Ordering::Release);
        Self::join("Dispatcher", self.workers.dispatcher.take());
        info!("TIMC shut down");
    }
}
