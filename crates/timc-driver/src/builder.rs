//! Builder 模式实现
//!
//! 提供链式构造 [`Timc`] 实例的便捷方式，并完成启动流程：
//!
//! 1. 握手（`ACKNOWLEDGEALL` + `WAIT MODE NOWAIT`），失败进入离线模式
//! 2. 启动分发线程
//! 3. 读取两轴参数（失败的参数使用离线默认值），由轴 1 电机类型确定工具
//! 4. 两轴去使能，使能标志从 false 开始
//! 5. 启动故障监视与反馈采样线程

use crate::channel::Channel;
use crate::clock::{Clock, SystemClock};
use crate::error::DriverError;
use crate::facade::CommandFacade;
use crate::fault_monitor::{FaultMonitorConfig, OFFLINE_MESSAGE};
use crate::feedback::FeedbackConfig;
use crate::hooks::{DisableCause, ExchangeCallback, HookManager};
use crate::metrics::LinkMetrics;
use crate::router::{RouterConfig, dispatch_loop, lanes};
use crate::state::{AxisId, AxisState, MotionContext};
use crate::timc::{Timc, WorkerConfig, Workers};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use timc_link::{DEFAULT_READ_TIMEOUT, LinkTransport, handshake};
use timc_protocol::{AxisParameter, AxisParameters, Command, ToolKind};
use tracing::{info, warn};

/// 默认轴名（轴 1 平移，轴 2 周向）
pub const DEFAULT_AXIS_NAMES: [&str; 2] = ["TRANSLATOR", "CIRCUMFERENTIAL"];

type BoxedLink = Box<dyn LinkTransport + Send>;

/// 链路来源
enum LinkSource {
    /// 不连接控制器
    Offline,
    /// 调用方提供的链路
    Link(BoxedLink),
    #[cfg(feature = "serial")]
    Serial {
        port: String,
        baud_rate: u32,
    },
}

/// TIMC Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use timc_driver::{FaultMonitorConfig, TimcBuilder};
/// use std::time::Duration;
///
/// let timc = TimcBuilder::new()
///     .serial("/dev/ttyUSB0", 115_200)
///     .read_timeout(Duration::from_millis(50))
///     .fault_monitor_config(FaultMonitorConfig {
///         poll_interval: Duration::from_millis(250),
///     })
///     .build()
///     .unwrap();
/// ```
pub struct TimcBuilder {
    source: LinkSource,
    read_timeout: Duration,
    axis_names: [String; 2],
    /// 离线时使用的工具类型（在线时由电机类型识别）
    offline_tool: ToolKind,
    router_config: RouterConfig,
    fault_monitor_config: FaultMonitorConfig,
    feedback_config: FeedbackConfig,
    /// 是否启动故障监视与反馈采样线程
    background_workers: bool,
    clock: Arc<dyn Clock>,
    exchange_callbacks: Vec<Arc<dyn ExchangeCallback>>,
}

impl TimcBuilder {
    pub fn new() -> Self {
        Self {
            source: LinkSource::Offline,
            read_timeout: DEFAULT_READ_TIMEOUT,
            axis_names: DEFAULT_AXIS_NAMES.map(String::from),
            offline_tool: ToolKind::default(),
            router_config: RouterConfig::default(),
            fault_monitor_config: FaultMonitorConfig::default(),
            feedback_config: FeedbackConfig::default(),
            background_workers: true,
            clock: Arc::new(SystemClock::new()),
            exchange_callbacks: Vec::new(),
        }
    }

    /// 使用已打开的链路（测试中传入模拟控制器）
    pub fn link(mut self, link: impl LinkTransport + Send + 'static) -> Self {
        self.source = LinkSource::Link(Box::new(link));
        self
    }

    /// 使用串口
    #[cfg(feature = "serial")]
    pub fn serial(mut self, port: impl Into<String>, baud_rate: u32) -> Self {
        self.source = LinkSource::Serial {
            port: port.into(),
            baud_rate,
        };
        self
    }

    /// 串口读取超时（默认 50ms）
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 不连接控制器，以离线默认参数启动
    pub fn offline(mut self) -> Self {
        self.source = LinkSource::Offline;
        self
    }

    pub fn axis_names(mut self, axis1: impl Into<String>, axis2: impl Into<String>) -> Self {
        self.axis_names = [axis1.into(), axis2.into()];
        self
    }

    pub fn offline_tool(mut self, tool: ToolKind) -> Self {
        self.offline_tool = tool;
        self
    }

    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    pub fn fault_monitor_config(mut self, config: FaultMonitorConfig) -> Self {
        self.fault_monitor_config = config;
        self
    }

    pub fn feedback_config(mut self, config: FeedbackConfig) -> Self {
        self.feedback_config = config;
        self
    }

    /// 关闭后可由测试手动驱动 [`FaultMonitor`] 与 [`FeedbackSampler`]
    pub fn background_workers(mut self, enabled: bool) -> Self {
        self.background_workers = enabled;
        self
    }

    /// 注入时钟（测试中使用 [`ManualClock`](crate::ManualClock)）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn exchange_callback(mut self, callback: Arc<dyn ExchangeCallback>) -> Self {
        self.exchange_callbacks.push(callback);
        self
    }

    /// 构建 [`Timc`]
    ///
    /// 只有打开串口失败或线程创建失败时返回错误；握手失败不是错误，返回的
    /// 实例处于离线模式。
    pub fn build(self) -> Result<Timc, DriverError> {
        let mut hooks = HookManager::new();
        for callback in &self.exchange_callbacks {
            hooks.add_exchange_callback(callback.clone());
        }
        let hooks = Arc::new(RwLock::new(hooks));

        let link = match self.source {
            LinkSource::Offline => None,
            LinkSource::Link(link) => Some(link),
            #[cfg(feature = "serial")]
            LinkSource::Serial { ref port, baud_rate } => {
                let baud_rate = if baud_rate == 0 {
                    timc_protocol::DEFAULT_BAUD_RATE
                } else {
                    baud_rate
                };
                let link = timc_link::SerialLink::open(port, baud_rate, self.read_timeout)?;
                Some(Box::new(link) as BoxedLink)
            },
        };

        let link = link.and_then(|mut link| match handshake(&mut link) {
            Ok(()) => Some(link),
            Err(e) => {
                warn!("Handshake with {} failed: {}", link.describe(), e);
                link.close();
                None
            },
        });

        let (dispatch, client) = lanes();
        let metrics = Arc::new(LinkMetrics::new());
        let facade = CommandFacade::new(client, metrics.clone());
        let dispatcher_running = Arc::new(AtomicBool::new(true));
        let mut workers = Workers::none();
        let worker_config = WorkerConfig {
            enabled: self.background_workers,
            clock: self.clock.clone(),
            fault_monitor: self.fault_monitor_config.clone(),
            feedback: self.feedback_config.clone(),
        };

        let Some(mut link) = link else {
            drop(dispatch);
            facade.set_offline();
            let ctx = Arc::new(MotionContext::new(
                facade,
                offline_axes(&self.axis_names, self.offline_tool),
                self.offline_tool,
                hooks,
            ));
            ctx.set_info(OFFLINE_MESSAGE);
            warn!("Controller not connected, running in offline mode");
            return Ok(Timc::from_parts(ctx, dispatcher_running, workers, worker_config));
        };

        let running = dispatcher_running.clone();
        let loop_hooks = hooks.clone();
        let router_config = self.router_config.clone();
        workers.dispatcher = Some(spawn_named("timc-dispatch", move || {
            dispatch_loop(&mut link, dispatch, metrics, loop_hooks, router_config, running);
        })?);

        let params = [
            read_parameters(&facade, &self.axis_names[0]),
            read_parameters(&facade, &self.axis_names[1]),
        ];
        let tool = ToolKind::from_motor_type(params[0].motor()).unwrap_or_else(|| {
            warn!(
                "Unknown motor type {} on {}, assuming {}",
                params[0].motor_type,
                self.axis_names[0],
                ToolKind::default()
            );
            ToolKind::default()
        });
        info!("Tool identified as {}", tool);

        let [p1, p2] = params;
        let [n1, n2] = self.axis_names.clone();
        let axes = [
            AxisState::new(n1, p1, tool.translator_multiplier()),
            AxisState::new(n2, p2, 1.0),
        ];
        let ctx = Arc::new(MotionContext::new(facade, axes, tool, hooks));
        for id in AxisId::BOTH {
            ctx.disable_with(id, DisableCause::Startup);
        }

        let mut timc = Timc::from_parts(ctx, dispatcher_running, workers, worker_config);
        timc.start_workers()?;

        info!("TIMC started ({} / {})", self.axis_names[0], self.axis_names[1]);
        Ok(timc)
    }
}

impl Default for TimcBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn offline_axes(names: &[String; 2], tool: ToolKind) -> [AxisState; 2] {
    let [n1, n2] = names.clone();
    [
        AxisState::new(n1, AxisParameters::offline_defaults(), tool.translator_multiplier()),
        AxisState::new(n2, AxisParameters::offline_defaults(), 1.0),
    ]
}

pub(crate) fn spawn_named<F>(name: &str, f: F) -> Result<JoinHandle<()>, DriverError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|e| DriverError::IoThread(format!("failed to spawn {name}: {e}")))
}

/// 读取轴参数（`GETPARM`），读取失败的参数保持离线默认值
pub(crate) fn read_parameters(facade: &CommandFacade, axis: &str) -> AxisParameters {
    let mut params = AxisParameters::offline_defaults();
    for param in AxisParameter::STARTUP_ORDER {
        let reply = facade.send(Channel::Control, &Command::GetParam { axis, param });
        match reply.payload() {
            Some(raw) => {
                if let Err(e) = params.apply(param, raw) {
                    warn!("{} {} unreadable ({}), using default", axis, param, e);
                }
            },
            None => warn!("{} {} not available ({}), using default", axis, param, reply),
        }
    }
    params
}
