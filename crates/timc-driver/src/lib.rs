//! # TIMC Driver
//!
//! 命令路由与后台线程层：
//!
//! - 单一分发线程独占物理链路，按 Control > Scan > Status > Feedback 的优先级
//!   依次服务四个逻辑通道（见 [`router`]）
//! - [`CommandFacade::acmd`] 是所有组件交换命令的唯一入口，同步阻塞直到收到
//!   对应通道的响应并完成分类
//! - 故障监视线程（[`fault_monitor`]）与反馈采样线程（[`feedback`]）作为后台
//!   生产者共享同一链路
//! - 控制器复位（[`Timc::reset_controller`]）保留复位前的两轴位置
//!
//! 所有共享状态集中在 [`MotionContext`] 中，以 `Arc` 显式传递给各线程。

pub mod axis;
mod builder;
pub mod channel;
pub mod clock;
pub mod error;
pub mod facade;
pub mod fault_monitor;
pub mod feedback;
pub mod hooks;
pub mod metrics;
mod reset;
pub mod router;
pub mod state;
mod timc;

pub use axis::JogDirection;
pub use builder::{DEFAULT_AXIS_NAMES, TimcBuilder};
pub use channel::{AtomicChannel, Channel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DriverError;
pub use facade::CommandFacade;
pub use fault_monitor::{
    ESTOP_MESSAGE, FaultMonitor, FaultMonitorConfig, FaultPoll, FaultReport, OFFLINE_MESSAGE,
};
pub use feedback::{FEEDBACK_TABLE, FeedbackConfig, FeedbackSampler, FeedbackTick, TelemetryField};
pub use hooks::{
    AxisCallback, DisableCause, ExchangeCallback, ExchangeRecord, ExchangeRecorder, HookManager,
};
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use reset::{COMMIT_MESSAGE, RESET_MESSAGE, ResetReport};
pub use router::RouterConfig;
pub use state::{AxisId, AxisSnapshot, AxisState, AxisTelemetry, MotionContext, MotionSnapshot};
pub use timc::Timc;
