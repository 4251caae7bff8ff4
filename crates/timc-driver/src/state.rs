//! 共享状态模块
//!
//! [`MotionContext`] 集中保存所有跨线程共享的状态，以 `Arc` 显式传递给分发
//! 线程以外的每个工作线程，没有全局单例。
//!
//! # 单写者约定
//!
//! - 遥测字段（位置/速度/电流/位置误差）只由反馈采样器写入
//! - `enabled` 标志只由使能/去使能逻辑写入（本 crate 内部可见），且只有在
//!   控制器确认状态位后才会置为 true
//!
//! 其他组件只读这些字段。

use crate::channel::{AtomicChannel, Channel};
use crate::facade::CommandFacade;
use crate::hooks::HookManager;
use crate::metrics::LinkMetrics;
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use timc_protocol::{AxisParameters, Command, Reply, ToolKind};

/// 轴标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    /// 轴 1（平移轴）
    Axis1,
    /// 轴 2（周向轴）
    Axis2,
}

impl AxisId {
    pub const BOTH: [AxisId; 2] = [AxisId::Axis1, AxisId::Axis2];

    pub fn index(self) -> usize {
        match self {
            AxisId::Axis1 => 0,
            AxisId::Axis2 => 1,
        }
    }

    /// 另一根轴
    pub fn other(self) -> AxisId {
        match self {
            AxisId::Axis1 => AxisId::Axis2,
            AxisId::Axis2 => AxisId::Axis1,
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisId::Axis1 => f.write_str("axis1"),
            AxisId::Axis2 => f.write_str("axis2"),
        }
    }
}

impl std::str::FromStr for AxisId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "axis1" | "1" => Ok(AxisId::Axis1),
            "axis2" | "2" => Ok(AxisId::Axis2),
            other => Err(format!("unknown axis `{other}`, expected axis1 or axis2")),
        }
    }
}

/// 轴遥测（由反馈采样器刷新）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisTelemetry {
    pub position: f64,
    pub current: f64,
    pub velocity: f64,
    pub position_error: f64,
}

/// 单轴状态
pub struct AxisState {
    name: String,
    enabled: AtomicBool,
    telemetry: ArcSwap<AxisTelemetry>,
    params: ArcSwap<AxisParameters>,
    channel: AtomicChannel,
    /// 点动方向系数（LAPIS 平移轴为 -1）
    jog_multiplier: f64,
}

impl AxisState {
    pub fn new(name: impl Into<String>, params: AxisParameters, jog_multiplier: f64) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(false),
            telemetry: ArcSwap::from_pointee(AxisTelemetry::default()),
            params: ArcSwap::from_pointee(params),
            channel: AtomicChannel::new(Channel::Control),
            jog_multiplier,
        }
    }

    /// 线路命令中使用的轴名
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// 返回之前的值
    pub(crate) fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }

    pub fn telemetry(&self) -> AxisTelemetry {
        **self.telemetry.load()
    }

    pub(crate) fn update_telemetry(&self, update: impl FnOnce(&mut AxisTelemetry)) {
        let mut telemetry = self.telemetry();
        update(&mut telemetry);
        self.telemetry.store(Arc::new(telemetry));
    }

    pub fn params(&self) -> Arc<AxisParameters> {
        self.params.load_full()
    }

    pub(crate) fn set_params(&self, params: AxisParameters) {
        self.params.store(Arc::new(params));
    }

    /// 当前使用的逻辑通道
    pub fn channel(&self) -> Channel {
        self.channel.get(Ordering::Acquire)
    }

    /// 切换逻辑通道（扫描序列接管时为 Scan，结束后恢复 Control）
    pub fn set_channel(&self, channel: Channel) {
        self.channel.set(channel, Ordering::Release);
    }

    pub fn jog_multiplier(&self) -> f64 {
        self.jog_multiplier
    }

    pub fn snapshot(&self) -> AxisSnapshot {
        let params = self.params();
        AxisSnapshot {
            name: self.name.clone(),
            enabled: self.is_enabled(),
            telemetry: self.telemetry(),
            channel: self.channel(),
            units: params.units_name.clone(),
            position_error_limit: params.position_error_threshold,
            current_limit: params.max_current_clamp,
            max_jog_speed: params.max_jog_speed,
        }
    }
}

impl fmt::Debug for AxisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisState")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("telemetry", &self.telemetry())
            .field("channel", &self.channel())
            .finish()
    }
}

/// 单轴状态快照（供界面层轮询）
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSnapshot {
    pub name: String,
    pub enabled: bool,
    pub telemetry: AxisTelemetry,
    pub channel: Channel,
    pub units: String,
    pub position_error_limit: f64,
    pub current_limit: f64,
    pub max_jog_speed: f64,
}

impl AxisSnapshot {
    /// 位置误差超过阈值（界面高亮）
    pub fn position_error_exceeded(&self) -> bool {
        self.telemetry.position_error.abs() > self.position_error_limit
    }

    /// 电流超过钳位值
    pub fn current_exceeded(&self) -> bool {
        self.telemetry.current.abs() > self.current_limit
    }
}

/// 整体状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSnapshot {
    pub online: bool,
    pub tool: ToolKind,
    pub axes: [AxisSnapshot; 2],
    /// 故障文本（确认前保持）
    pub fault: Option<String>,
    /// 非故障提示文本
    pub info: String,
}

/// 运动控制共享上下文
pub struct MotionContext {
    facade: CommandFacade,
    axes: [AxisState; 2],
    tool: ToolKind,
    hooks: Arc<RwLock<HookManager>>,
    metrics: Arc<LinkMetrics>,
    faults: ArcSwap<Vec<String>>,
    info: ArcSwap<String>,
}

impl MotionContext {
    pub(crate) fn new(
        facade: CommandFacade,
        axes: [AxisState; 2],
        tool: ToolKind,
        hooks: Arc<RwLock<HookManager>>,
    ) -> Self {
        let metrics = facade.metrics().clone();
        Self {
            facade,
            axes,
            tool,
            hooks,
            metrics,
            faults: ArcSwap::from_pointee(Vec::new()),
            info: ArcSwap::from_pointee(String::new()),
        }
    }

    pub fn facade(&self) -> &CommandFacade {
        &self.facade
    }

    /// 在指定通道上交换一条命令
    pub fn send(&self, channel: Channel, command: &Command<'_>) -> Reply {
        self.facade.send(channel, command)
    }

    pub fn is_online(&self) -> bool {
        self.facade.is_online()
    }

    pub fn axis(&self, id: AxisId) -> &AxisState {
        &self.axes[id.index()]
    }

    pub fn axis_by_name(&self, name: &str) -> Option<AxisId> {
        AxisId::BOTH
            .into_iter()
            .find(|id| self.axis(*id).name() == name)
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn hooks(&self) -> &Arc<RwLock<HookManager>> {
        &self.hooks
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    /// 当前故障文本（多条以 `; ` 连接），无故障时为 None
    pub fn fault_text(&self) -> Option<String> {
        let faults = self.faults.load();
        if faults.is_empty() {
            None
        } else {
            Some(faults.join("; "))
        }
    }

    pub fn has_fault(&self) -> bool {
        !self.faults.load().is_empty()
    }

    /// 追加故障文本（重复文本只保留一条），返回是否为新故障
    pub(crate) fn push_fault(&self, message: String) -> bool {
        let mut added = false;
        self.faults.rcu(|faults| {
            let mut faults = Vec::clone(faults);
            added = !faults.contains(&message);
            if added {
                faults.push(message.clone());
            }
            faults
        });
        added
    }

    pub(crate) fn clear_faults(&self) {
        self.faults.store(Arc::new(Vec::new()));
    }

    /// 非故障提示文本（如 "SCAN PAUSED"）
    pub fn info(&self) -> String {
        String::clone(&self.info.load())
    }

    pub fn set_info(&self, text: impl Into<String>) {
        self.info.store(Arc::new(text.into()));
    }

    pub fn clear_info(&self) {
        self.set_info(String::new());
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            online: self.is_online(),
            tool: self.tool,
            axes: [
                self.axis(AxisId::Axis1).snapshot(),
                self.axis(AxisId::Axis2).snapshot(),
            ],
            fault: self.fault_text(),
            info: self.info(),
        }
    }
}
