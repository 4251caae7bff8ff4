//! 扫描序列
//!
//! 按扫描计划依次驱动扫描轴与索引轴到每个扫描点。两轴严格交替运动，不做
//! 同时的联动：
//!
//! - `i`：扫描轴已完成的点数
//! - `j`：索引轴已完成的点数
//!
//! 每个 tick 中，`i == j` 时下一步是扫描轴运动，否则是索引轴追上扫描轴，
//! 因此始终满足 `j <= i <= j + 1`。运动在两轴都使能、都到位且无故障时才会
//! 发出（`MOVEABS`，Scan 通道），之后每个 tick 查询该轴到位位，到位后前进
//! 对应游标。
//!
//! # 状态机
//!
//! ```text
//! Idle → Running ⇄ Paused
//!          ↓          ↓
//!   Completed | StoppedByUser | StoppedByFault
//! ```
//!
//! 运动中检测到故障、或任一轴被去使能时暂停而不是停止，操作者确认故障后
//! 可以原地继续。只有链路断开才会以 `StoppedByFault` 结束。

use crate::error::ScanError;
use crate::estimate::{MoveTimer, axis_remaining, format_hms};
use crate::plan::{ScanDirection, ScanPlan, ScanRequest};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use timc_driver::{AxisCallback, AxisId, Channel, Clock, DisableCause, MotionContext};
use timc_protocol::Command;
use tracing::{debug, info, warn};

pub const SCAN_PAUSED: &str = "SCAN PAUSED";
pub const SCAN_STOPPED: &str = "SCAN STOPPED";
pub const SCAN_COMPLETE: &str = "SCAN COMPLETE";

/// 扫描序列配置
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// tick 间隔（默认 250ms）
    pub poll_interval: Duration,
    /// 是否在开始扫描时启动扫描线程（测试中关闭后手动调用 `tick`）
    pub spawn_worker: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            spawn_worker: true,
        }
    }
}

/// 扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    /// 所有扫描点完成
    Completed,
    StoppedByUser,
    /// 链路断开
    StoppedByFault,
}

impl ScanState {
    /// Running 或 Paused
    pub fn is_active(self) -> bool {
        matches!(self, ScanState::Running | ScanState::Paused)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ScanState::Idle => "idle",
            ScanState::Running => "running",
            ScanState::Paused => "paused",
            ScanState::Completed => "completed",
            ScanState::StoppedByUser => "stopped",
            ScanState::StoppedByFault => "stopped (link lost)",
        };
        f.write_str(text)
    }
}

/// 正在运动的轴的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRole {
    Scan,
    Index,
}

impl MoveRole {
    fn slot(self) -> usize {
        match self {
            MoveRole::Scan => 0,
            MoveRole::Index => 1,
        }
    }
}

impl fmt::Display for MoveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRole::Scan => f.write_str("scan"),
            MoveRole::Index => f.write_str("index"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// 没有在途运动，等待两轴就绪
    Settled,
    /// 已发出运动命令，等待到位
    Moving { role: MoveRole, started: Duration },
}

/// 扫描进度快照
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub state: ScanState,
    /// 扫描轴游标 `i`
    pub scan_cursor: usize,
    /// 索引轴游标 `j`
    pub index_cursor: usize,
    pub total: usize,
    pub moving: Option<MoveRole>,
    pub remaining: Duration,
}

/// 暂停后操作者对轴的手动移动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManualMotion {
    pub scan_moved: bool,
    pub index_moved: bool,
    /// 扫描轴当前位置仍在扫描范围内
    pub scan_in_range: bool,
}

/// 继续扫描前回退游标，返回新的 `(i, j)`
///
/// 操作者在暂停期间手动移动了轴时，回退到最近的有效扫描点重新出发，而不是
/// 从手动移动后的位置继续。
pub fn rewind_cursors(
    direction: ScanDirection,
    i: usize,
    j: usize,
    motion: ManualMotion,
) -> (usize, usize) {
    let back = |c: usize| c.saturating_sub(1);
    match (motion.scan_moved, motion.index_moved) {
        (true, true) if j > 0 => (back(i), back(j)),
        (true, true) => (back(i), j),
        (true, false) if i == j => {
            if motion.scan_in_range || i == 0 {
                (i, j)
            } else {
                (back(i), back(j))
            }
        },
        (true, false) => (back(i), back(j)),
        (false, true) => match direction {
            ScanDirection::Unidirectional => {
                let i = i - i % 3;
                (i, i)
            },
            ScanDirection::Bidirectional => (back(i), back(j)),
        },
        (false, false) => (i, j),
    }
}

struct Progress {
    state: ScanState,
    plan: Option<Arc<ScanPlan>>,
    i: usize,
    j: usize,
    phase: Phase,
    /// 暂停后尚未采样位置
    just_paused: bool,
    /// 暂停时的位置，按 [扫描轴, 索引轴]
    paused_at: [Option<f64>; 2],
    timers: [MoveTimer; 2],
    /// 被暂停打断的运动已用时间
    carried: [Duration; 2],
    /// [扫描速度, 索引速度]
    speeds: [f64; 2],
    remaining: Duration,
    estimated_at: Duration,
}

impl Progress {
    fn idle() -> Self {
        Self {
            state: ScanState::Idle,
            plan: None,
            i: 0,
            j: 0,
            phase: Phase::Settled,
            just_paused: false,
            paused_at: [None; 2],
            timers: [MoveTimer::new(); 2],
            carried: [Duration::ZERO; 2],
            speeds: [0.0; 2],
            remaining: Duration::ZERO,
            estimated_at: Duration::ZERO,
        }
    }
}

struct SequencerInner {
    ctx: Arc<MotionContext>,
    clock: Arc<dyn Clock>,
    config: SequencerConfig,
    progress: Mutex<Progress>,
}

impl SequencerInner {
    fn axis_for(plan: &ScanPlan, role: MoveRole) -> AxisId {
        match role {
            MoveRole::Scan => plan.scan_axis,
            MoveRole::Index => plan.index_axis(),
        }
    }

    fn tick(&self) -> ScanState {
        let mut p = self.progress.lock();
        if !p.state.is_active() {
            return p.state;
        }
        if !self.ctx.is_online() {
            warn!("Link lost, scan stopped at point {}/{}", p.i, total(&p));
            self.finish(&mut p, ScanState::StoppedByFault);
            return p.state;
        }
        let Some(plan) = p.plan.clone() else {
            return p.state;
        };

        if p.state == ScanState::Paused {
            if p.just_paused {
                self.sample_paused(&mut p, &plan);
            }
            return p.state;
        }

        match p.phase {
            Phase::Moving { role, started } => self.poll_move(&mut p, &plan, role, started),
            Phase::Settled => self.next_move(&mut p, &plan),
        }
        p.state
    }

    /// 在途运动：故障则暂停，到位则前进游标
    fn poll_move(&self, p: &mut Progress, plan: &ScanPlan, role: MoveRole, started: Duration) {
        if self.ctx.has_fault() {
            warn!("Fault during {} move, pausing scan", role);
            self.pause_locked(p);
            return;
        }
        let axis = Self::axis_for(plan, role);
        // 查询失败与仍在运动同样处理：下个 tick 重新查询
        let in_position = self
            .ctx
            .status(axis, Channel::Scan)
            .is_some_and(|status| status.in_position());
        if !in_position {
            return;
        }

        let slot = role.slot();
        let elapsed =
            self.clock.now().saturating_sub(started) + std::mem::take(&mut p.carried[slot]);
        p.timers[slot].record(elapsed);
        let cursor = match role {
            MoveRole::Scan => {
                p.i += 1;
                p.i
            },
            MoveRole::Index => {
                p.j += 1;
                p.j
            },
        };
        p.phase = Phase::Settled;
        debug!("{} axis reached point {}/{} in {:?}", role, cursor, plan.len(), elapsed);
    }

    /// 无在途运动：两轴就绪时发出下一个运动
    fn next_move(&self, p: &mut Progress, plan: &ScanPlan) {
        let len = plan.len();
        let role = if p.i == p.j && p.i < len {
            MoveRole::Scan
        } else if p.j < len {
            MoveRole::Index
        } else {
            info!("Scan complete ({} points)", len);
            self.abort_both(plan);
            self.finish(p, ScanState::Completed);
            self.ctx.set_info(SCAN_COMPLETE);
            return;
        };

        if self.ctx.has_fault() {
            return;
        }
        let ready = [plan.scan_axis, plan.index_axis()].into_iter().all(|id| {
            self.ctx
                .status(id, Channel::Scan)
                .is_some_and(|status| status.enabled() && status.in_position())
        });
        if !ready {
            return;
        }

        self.estimate(p, plan);
        let (cursor, target) = match role {
            MoveRole::Scan => (p.i, plan.points()[p.i].scan),
            MoveRole::Index => (p.j, plan.points()[p.j].index),
        };
        let axis = Self::axis_for(plan, role);
        let command = Command::MoveAbs {
            axis: self.ctx.axis(axis).name(),
            position: target,
            speed: p.speeds[role.slot()],
        };
        let reply = self.ctx.send(Channel::Scan, &command);
        if !reply.is_success() {
            // 不区分"命令失败"与"仍在运动"，继续轮询到位
            warn!("`{}` not accepted ({}), polling for in-position", command, reply);
        }
        debug!("Moving {} axis to point {}/{} ({})", role, cursor + 1, len, target);
        p.phase = Phase::Moving {
            role,
            started: self.clock.now(),
        };
    }

    fn pause_locked(&self, p: &mut Progress) {
        let remaining = self.remaining_now(p);
        if let Some(plan) = p.plan.clone() {
            self.abort_both(&plan);
        }
        if let Phase::Moving { role, started } = p.phase {
            p.carried[role.slot()] += self.clock.now().saturating_sub(started);
        }
        p.phase = Phase::Settled;
        p.just_paused = true;
        p.remaining = remaining;
        p.state = ScanState::Paused;
        self.release_axes();
        self.ctx.set_info(SCAN_PAUSED);
        info!("Scan paused at point {}/{}", p.i, total(p));
    }

    fn sample_paused(&self, p: &mut Progress, plan: &ScanPlan) {
        p.paused_at = self.sample_positions(plan);
        p.just_paused = false;
        debug!("Paused positions: {:?}", p.paused_at);
    }

    /// 按 [扫描轴, 索引轴] 读取程序位置
    fn sample_positions(&self, plan: &ScanPlan) -> [Option<f64>; 2] {
        [plan.scan_axis, plan.index_axis()].map(|id| self.ctx.sample_position(id, Channel::Scan))
    }

    fn abort_both(&self, plan: &ScanPlan) {
        for id in [plan.scan_axis, plan.index_axis()] {
            let command = Command::Abort {
                axis: self.ctx.axis(id).name(),
            };
            let reply = self.ctx.send(Channel::Scan, &command);
            if !reply.is_success() {
                warn!("`{}` failed: {}", command, reply);
            }
        }
    }

    /// 轴交还给手动操作
    fn release_axes(&self) {
        for id in AxisId::BOTH {
            self.ctx.axis(id).set_channel(Channel::Control);
        }
    }

    fn claim_axes(&self) {
        for id in AxisId::BOTH {
            self.ctx.axis(id).set_channel(Channel::Scan);
        }
    }

    fn finish(&self, p: &mut Progress, state: ScanState) {
        p.state = state;
        p.phase = Phase::Settled;
        p.just_paused = false;
        p.remaining = Duration::ZERO;
        self.release_axes();
    }

    fn estimate(&self, p: &mut Progress, plan: &ScanPlan) {
        let [Some(scan_pos), Some(index_pos)] = self.sample_positions(plan) else {
            debug!("Position unavailable, keeping previous estimate");
            return;
        };
        let scan_targets: Vec<f64> = plan.points().iter().map(|pt| pt.scan).collect();
        let index_targets: Vec<f64> = plan.points().iter().map(|pt| pt.index).collect();
        p.remaining = axis_remaining(&scan_targets, p.i, scan_pos, p.speeds[0], &p.timers[0])
            + axis_remaining(&index_targets, p.j, index_pos, p.speeds[1], &p.timers[1]);
        p.estimated_at = self.clock.now();
    }

    fn remaining_now(&self, p: &Progress) -> Duration {
        match p.state {
            ScanState::Running => p
                .remaining
                .saturating_sub(self.clock.now().saturating_sub(p.estimated_at)),
            ScanState::Paused => p.remaining,
            _ => Duration::ZERO,
        }
    }
}

fn total(p: &Progress) -> usize {
    p.plan.as_ref().map_or(0, |plan| plan.len())
}

fn check_speed(speed: f64) -> Result<f64, ScanError> {
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err(ScanError::ZeroSpeed)
    }
}

/// 轴被去使能时暂停正在运行的扫描
struct PauseOnDisable {
    inner: Weak<SequencerInner>,
}

impl AxisCallback for PauseOnDisable {
    fn on_axis_disabled(&self, axis: AxisId, cause: DisableCause) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut p = inner.progress.lock();
        if p.state == ScanState::Running {
            info!("{} disabled ({:?}), pausing scan", inner.ctx.axis(axis).name(), cause);
            inner.pause_locked(&mut p);
        }
    }
}

/// 扫描序列
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use timc_client::{ScanDirection, ScanRequest, ScanSequencer, SequencerConfig};
/// use timc_driver::{AxisId, SystemClock, Timc};
///
/// let timc = Timc::builder().serial("/dev/ttyUSB0", 115_200).build().unwrap();
/// let sequencer = ScanSequencer::new(
///     timc.context().clone(),
///     Arc::new(SystemClock::new()),
///     SequencerConfig::default(),
/// );
/// let request = ScanRequest {
///     scan_start: "0".into(),
///     scan_stop: "50".into(),
///     index_start: "0".into(),
///     index_stop: "100".into(),
///     index_step: "25".into(),
///     scan_speed: 12.4,
///     index_speed: 12.4,
///     direction: ScanDirection::Bidirectional,
///     scan_axis: AxisId::Axis1,
/// };
/// sequencer.start(&request).unwrap();
/// ```
pub struct ScanSequencer {
    inner: Arc<SequencerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScanSequencer {
    /// 创建扫描序列并注册去使能回调
    pub fn new(ctx: Arc<MotionContext>, clock: Arc<dyn Clock>, config: SequencerConfig) -> Self {
        let inner = Arc::new(SequencerInner {
            ctx,
            clock,
            config,
            progress: Mutex::new(Progress::idle()),
        });
        inner
            .ctx
            .hooks()
            .write()
            .add_axis_callback(Arc::new(PauseOnDisable {
                inner: Arc::downgrade(&inner),
            }));
        Self {
            inner,
            worker: Mutex::new(None),
        }
    }

    /// 校验请求并开始扫描，返回扫描点数
    ///
    /// 校验失败时不产生任何副作用。
    pub fn start(&self, request: &ScanRequest) -> Result<usize, ScanError> {
        let mut worker = self.worker.lock();
        if self.inner.progress.lock().state.is_active() {
            return Err(ScanError::AlreadyActive);
        }
        let plan = Arc::new(ScanPlan::from_request(request)?);

        let ctx = &self.inner.ctx;
        if !ctx.is_online() {
            return Err(ScanError::Offline);
        }
        if ctx.has_fault() {
            return Err(ScanError::FaultActive);
        }
        if !AxisId::BOTH.into_iter().all(|id| ctx.axis(id).is_enabled()) {
            return Err(ScanError::AxesDisabled);
        }

        // 上一次扫描的线程在下一个 tick 退出
        if let Some(previous) = worker.take()
            && previous.join().is_err()
        {
            warn!("Previous scan worker panicked");
        }

        {
            let mut p = self.inner.progress.lock();
            *p = Progress::idle();
            p.speeds = [plan.scan_speed, plan.index_speed];
            p.plan = Some(plan.clone());
            p.state = ScanState::Running;
            self.inner.claim_axes();
            ctx.clear_info();
            info!(
                "Scan started: {}, scan {} {} -> {}, index {} {} -> {} step {}, {} points",
                plan.direction,
                ctx.axis(plan.scan_axis).name(),
                plan.scan_start,
                plan.scan_stop,
                ctx.axis(plan.index_axis()).name(),
                plan.index_start,
                plan.index_stop,
                plan.index_step,
                plan.len()
            );
            debug!("Scan points: {:?}", plan.points());
            self.inner.estimate(&mut p, &plan);
        }

        if self.inner.config.spawn_worker {
            let inner = self.inner.clone();
            let spawned = thread::Builder::new()
                .name("timc-scan".to_string())
                .spawn(move || {
                    loop {
                        inner.clock.sleep(inner.config.poll_interval);
                        if !inner.tick().is_active() {
                            break;
                        }
                    }
                    debug!("Scan worker exited");
                });
            match spawned {
                Ok(handle) => *worker = Some(handle),
                Err(e) => {
                    let mut p = self.inner.progress.lock();
                    self.inner.finish(&mut p, ScanState::Idle);
                    return Err(ScanError::Worker(e.to_string()));
                },
            }
        }
        Ok(plan.len())
    }

    /// 推进一步（扫描线程每个轮询间隔调用一次）
    pub fn tick(&self) -> ScanState {
        self.inner.tick()
    }

    /// 暂停：中止两轴运动，轴交还给手动操作
    pub fn pause(&self) -> Result<(), ScanError> {
        let mut p = self.inner.progress.lock();
        if p.state != ScanState::Running {
            return Err(ScanError::NotRunning);
        }
        self.inner.pause_locked(&mut p);
        Ok(())
    }

    /// 暂停期间修改速度，继续扫描时生效
    pub fn set_speeds(&self, scan_speed: f64, index_speed: f64) -> Result<(), ScanError> {
        let mut p = self.inner.progress.lock();
        if p.state != ScanState::Paused {
            return Err(ScanError::NotPaused);
        }
        p.speeds = [check_speed(scan_speed)?, check_speed(index_speed)?];
        Ok(())
    }

    /// 继续扫描
    ///
    /// 重新采样两轴位置，与暂停时比较；操作者手动移动过的轴按
    /// [`rewind_cursors`] 回退游标。
    pub fn resume(&self) -> Result<(), ScanError> {
        let mut p = self.inner.progress.lock();
        if p.state != ScanState::Paused {
            return Err(ScanError::NotPaused);
        }
        let ctx = &self.inner.ctx;
        if !ctx.is_online() {
            return Err(ScanError::Offline);
        }
        if ctx.has_fault() {
            return Err(ScanError::FaultActive);
        }
        if !AxisId::BOTH.into_iter().all(|id| ctx.axis(id).is_enabled()) {
            return Err(ScanError::AxesDisabled);
        }
        let Some(plan) = p.plan.clone() else {
            return Err(ScanError::NotRunning);
        };

        if p.just_paused {
            self.inner.sample_paused(&mut p, &plan);
        }
        let now = self.inner.sample_positions(&plan);
        let moved = |slot: usize| {
            matches!((p.paused_at[slot], now[slot]), (Some(a), Some(b)) if a != b)
        };
        let motion = ManualMotion {
            scan_moved: moved(0),
            index_moved: moved(1),
            scan_in_range: now[0].is_some_and(|pos| plan.scan_range_contains(pos)),
        };
        let (i, j) = rewind_cursors(plan.direction, p.i, p.j, motion);
        if (i, j) != (p.i, p.j) {
            info!(
                "Manual motion while paused ({:?}), rewinding ({}, {}) -> ({}, {})",
                motion, p.i, p.j, i, j
            );
        }
        p.i = i;
        p.j = j;
        p.phase = Phase::Settled;
        p.state = ScanState::Running;
        self.inner.claim_axes();
        self.inner.estimate(&mut p, &plan);
        ctx.clear_info();
        info!("Scan resumed at point {}/{}", p.i, plan.len());
        Ok(())
    }

    /// 停止扫描（任何状态下都可以调用）
    pub fn stop(&self) -> ScanState {
        let mut p = self.inner.progress.lock();
        if !p.state.is_active() {
            return p.state;
        }
        if let Some(plan) = p.plan.clone()
            && self.inner.ctx.is_online()
        {
            self.inner.abort_both(&plan);
        }
        self.inner.finish(&mut p, ScanState::StoppedByUser);
        self.inner.ctx.set_info(SCAN_STOPPED);
        info!("Scan stopped at point {}/{}", p.i, total(&p));
        p.state
    }

    pub fn state(&self) -> ScanState {
        self.inner.progress.lock().state
    }

    pub fn progress(&self) -> ScanProgress {
        let p = self.inner.progress.lock();
        ScanProgress {
            state: p.state,
            scan_cursor: p.i,
            index_cursor: p.j,
            total: total(&p),
            moving: match p.phase {
                Phase::Moving { role, .. } => Some(role),
                Phase::Settled => None,
            },
            remaining: self.inner.remaining_now(&p),
        }
    }

    /// 当前（或最近一次）扫描计划
    pub fn plan(&self) -> Option<Arc<ScanPlan>> {
        self.inner.progress.lock().plan.clone()
    }

    /// 当前速度 [扫描, 索引]
    pub fn speeds(&self) -> [f64; 2] {
        self.inner.progress.lock().speeds
    }

    /// 剩余时间 `HH:MM:SS`，无活动扫描时为 "00:00:00"
    pub fn remaining_text(&self) -> String {
        let p = self.inner.progress.lock();
        format_hms(self.inner.remaining_now(&p))
    }
}

impl Drop for ScanSequencer {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.lock().take()
            && handle.join().is_err()
        {
            warn!("Scan worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion(scan_moved: bool, index_moved: bool, scan_in_range: bool) -> ManualMotion {
        ManualMotion {
            scan_moved,
            index_moved,
            scan_in_range,
        }
    }

    #[test]
    fn test_rewind_no_motion() {
        let bi = ScanDirection::Bidirectional;
        assert_eq!(rewind_cursors(bi, 5, 4, motion(false, false, true)), (5, 4));
    }

    #[test]
    fn test_rewind_both_axes_moved() {
        let bi = ScanDirection::Bidirectional;
        assert_eq!(rewind_cursors(bi, 5, 4, motion(true, true, false)), (4, 3));
        assert_eq!(rewind_cursors(bi, 1, 0, motion(true, true, false)), (0, 0));
        assert_eq!(rewind_cursors(bi, 0, 0, motion(true, true, false)), (0, 0));
    }

    #[test]
    fn test_rewind_scan_axis_moved() {
        let bi = ScanDirection::Bidirectional;
        // 扫描轴仍在范围内，原地继续
        assert_eq!(rewind_cursors(bi, 4, 4, motion(true, false, true)), (4, 4));
        // 首个运动前移动
        assert_eq!(rewind_cursors(bi, 0, 0, motion(true, false, false)), (0, 0));
        assert_eq!(rewind_cursors(bi, 4, 4, motion(true, false, false)), (3, 3));
        // 索引轴待运动时移动了扫描轴
        assert_eq!(rewind_cursors(bi, 5, 4, motion(true, false, true)), (4, 3));
    }

    #[test]
    fn test_rewind_index_axis_moved() {
        let uni = ScanDirection::Unidirectional;
        assert_eq!(rewind_cursors(uni, 5, 4, motion(false, true, true)), (3, 3));
        assert_eq!(rewind_cursors(uni, 6, 6, motion(false, true, true)), (6, 6));
        let bi = ScanDirection::Bidirectional;
        assert_eq!(rewind_cursors(bi, 3, 3, motion(false, true, true)), (2, 2));
    }

    #[test]
    fn test_scan_state_flags() {
        assert!(ScanState::Running.is_active());
        assert!(ScanState::Paused.is_active());
        assert!(!ScanState::Completed.is_active());
        assert_eq!(ScanState::StoppedByFault.to_string(), "stopped (link lost)");
    }
}
