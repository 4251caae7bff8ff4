//! 操作台
//!
//! 界面层的唯一入口：把操作者动作转换为对运动上下文与扫描序列的调用，并把
//! 需要显示的值汇总为一个 [`ConsoleView`] 供界面轮询。

use crate::error::ScanError;
use crate::plan::ScanRequest;
use crate::sequencer::{ScanProgress, ScanSequencer, ScanState, SequencerConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use timc_driver::{AxisId, Clock, MotionContext, MotionSnapshot, Timc};

/// 控件可用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start: bool,
    pub pause: bool,
    pub resume: bool,
    pub stop: bool,
    /// 各轴手动操作（点动、定位等）
    pub manual: [bool; 2],
}

/// 一次界面刷新所需的全部值
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleView {
    pub motion: MotionSnapshot,
    pub scan: ScanProgress,
    /// `HH:MM:SS`
    pub remaining: String,
    pub controls: Controls,
}

impl ConsoleView {
    /// 状态栏文本：故障优先，其次是提示信息
    pub fn status_line(&self) -> &str {
        match &self.motion.fault {
            Some(fault) => fault,
            None => &self.motion.info,
        }
    }
}

/// 操作台
///
/// 字段按声明顺序析构：扫描序列先停止，随后 [`Timc`] 去使能两轴并关闭链路。
pub struct Console {
    sequencer: ScanSequencer,
    timc: Timc,
    last_request: Mutex<Option<ScanRequest>>,
}

impl Console {
    pub fn new(timc: Timc, clock: Arc<dyn Clock>, config: SequencerConfig) -> Self {
        let sequencer = ScanSequencer::new(timc.context().clone(), clock, config);
        Self {
            sequencer,
            timc,
            last_request: Mutex::new(None),
        }
    }

    pub fn timc(&self) -> &Timc {
        &self.timc
    }

    pub fn context(&self) -> &Arc<MotionContext> {
        self.timc.context()
    }

    pub fn sequencer(&self) -> &ScanSequencer {
        &self.sequencer
    }

    /// 开始扫描；请求无论成功与否都会被记住，用于写回站点设置
    pub fn start_scan(&self, request: &ScanRequest) -> Result<usize, ScanError> {
        *self.last_request.lock() = Some(request.clone());
        self.sequencer.start(request)
    }

    pub fn pause_scan(&self) -> Result<(), ScanError> {
        self.sequencer.pause()
    }

    /// 继续扫描，可同时更新速度
    pub fn resume_scan(&self, speeds: Option<(f64, f64)>) -> Result<(), ScanError> {
        if let Some((scan_speed, index_speed)) = speeds {
            self.sequencer.set_speeds(scan_speed, index_speed)?;
            if let Some(request) = self.last_request.lock().as_mut() {
                request.scan_speed = scan_speed;
                request.index_speed = index_speed;
            }
        }
        self.sequencer.resume()
    }

    pub fn stop_scan(&self) -> ScanState {
        self.sequencer.stop()
    }

    pub fn last_request(&self) -> Option<ScanRequest> {
        self.last_request.lock().clone()
    }

    pub fn view(&self) -> ConsoleView {
        let motion = self.timc.snapshot();
        let scan = self.sequencer.progress();
        let remaining = self.sequencer.remaining_text();
        let controls = controls(&motion, scan.state);
        ConsoleView {
            motion,
            scan,
            remaining,
            controls,
        }
    }
}

fn controls(motion: &MotionSnapshot, state: ScanState) -> Controls {
    let enabled = AxisId::BOTH.map(|id| motion.axes[id.index()].enabled);
    let healthy = motion.online && motion.fault.is_none();
    let both = enabled.iter().all(|e| *e);
    Controls {
        start: healthy && both && !state.is_active(),
        pause: state == ScanState::Running,
        resume: healthy && both && state == ScanState::Paused,
        stop: state.is_active(),
        manual: enabled.map(|e| motion.online && e && state != ScanState::Running),
    }
}
