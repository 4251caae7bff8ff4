//! # TIMC Client
//!
//! 扫描层与操作台：
//!
//! - [`plan`]：扫描窗口输入校验与扫描点生成
//! - [`sequencer`]：扫描序列状态机（开始 / 暂停 / 继续 / 停止）及其线程
//! - [`estimate`]：剩余时间估算
//! - [`console`]：界面层入口，汇总显示值与控件可用状态
//!
//! # 使用示例
//!
//! ```no_run
//! use std::sync::Arc;
//! use timc_client::{Console, ScanRequest, SequencerConfig};
//! use timc_driver::{AxisId, SystemClock, Timc};
//! use timc_tools::StationSettings;
//!
//! let settings = StationSettings::default();
//! let timc = Timc::builder().serial("/dev/ttyUSB0", 115_200).build().unwrap();
//! let console = Console::new(timc, Arc::new(SystemClock::new()), SequencerConfig::default());
//!
//! for id in AxisId::BOTH {
//!     console.context().enable(id).unwrap();
//! }
//! let request = ScanRequest::from_settings(&settings.scan).unwrap();
//! console.start_scan(&request).unwrap();
//! println!("{}", console.view().remaining);
//! ```

pub mod console;
pub mod error;
pub mod estimate;
pub mod plan;
pub mod sequencer;

pub use console::{Console, ConsoleView, Controls};
pub use error::{ScanError, ScanField};
pub use estimate::{MoveTimer, format_hms};
pub use plan::{ScanDirection, ScanPlan, ScanPoint, ScanRequest, generate};
pub use sequencer::{
    ManualMotion, MoveRole, SCAN_COMPLETE, SCAN_PAUSED, SCAN_STOPPED, ScanProgress,
    ScanSequencer, ScanState, SequencerConfig, rewind_cursors,
};
