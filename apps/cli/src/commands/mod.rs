//! 命令定义和实现

pub mod axis;
pub mod config;
pub mod reset;
pub mod scan;
pub mod status;

pub use axis::AxisCommand;
pub use config::ConfigCommand;
pub use scan::ScanCommand;
pub use status::{MonitorCommand, StatusCommand};
