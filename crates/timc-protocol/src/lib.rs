//! # TIMC Protocol
//!
//! 运动控制器 ASCII 命令/响应协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 命令文本构建
//! - `reply`: 响应分类（状态前缀字符）
//! - `status`: `AXISSTATUS` 状态字解析
//! - `fault`: `AXISFAULT` 故障位图与故障表
//! - `param`: 控制器轴参数编号、离线默认值与工具类型
//!
//! ## 线路格式
//!
//! 每条命令是一行 ASCII 文本，以 [`TERMINATOR`] 结尾；控制器对每条命令
//! 只返回一行响应，首个状态字符决定分类（见 [`Reply::classify`]）。

pub mod command;
pub mod fault;
pub mod param;
pub mod reply;
pub mod status;

// 重新导出常用类型
pub use command::Command;
pub use fault::{ESTOP_BIT, FAULT_TABLE_LEN, FaultKind, FaultMask, FaultSlot};
pub use param::{AxisParameter, AxisParameters, MotorType, ToolKind};
pub use reply::Reply;
pub use status::AxisStatus;

use thiserror::Error;

/// 命令结束符（空格 + 换行）
pub const TERMINATOR: &str = " \n";

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 显示与输入允许的最大数值幅度
pub const MAX_DISPLAY_MAGNITUDE: f64 = 9999.0;

/// 协议解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Reply carries no payload: {0}")]
    MissingPayload(String),

    #[error("Invalid numeric payload: {0:?}")]
    InvalidNumber(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: i64 },
}

/// 把数值四舍五入到两位小数（控制器显示精度）
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
