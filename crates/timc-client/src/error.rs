//! 扫描层错误类型
//!
//! 校验错误的 Display 文本就是展示给操作者的提示，界面层可以直接显示。

use std::fmt;
use thiserror::Error;
use timc_driver::DriverError;

/// 扫描窗口的五个文本输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanField {
    ScanStart,
    ScanStop,
    IndexStart,
    IndexStop,
    IndexStep,
}

impl ScanField {
    pub const ALL: [ScanField; 5] = [
        ScanField::ScanStart,
        ScanField::ScanStop,
        ScanField::IndexStart,
        ScanField::IndexStop,
        ScanField::IndexStep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScanField::ScanStart => "scan start",
            ScanField::ScanStop => "scan stop",
            ScanField::IndexStart => "index start",
            ScanField::IndexStop => "index stop",
            ScanField::IndexStep => "index step",
        }
    }
}

impl fmt::Display for ScanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 扫描错误
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("User must enter all five scan window inputs")]
    MissingInput { field: ScanField },

    #[error("Error associated with '-' character")]
    InvalidMinus { field: ScanField },

    #[error("Error associated with '.' character")]
    InvalidPeriod { field: ScanField },

    #[error("Error scan inputs have characters")]
    NotANumber { field: ScanField },

    #[error("Value exceeds display limits")]
    ExceedsLimit { field: ScanField },

    #[error("Scan or Index Speed is 0")]
    ZeroSpeed,

    #[error("Start/Stop Values are Same")]
    SameStartStop,

    #[error("Index Size must not be 0")]
    ZeroStep,

    #[error("Index Size must be a multiple of Index Start - Index Stop")]
    StepNotMultiple,

    /// 保存的设置无法转换为扫描请求
    #[error("Invalid scan setting: {0}")]
    InvalidSetting(String),

    #[error("A scan is already active")]
    AlreadyActive,

    #[error("No scan is running")]
    NotRunning,

    #[error("Scan is not paused")]
    NotPaused,

    /// 故障未确认时不能开始或继续扫描
    #[error("Fault active, acknowledge faults first")]
    FaultActive,

    #[error("Both axes must be enabled")]
    AxesDisabled,

    #[error("Controller offline")]
    Offline,

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 扫描线程错误
    #[error("Scan worker error: {0}")]
    Worker(String),
}

impl ScanError {
    /// 出错的输入框（仅校验错误）
    pub fn field(&self) -> Option<ScanField> {
        match self {
            ScanError::MissingInput { field }
            | ScanError::InvalidMinus { field }
            | ScanError::InvalidPeriod { field }
            | ScanError::NotANumber { field }
            | ScanError::ExceedsLimit { field } => Some(*field),
            _ => None,
        }
    }

    /// 是否为输入校验错误（未产生任何副作用）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScanError::MissingInput { .. }
                | ScanError::InvalidMinus { .. }
                | ScanError::InvalidPeriod { .. }
                | ScanError::NotANumber { .. }
                | ScanError::ExceedsLimit { .. }
                | ScanError::ZeroSpeed
                | ScanError::SameStartStop
                | ScanError::ZeroStep
                | ScanError::StepNotMultiple
        )
    }
}
