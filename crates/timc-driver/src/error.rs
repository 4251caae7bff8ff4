//! 驱动层错误类型定义

use thiserror::Error;
use timc_link::LinkError;
use timc_protocol::{ProtocolError, Reply};

/// 驱动层错误类型
///
/// 单条命令的协议级失败（`!` / `#` / `$` 等）不是 Rust 错误，而是
/// [`Reply`] 的取值；只有调用方需要把失败上报给操作者时才包装为
/// [`DriverError::Rejected`]。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路错误
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令通道已关闭（分发线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 控制器离线（已观察到链路断开）
    #[error("Controller offline")]
    Offline,

    /// 轴未使能
    #[error("Axis {0} is not enabled")]
    AxisDisabled(String),

    /// 轴正由扫描序列控制
    #[error("Axis {0} is controlled by the active scan")]
    AxisBusy(String),

    /// 控制器拒绝了命令
    #[error("Command `{command}` rejected: {reply}")]
    Rejected { command: String, reply: Reply },

    /// 后台线程错误
    #[error("Worker thread error: {0}")]
    IoThread(String),

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
