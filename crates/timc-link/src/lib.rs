//! # TIMC Link
//!
//! 单一物理串口链路的传输抽象。
//!
//! 链路层只负责"发送一行、读取一行"：追加结束符、写出命令、在短超时内读取
//! 一行响应并原样返回（超时返回空字符串）。不做重试，也不做分类，分类由
//! 命令路由层完成。
//!
//! ## 后端
//!
//! - `serial`（默认）：基于 `serialport` 的真实串口
//! - `mock`：内存中的模拟控制器，用于测试

use std::time::Duration;
use thiserror::Error;
use timc_protocol::{Command, Reply};
use tracing::{debug, warn};

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "serial")]
pub use serial::{SerialLink, available_ports};

/// 默认读取超时（50ms）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// 链路错误
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Link closed")]
    Closed,
}

/// 链路传输 Trait
///
/// 同一时刻只能有一个线程持有实现者（由命令路由的分发线程独占）。
pub trait LinkTransport {
    /// 发送一条命令并读取一行响应
    ///
    /// 实现者负责追加 [`timc_protocol::TERMINATOR`]。读取超时不是错误，返回
    /// 已读到的内容（可能为空字符串）。
    fn exchange(&mut self, line: &str) -> Result<String, LinkError>;

    /// 关闭链路，之后的 `exchange` 应返回 [`LinkError::Closed`]
    fn close(&mut self) {}

    /// 链路描述（用于日志）
    fn describe(&self) -> String {
        "link".to_string()
    }
}

impl<T: LinkTransport + ?Sized> LinkTransport for Box<T> {
    fn exchange(&mut self, line: &str) -> Result<String, LinkError> {
        (**self).exchange(line)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// 上线握手
///
/// 发送 `ACKNOWLEDGEALL`，响应含 `%` 即认为控制器在线；随后发送
/// `WAIT MODE NOWAIT` 并丢弃其响应。必须在分发线程启动之前直接在链路上执行。
pub fn handshake(link: &mut impl LinkTransport) -> Result<(), LinkError> {
    let ack = link.exchange(&Command::AcknowledgeAll.to_string())?;
    if !ack.contains('%') {
        warn!("Controller did not acknowledge on {}: {:?}", link.describe(), ack);
        return Err(LinkError::Handshake(format!(
            "unexpected response to ACKNOWLEDGEALL: {}",
            Reply::classify(&ack)
        )));
    }
    let mode = link.exchange(&Command::WaitModeNoWait.to_string())?;
    debug!("WAIT MODE NOWAIT -> {:?}", mode);
    Ok(())
}
