//! 串口链路实现
//!
//! 使用 `serialport` 打开端口，每次交换写出一行命令后逐字节读取，直到遇到
//! `\n` 或读取超时。

use crate::{LinkError, LinkTransport};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use timc_protocol::TERMINATOR;
use tracing::{debug, info, trace};

/// 单行响应的最大长度，超过后截断返回
const MAX_LINE_LEN: usize = 256;

/// 串口链路
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    baud_rate: u32,
}

impl SerialLink {
    /// 打开串口
    ///
    /// # 参数
    ///
    /// - `port_name`: 端口路径（如 `/dev/ttyUSB0`、`COM3`）
    /// - `baud_rate`: 波特率（控制器默认 115200）
    /// - `read_timeout`: 单次读取超时
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud_rate).timeout(read_timeout).open()?;
        info!("Serial port '{}' opened at {} baud", port_name, baud_rate);
        Ok(Self {
            port: Some(port),
            port_name: port_name.to_string(),
            baud_rate,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn read_line(port: &mut dyn SerialPort) -> Result<String, LinkError> {
        let mut line = Vec::with_capacity(32);
        let mut byte = [0u8; 1];
        loop {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' || line.len() >= MAX_LINE_LEN {
                        break;
                    }
                },
                // 超时：返回已读到的内容
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

impl LinkTransport for SerialLink {
    fn exchange(&mut self, line: &str) -> Result<String, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::Closed)?;

        // 丢弃上一轮超时后迟到的残留字节
        port.clear(serialport::ClearBuffer::Input)?;

        port.write_all(line.as_bytes())?;
        port.write_all(TERMINATOR.as_bytes())?;
        port.flush()?;
        trace!("serial tx: {:?}", line);

        let response = Self::read_line(port.as_mut())?;
        trace!("serial rx: {:?}", response);
        Ok(response)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.port_name);
        }
    }

    fn describe(&self) -> String {
        format!("{}@{}", self.port_name, self.baud_rate)
    }
}

/// 列出系统中可用的串口名称
pub fn available_ports() -> Result<Vec<String>, LinkError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}
