//! # 运行时配置
//!
//! `timc.toml`：串口与各后台线程的间隔。所有字段都有默认值，文件中只需写
//! 需要覆盖的项。
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout_ms = 50
//!
//! [intervals]
//! fault_poll_ms = 500
//! scan_poll_ms = 250
//! ```

use crate::SettingsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timc_protocol::DEFAULT_BAUD_RATE;
use tracing::debug;

/// 运行时配置文件名
pub const CONFIG_FILE: &str = "timc.toml";

/// 运行时配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 轴名（默认 TRANSLATOR / CIRCUMFERENTIAL）
    pub axis_names: Option<[String; 2]>,
    pub serial: SerialConfig,
    pub intervals: IntervalConfig,
}

/// 串口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// 串口设备，未设置时需要命令行指定
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 50,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// 后台线程间隔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// 分发线程空闲睡眠
    pub router_idle_us: u64,
    pub fault_poll_ms: u64,
    pub feedback_tick_us: u64,
    pub scan_poll_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            router_idle_us: 100,
            fault_poll_ms: 500,
            feedback_tick_us: 200,
            scan_poll_ms: 250,
        }
    }
}

impl IntervalConfig {
    pub fn router_idle(&self) -> Duration {
        Duration::from_micros(self.router_idle_us)
    }

    pub fn fault_poll(&self) -> Duration {
        Duration::from_millis(self.fault_poll_ms)
    }

    pub fn feedback_tick(&self) -> Duration {
        Duration::from_micros(self.feedback_tick_us)
    }

    pub fn scan_poll(&self) -> Duration {
        Duration::from_millis(self.scan_poll_ms)
    }
}

impl RuntimeConfig {
    /// 默认路径
    ///
    /// - Linux: `~/.config/timc/timc.toml`
    /// - Windows: `%APPDATA%\timc\timc.toml`
    pub fn default_path() -> Option<PathBuf> {
        crate::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// 读取配置，文件不存在时返回默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No runtime config at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(SettingsError::io(path, e)),
        };
        toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        crate::write_file(path.as_ref(), &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout(), Duration::from_millis(50));
        assert_eq!(config.intervals.fault_poll(), Duration::from_millis(500));
        assert_eq!(config.intervals.scan_poll(), Duration::from_millis(250));
        assert!(config.axis_names.is_none());
    }

    #[test]
    fn test_override_subset() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            axis_names = ["X", "Y"]

            [serial]
            port = "COM3"

            [intervals]
            scan_poll_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.port.as_deref(), Some("COM3"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.intervals.scan_poll(), Duration::from_millis(100));
        assert_eq!(config.intervals.feedback_tick(), Duration::from_micros(200));
        assert_eq!(config.axis_names, Some(["X".to_string(), "Y".to_string()]));
    }
}
