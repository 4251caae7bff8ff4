//! # 站点设置
//!
//! 启动时读取一次、退出时写回一次的操作者设置：工具类型、上次的扫描窗口
//! 输入（按输入原文保存）、扫描方向、扫描轴与两个扫描速度。
//!
//! ```toml
//! tool = "NOVA"
//!
//! [scan]
//! scan_start = "0"
//! scan_stop = "50"
//! index_start = "0"
//! index_stop = "100"
//! index_step = "25"
//! direction = "Bidirectional"
//! scan_axis = "axis1"
//! scan_speed = 12.4
//! index_speed = 12.4
//! ```

use crate::SettingsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use timc_protocol::ToolKind;
use tracing::{debug, info};

/// 站点设置文件名
pub const SETTINGS_FILE: &str = "settings.toml";

/// 站点设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StationSettings {
    /// 工具类型（控制器离线时使用）
    pub tool: ToolKind,

    /// 上次扫描输入
    pub scan: ScanSettings,
}

/// 扫描窗口设置
///
/// 边界保存为文本，原样回填到输入框；校验在开始扫描时进行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub scan_start: String,
    pub scan_stop: String,
    pub index_start: String,
    pub index_stop: String,
    pub index_step: String,
    /// "Unidirectional" | "Bidirectional"
    pub direction: String,
    /// "axis1" | "axis2"
    pub scan_axis: String,
    pub scan_speed: f64,
    pub index_speed: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scan_start: "0".to_string(),
            scan_stop: "50".to_string(),
            index_start: "0".to_string(),
            index_stop: "100".to_string(),
            index_step: "25".to_string(),
            direction: "Bidirectional".to_string(),
            scan_axis: "axis1".to_string(),
            scan_speed: 12.4,
            index_speed: 12.4,
        }
    }
}

impl StationSettings {
    /// 默认路径
    ///
    /// - Linux: `~/.config/timc/settings.toml`
    /// - Windows: `%APPDATA%\timc\settings.toml`
    pub fn default_path() -> Option<PathBuf> {
        crate::config_dir().map(|dir| dir.join(SETTINGS_FILE))
    }

    /// 读取设置，文件不存在时返回默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(SettingsError::io(path, e)),
        };
        let settings = toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// 写回设置（必要时创建目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        crate::write_file(path, &content)?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StationSettings::default();
        assert_eq!(settings.tool, ToolKind::Nova);
        assert_eq!(settings.scan.scan_stop, "50");
        assert_eq!(settings.scan.index_stop, "100");
        assert_eq!(settings.scan.index_step, "25");
        assert_eq!(settings.scan.direction, "Bidirectional");
        assert_eq!(settings.scan.scan_speed, 12.4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: StationSettings = toml::from_str(
            r#"
            tool = "LAPIS"

            [scan]
            index_step = "-5"
            "#,
        )
        .unwrap();
        assert_eq!(settings.tool, ToolKind::Lapis);
        assert_eq!(settings.scan.index_step, "-5");
        assert_eq!(settings.scan.scan_axis, "axis1");
    }

    #[test]
    fn test_tool_serialized_uppercase() {
        let text = toml::to_string(&StationSettings::default()).unwrap();
        assert!(text.contains("tool = \"NOVA\""));
    }
}
