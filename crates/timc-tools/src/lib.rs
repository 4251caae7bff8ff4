//! # TIMC Tools - 配置文件
//!
//! **依赖原则**: 只依赖 `timc-protocol`，不依赖驱动层与扫描层
//!
//! ## 包含模块
//!
//! - `settings` - 站点设置（工具类型、上次扫描输入）
//! - `config` - 运行时配置（串口、后台线程间隔）
//!
//! 两个文件都是 TOML，默认位于 `dirs::config_dir()/timc/`。

pub mod config;
pub mod settings;

pub use config::{CONFIG_FILE, IntervalConfig, RuntimeConfig, SerialConfig};
pub use settings::{SETTINGS_FILE, ScanSettings, StationSettings};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置文件错误
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl SettingsError {
    fn io(path: &Path, source: io::Error) -> Self {
        SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 配置目录 `<config_dir>/timc`
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("timc"))
}

fn write_file(path: &Path, content: &str) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| SettingsError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| SettingsError::io(path, e))
}
