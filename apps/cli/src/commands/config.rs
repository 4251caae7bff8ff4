//! 配置管理命令
//!
//! 管理运行时配置（串口、间隔）与站点设置（工具类型）。

use crate::connect::ConnectArgs;
use anyhow::{Context, Result};
use clap::Subcommand;
use timc_protocol::ToolKind;
use timc_tools::{RuntimeConfig, StationSettings};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认串口
        #[arg(long)]
        port: Option<String>,

        /// 波特率
        #[arg(long)]
        baud_rate: Option<u32>,

        /// 轴名（两个）
        #[arg(long, num_args = 2, value_names = ["AXIS1", "AXIS2"])]
        axis_names: Option<Vec<String>>,

        /// 离线时使用的工具类型（NOVA | LAPIS）
        #[arg(long)]
        tool: Option<ToolKind>,
    },

    /// 显示当前配置
    Show,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    /// `settings` 由调用者在退出时写回
    pub fn execute(
        self,
        args: &ConnectArgs,
        config: &mut RuntimeConfig,
        settings: &mut StationSettings,
    ) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud_rate,
                axis_names,
                tool,
            } => {
                if let Some(port) = port {
                    println!("✅ 设置默认串口: {}", port);
                    config.serial.port = Some(port);
                }
                if let Some(baud_rate) = baud_rate {
                    println!("✅ 设置波特率: {}", baud_rate);
                    config.serial.baud_rate = baud_rate;
                }
                let axis_names = axis_names.and_then(|names| <[String; 2]>::try_from(names).ok());
                if let Some([axis1, axis2]) = axis_names {
                    println!("✅ 设置轴名: {} / {}", axis1, axis2);
                    config.axis_names = Some([axis1, axis2]);
                }
                if let Some(tool) = tool {
                    println!("✅ 设置工具类型: {}", tool);
                    settings.tool = tool;
                }
                let path = args.config_path()?;
                config
                    .save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(())
            },

            ConfigCommand::Show => {
                println!("# {}", args.config_path()?.display());
                println!("{}", toml::to_string_pretty(config)?);
                println!("# {}", args.settings_path()?.display());
                println!("{}", toml::to_string_pretty(settings)?);
                Ok(())
            },

            ConfigCommand::Path => {
                println!("{}", args.config_path()?.display());
                println!("{}", args.settings_path()?.display());
                Ok(())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_writes_runtime_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path();
        let args = ConnectArgs {
            config: Some(dir.join("timc.toml")),
            settings: Some(dir.join("settings.toml")),
            ..Default::default()
        };
        let mut config = RuntimeConfig::default();
        let mut settings = StationSettings::default();

        ConfigCommand::Set {
            port: Some("/dev/ttyUSB3".to_string()),
            baud_rate: None,
            axis_names: Some(vec!["X".to_string(), "Y".to_string()]),
            tool: Some(ToolKind::Lapis),
        }
        .execute(&args, &mut config, &mut settings)
        .unwrap();

        let loaded = RuntimeConfig::load(dir.join("timc.toml")).unwrap();
        assert_eq!(loaded.serial.port.as_deref(), Some("/dev/ttyUSB3"));
        assert_eq!(loaded.axis_names, Some(["X".to_string(), "Y".to_string()]));
        assert_eq!(settings.tool, ToolKind::Lapis);
    }
}
