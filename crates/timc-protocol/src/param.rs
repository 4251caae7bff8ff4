//! 控制器轴参数
//!
//! 启动时通过 `GETPARM(<axis>, <n>)` 读取以下参数；读取失败时使用离线默认值。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 轴参数编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum AxisParameter {
    /// 运动方向反转
    ReverseMotionDirection = 1,
    /// 每单位计数
    CountsPerUnit = 2,
    /// 位置误差阈值
    PositionErrorThreshold = 32,
    /// 最大电流钳位
    MaxCurrentClamp = 39,
    /// 电机类型
    MotorType = 41,
    /// 最大点动速度
    MaxJogSpeed = 123,
    /// 单位名称
    UnitsName = 129,
}

impl AxisParameter {
    /// 启动时的读取顺序
    pub const STARTUP_ORDER: [AxisParameter; 7] = [
        AxisParameter::PositionErrorThreshold,
        AxisParameter::MaxCurrentClamp,
        AxisParameter::MaxJogSpeed,
        AxisParameter::UnitsName,
        AxisParameter::CountsPerUnit,
        AxisParameter::MotorType,
        AxisParameter::ReverseMotionDirection,
    ];

    /// 控制器参数编号
    pub fn number(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            AxisParameter::ReverseMotionDirection => "ReverseMotionDirection",
            AxisParameter::CountsPerUnit => "CountsPerUnit",
            AxisParameter::PositionErrorThreshold => "PositionErrorThreshold",
            AxisParameter::MaxCurrentClamp => "MaxCurrentClamp",
            AxisParameter::MotorType => "MotorType",
            AxisParameter::MaxJogSpeed => "MaxJogSpeed",
            AxisParameter::UnitsName => "UnitsName",
        }
    }
}

impl TryFrom<u16> for AxisParameter {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AxisParameter::ReverseMotionDirection),
            2 => Ok(AxisParameter::CountsPerUnit),
            32 => Ok(AxisParameter::PositionErrorThreshold),
            39 => Ok(AxisParameter::MaxCurrentClamp),
            41 => Ok(AxisParameter::MotorType),
            123 => Ok(AxisParameter::MaxJogSpeed),
            129 => Ok(AxisParameter::UnitsName),
            _ => Err(ProtocolError::InvalidValue {
                field: "axis_parameter".to_string(),
                value: i64::from(value),
            }),
        }
    }
}

impl FromStr for AxisParameter {
    type Err = ProtocolError;

    /// 接受参数名（不区分大小写）或参数编号
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(number) = s.parse::<u16>() {
            return AxisParameter::try_from(number);
        }
        AxisParameter::STARTUP_ORDER
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::InvalidNumber(s.to_string()))
    }
}

impl fmt::Display for AxisParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.number())
    }
}

/// 电机类型（参数 41）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorType {
    /// 直流有刷
    DcBrush,
    /// 步进电机
    Stepper,
    /// 其他类型（原始编号）
    Other(i64),
}

impl From<i64> for MotorType {
    fn from(value: i64) -> Self {
        match value {
            2 => MotorType::DcBrush,
            3 => MotorType::Stepper,
            other => MotorType::Other(other),
        }
    }
}

/// 扫描工具类型
///
/// 由轴 1 的电机类型决定：直流有刷为 LAPIS，步进为 NOVA。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ToolKind {
    #[default]
    Nova,
    Lapis,
}

impl ToolKind {
    pub fn from_motor_type(motor: MotorType) -> Option<Self> {
        match motor {
            MotorType::DcBrush => Some(ToolKind::Lapis),
            MotorType::Stepper => Some(ToolKind::Nova),
            MotorType::Other(_) => None,
        }
    }

    /// 平移轴点动方向系数（LAPIS 机构方向相反）
    pub fn translator_multiplier(self) -> f64 {
        match self {
            ToolKind::Nova => 1.0,
            ToolKind::Lapis => -1.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Nova => "NOVA",
            ToolKind::Lapis => "LAPIS",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOVA" => Ok(ToolKind::Nova),
            "LAPIS" => Ok(ToolKind::Lapis),
            other => Err(ProtocolError::InvalidNumber(other.to_string())),
        }
    }
}

/// 单轴参数集合
#[derive(Debug, Clone, PartialEq)]
pub struct AxisParameters {
    pub position_error_threshold: f64,
    pub max_current_clamp: f64,
    pub max_jog_speed: f64,
    pub units_name: String,
    pub counts_per_unit: f64,
    pub motor_type: i64,
    /// 参数 1 非零时为 true
    pub reverse_motion_direction: bool,
}

impl AxisParameters {
    /// 离线默认值：`[2, 5, 25, "mm", 250, 2, 1]`
    pub fn offline_defaults() -> Self {
        Self {
            position_error_threshold: 2.0,
            max_current_clamp: 5.0,
            max_jog_speed: 25.0,
            units_name: "mm".to_string(),
            counts_per_unit: 250.0,
            motor_type: 2,
            reverse_motion_direction: true,
        }
    }

    /// 写入一个参数的原始文本值
    ///
    /// 数值解析失败时保持原值并返回错误。
    pub fn apply(&mut self, param: AxisParameter, raw: &str) -> Result<(), ProtocolError> {
        let raw = raw.trim();
        if param == AxisParameter::UnitsName {
            self.units_name = raw.trim_matches('"').to_string();
            return Ok(());
        }
        let value: f64 = raw
            .parse()
            .map_err(|_| ProtocolError::InvalidNumber(raw.to_string()))?;
        match param {
            AxisParameter::PositionErrorThreshold => self.position_error_threshold = value,
            AxisParameter::MaxCurrentClamp => self.max_current_clamp = value,
            AxisParameter::MaxJogSpeed => self.max_jog_speed = value,
            AxisParameter::CountsPerUnit => self.counts_per_unit = value,
            AxisParameter::MotorType => self.motor_type = value as i64,
            AxisParameter::ReverseMotionDirection => self.reverse_motion_direction = value != 0.0,
            AxisParameter::UnitsName => {},
        }
        Ok(())
    }

    pub fn motor(&self) -> MotorType {
        MotorType::from(self.motor_type)
    }

    /// 点动方向符号：方向反转参数置位时为 +1，否则为 -1
    pub fn direction_sign(&self) -> f64 {
        if self.reverse_motion_direction {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for AxisParameters {
    fn default() -> Self {
        Self::offline_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_numbers() {
        let numbers: Vec<u16> = AxisParameter::STARTUP_ORDER
            .iter()
            .map(|p| p.number())
            .collect();
        assert_eq!(numbers, vec![32, 39, 123, 129, 2, 41, 1]);
    }

    #[test]
    fn test_parameter_from_str() {
        assert_eq!(
            "MaxJogSpeed".parse::<AxisParameter>(),
            Ok(AxisParameter::MaxJogSpeed)
        );
        assert_eq!("41".parse::<AxisParameter>(), Ok(AxisParameter::MotorType));
        assert!("999".parse::<AxisParameter>().is_err());
        assert!("bogus".parse::<AxisParameter>().is_err());
    }

    #[test]
    fn test_offline_defaults() {
        let params = AxisParameters::offline_defaults();
        assert_eq!(params.position_error_threshold, 2.0);
        assert_eq!(params.max_current_clamp, 5.0);
        assert_eq!(params.max_jog_speed, 25.0);
        assert_eq!(params.units_name, "mm");
        assert_eq!(params.counts_per_unit, 250.0);
        assert_eq!(params.motor(), MotorType::DcBrush);
        assert!(params.reverse_motion_direction);
        assert_eq!(params.direction_sign(), 1.0);
    }

    #[test]
    fn test_apply() {
        let mut params = AxisParameters::offline_defaults();
        params.apply(AxisParameter::MaxJogSpeed, "30.5").unwrap();
        params.apply(AxisParameter::UnitsName, "\"deg\"").unwrap();
        params.apply(AxisParameter::ReverseMotionDirection, "0").unwrap();
        params.apply(AxisParameter::MotorType, "3").unwrap();
        assert_eq!(params.max_jog_speed, 30.5);
        assert_eq!(params.units_name, "deg");
        assert!(!params.reverse_motion_direction);
        assert_eq!(params.motor(), MotorType::Stepper);

        assert!(params.apply(AxisParameter::CountsPerUnit, "x").is_err());
        assert_eq!(params.counts_per_unit, 250.0);
    }

    #[test]
    fn test_tool_kind() {
        assert_eq!(
            ToolKind::from_motor_type(MotorType::DcBrush),
            Some(ToolKind::Lapis)
        );
        assert_eq!(
            ToolKind::from_motor_type(MotorType::Stepper),
            Some(ToolKind::Nova)
        );
        assert_eq!(ToolKind::from_motor_type(MotorType::Other(7)), None);
        assert_eq!(ToolKind::Lapis.translator_multiplier(), -1.0);
        assert_eq!("lapis".parse::<ToolKind>(), Ok(ToolKind::Lapis));
        assert_eq!(ToolKind::Nova.to_string(), "NOVA");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_tool_kind_serde_uppercase() {
        assert_eq!(serde_json::to_string(&ToolKind::Lapis).unwrap(), "\"LAPIS\"");
        let tool: ToolKind = serde_json::from_str("\"NOVA\"").unwrap();
        assert_eq!(tool, ToolKind::Nova);
        assert!(serde_json::from_str::<ToolKind>("\"nova\"").is_err());
    }
}
