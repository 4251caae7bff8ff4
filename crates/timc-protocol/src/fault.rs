//! 故障位图解析
//!
//! `AXISFAULT (<axis>)` 返回一个位图，每一位对应一种故障。故障表共 29 位，
//! 其中若干位保留未用，解码为 [`FaultSlot::Unused`]；表外的位解码为
//! [`FaultSlot::Unknown`]。
//!
//! 急停（ESTOP，bit 11）独立于故障表处理：任一轴报告急停时两轴同时去使能。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 急停位
pub const ESTOP_BIT: u8 = 11;

/// 故障表长度（位 0..=28）
pub const FAULT_TABLE_LEN: usize = 29;

/// 已定义的故障类型，判别值即位序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FaultKind {
    PositionError = 0,
    OverCurrent = 1,
    PositiveEndOfTravel = 2,
    NegativeEndOfTravel = 3,
    HighSoftwareLimit = 4,
    LowSoftwareLimit = 5,
    Amplifier = 6,
    PositionFeedback = 7,
    VelocityFeedback = 8,
    HallSensor = 9,
    MaxVelocityCommand = 10,
    EmergencyStop = 11,
    VelocityError = 12,
    External = 15,
    MotorTemperature = 17,
    AmplifierTemperature = 18,
    Encoder = 19,
    CommunicationLost = 20,
    FeedbackScaling = 23,
    MarkerSearch = 24,
    VoltageClamp = 27,
    PowerSupply = 28,
}

impl FaultKind {
    /// 位序号
    pub fn bit(self) -> u8 {
        self.into()
    }

    /// 人类可读名称
    pub fn name(self) -> &'static str {
        match self {
            FaultKind::PositionError => "PositionError Fault",
            FaultKind::OverCurrent => "OverCurrent Fault",
            FaultKind::PositiveEndOfTravel => "CW/Positive End-of-Travel Limit Fault",
            FaultKind::NegativeEndOfTravel => "CCW/Negative End-of-Travel Limit Fault",
            FaultKind::HighSoftwareLimit => "CW/High Software Limit Fault",
            FaultKind::LowSoftwareLimit => "CCW/Low Software Limit Fault",
            FaultKind::Amplifier => "Amplifier Fault",
            FaultKind::PositionFeedback => "Position Feedback Fault",
            FaultKind::VelocityFeedback => "Velocity Feedback Fault",
            FaultKind::HallSensor => "Hall Sensor Fault",
            FaultKind::MaxVelocityCommand => "Maximum Velocity Command Fault",
            FaultKind::EmergencyStop => "Emergency Stop Fault",
            FaultKind::VelocityError => "Velocity Error Fault",
            FaultKind::External => "External Fault",
            FaultKind::MotorTemperature => "Motor Temperature Fault",
            FaultKind::AmplifierTemperature => "Amplifier Temperature Fault",
            FaultKind::Encoder => "Encoder Fault",
            FaultKind::CommunicationLost => "Communication Lost Fault",
            FaultKind::FeedbackScaling => "Feedback Scaling Fault",
            FaultKind::MarkerSearch => "Marker Search Fault",
            FaultKind::VoltageClamp => "Voltage Clamp Fault",
            FaultKind::PowerSupply => "Power Supply Fault",
        }
    }
}

/// 故障表中的一个槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultSlot {
    /// 已定义的故障
    Fault(FaultKind),
    /// 保留位
    Unused,
    /// 超出故障表的位
    Unknown,
}

impl FaultSlot {
    /// 位序号 → 故障槽位
    pub fn from_bit(bit: u8) -> Self {
        match FaultKind::try_from(bit) {
            Ok(kind) => FaultSlot::Fault(kind),
            Err(_) if usize::from(bit) < FAULT_TABLE_LEN => FaultSlot::Unused,
            Err(_) => FaultSlot::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FaultSlot::Fault(kind) => kind.name(),
            FaultSlot::Unused => "N/A",
            FaultSlot::Unknown => "Unknown Fault",
        }
    }
}

impl fmt::Display for FaultSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单轴故障位图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultMask(pub u32);

impl FaultMask {
    /// 无故障
    pub fn is_clear(self) -> bool {
        self.0 == 0
    }

    /// 急停位是否置位
    pub fn is_estop(self) -> bool {
        self.0 & (1 << ESTOP_BIT) != 0
    }

    /// 逐位解码，返回所有置位的 (位序号, 槽位)，按位序号升序
    ///
    /// 超出故障表范围的位解码为 [`FaultSlot::Unknown`]。
    pub fn decode(self) -> Vec<(u8, FaultSlot)> {
        (0..u32::BITS as u8)
            .filter(|bit| self.0 & (1 << bit) != 0)
            .map(|bit| (bit, FaultSlot::from_bit(bit)))
            .collect()
    }
}

impl From<u32> for FaultMask {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
