//! `AXISSTATUS` 状态字

use crate::{ProtocolError, Reply};

/// 轴状态字（`AXISSTATUS(<axis>)` 的返回值）
///
/// - Bit 0: 已使能
/// - Bit 2: 到位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisStatus(pub u32);

impl AxisStatus {
    /// 使能位
    pub const ENABLED: u32 = 0b1;
    /// 到位位
    pub const IN_POSITION: u32 = 0b100;

    /// 从响应解析
    pub fn from_reply(reply: &Reply) -> Result<Self, ProtocolError> {
        let raw = reply.as_i64()?;
        u32::try_from(raw)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidValue {
                field: "axis_status".to_string(),
                value: raw,
            })
    }

    pub fn enabled(self) -> bool {
        self.0 & Self::ENABLED != 0
    }

    pub fn in_position(self) -> bool {
        self.0 & Self::IN_POSITION != 0
    }

    /// 已使能且到位，可以下发下一段运动
    pub fn ready(self) -> bool {
        self.enabled() && self.in_position()
    }
}
