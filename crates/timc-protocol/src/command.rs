//! 命令构建模块
//!
//! 把逻辑命令转换为控制器可识别的 ASCII 文本。`Display` 输出即线路文本
//! （不含结束符，结束符由链路层追加）。

use crate::param::AxisParameter;
use std::fmt;

/// 控制器命令
///
/// 轴名称以借用形式保存，命令在构建后立即被格式化为文本发送，不跨线程保存。
///
/// # 示例
///
/// ```
/// use timc_protocol::Command;
///
/// let cmd = Command::MoveAbs { axis: "TRANSLATOR", position: 20.0, speed: 12.4 };
/// assert_eq!(cmd.to_string(), "MOVEABS TRANSLATOR 20 F 12.4");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    /// 使能轴
    Enable { axis: &'a str },
    /// 去使能轴
    Disable { axis: &'a str },
    /// 中止轴上的运动
    Abort { axis: &'a str },
    /// 自由运行（点动），速度带符号，0 表示停止
    FreeRun { axis: &'a str, speed: f64 },
    /// 绝对运动
    MoveAbs {
        axis: &'a str,
        position: f64,
        speed: f64,
    },
    /// 增量运动
    MoveInc {
        axis: &'a str,
        distance: f64,
        speed: f64,
    },
    /// 设置当前位置（程序坐标偏移）
    PosOffsetSet { axis: &'a str, position: f64 },
    /// 查询轴状态字
    AxisStatus { axis: &'a str },
    /// 查询轴故障位图
    AxisFault { axis: &'a str },
    /// 程序位置反馈
    PositionFeedback { axis: &'a str },
    /// 电流反馈
    CurrentFeedback { axis: &'a str },
    /// 速度反馈
    VelocityFeedback { axis: &'a str },
    /// 位置误差
    PositionError { axis: &'a str },
    /// 确认并清除所有故障
    AcknowledgeAll,
    /// 读取轴参数
    GetParam {
        axis: &'a str,
        param: AxisParameter,
    },
    /// 写入轴参数（需 `CommitParameters` 才会持久化）
    SetParam {
        axis: &'a str,
        param: AxisParameter,
        value: &'a str,
    },
    /// 提交参数到控制器闪存
    CommitParameters,
    /// 切换为非等待模式（运动命令立即返回）
    WaitModeNoWait,
    /// 控制器软复位
    Reset,
}

impl Command<'_> {
    /// 命令涉及的轴（全局命令返回 None）
    pub fn axis(&self) -> Option<&str> {
        match self {
            Command::Enable { axis }
            | Command::Disable { axis }
            | Command::Abort { axis }
            | Command::FreeRun { axis, .. }
            | Command::MoveAbs { axis, .. }
            | Command::MoveInc { axis, .. }
            | Command::PosOffsetSet { axis, .. }
            | Command::AxisStatus { axis }
            | Command::AxisFault { axis }
            | Command::PositionFeedback { axis }
            | Command::CurrentFeedback { axis }
            | Command::VelocityFeedback { axis }
            | Command::PositionError { axis }
            | Command::GetParam { axis, .. }
            | Command::SetParam { axis, .. } => Some(*axis),
            Command::AcknowledgeAll
            | Command::CommitParameters
            | Command::WaitModeNoWait
            | Command::Reset => None,
        }
    }

    /// 是否为只读查询（不改变控制器状态）
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::AxisStatus { .. }
                | Command::AxisFault { .. }
                | Command::PositionFeedback { .. }
                | Command::CurrentFeedback { .. }
                | Command::VelocityFeedback { .. }
                | Command::PositionError { .. }
                | Command::GetParam { .. }
        )
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Enable { axis } => write!(f, "ENABLE {axis}"),
            Command::Disable { axis } => write!(f, "DISABLE {axis}"),
            Command::Abort { axis } => write!(f, "ABORT {axis}"),
            Command::FreeRun { axis, speed } => write!(f, "FREERUN {axis} {speed}"),
            Command::MoveAbs {
                axis,
                position,
                speed,
            } => write!(f, "MOVEABS {axis} {position} F {speed}"),
            Command::MoveInc {
                axis,
                distance,
                speed,
            } => write!(f, "MOVEINC {axis} {distance} F {speed}"),
            Command::PosOffsetSet { axis, position } => {
                write!(f, "POSOFFSET SET {axis}, {position}")
            },
            Command::AxisStatus { axis } => write!(f, "AXISSTATUS({axis})"),
            // AXISFAULT 与括号之间带空格
            Command::AxisFault { axis } => write!(f, "AXISFAULT ({axis})"),
            Command::PositionFeedback { axis } => write!(f, "PFBKPROG({axis})"),
            Command::CurrentFeedback { axis } => write!(f, "IFBK({axis})"),
            Command::VelocityFeedback { axis } => write!(f, "VFBK({axis})"),
            Command::PositionError { axis } => write!(f, "PERR({axis})"),
            Command::AcknowledgeAll => f.write_str("ACKNOWLEDGEALL"),
            Command::GetParam { axis, param } => {
                write!(f, "GETPARM({axis}, {})", param.number())
            },
            Command::SetParam { axis, param, value } => {
                write!(f, "SETPARM {axis}, {}, {value}", param.number())
            },
            Command::CommitParameters => f.write_str("COMMITPARAMETERS"),
            Command::WaitModeNoWait => f.write_str("WAIT MODE NOWAIT"),
            Command::Reset => f.write_str("RESET"),
        }
    }
}
