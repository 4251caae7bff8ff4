//! 响应分类模块
//!
//! 控制器对每条命令返回一行文本，由状态字符标记结果：
//!
//! | 内容 | 分类 |
//! |------|------|
//! | 含 `!` | 执行错误（Bad-Execution） |
//! | 含 `#` | 已接收但无法执行（Cannot-Execute） |
//! | 含 `$` | 命令超时（Timeout） |
//! | 空字符串 | 链路断开（Link-Down） |
//! | 含 `%` | 成功，`%` 之后为数据 |
//! | 其他 | 未分类错误 |
//!
//! 按表中顺序匹配，首个命中即为结果。

use crate::ProtocolError;
use std::fmt;

/// 已分类的命令结果
///
/// 除 `Data` / `Ack` 以外的所有分类都表示"命令没有产生效果"，调用方不得
/// 假设轴或控制器状态已改变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 成功并携带数据（`%` 之后的文本）
    Data(String),
    /// 成功但无数据
    Ack,
    /// 执行错误（`!`）
    BadExecution,
    /// 已接收但当前无法执行（`#`）
    CannotExecute,
    /// 控制器内部命令超时（`$`）
    Timeout,
    /// 链路断开（空响应）
    LinkDown,
    /// 无法识别的响应，保存原始文本
    Unclassified(String),
}

impl Reply {
    /// 按状态字符分类原始响应行
    ///
    /// # 示例
    ///
    /// ```
    /// use timc_protocol::Reply;
    ///
    /// assert_eq!(Reply::classify("%12.34\n"), Reply::Data("12.34".to_string()));
    /// assert_eq!(Reply::classify("!\n"), Reply::BadExecution);
    /// assert_eq!(Reply::classify(""), Reply::LinkDown);
    /// ```
    pub fn classify(raw: &str) -> Self {
        if raw.contains('!') {
            return Reply::BadExecution;
        }
        if raw.contains('#') {
            return Reply::CannotExecute;
        }
        if raw.contains('$') {
            return Reply::Timeout;
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Reply::LinkDown;
        }
        match trimmed.split_once('%') {
            Some((_, payload)) => {
                let payload = payload.trim();
                if payload.is_empty() {
                    Reply::Ack
                } else {
                    Reply::Data(payload.to_string())
                }
            },
            None => Reply::Unclassified(trimmed.to_string()),
        }
    }

    /// 是否为成功分类
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Data(_) | Reply::Ack)
    }

    /// 是否表示链路断开
    pub fn is_link_down(&self) -> bool {
        matches!(self, Reply::LinkDown)
    }

    /// 成功时的数据
    pub fn payload(&self) -> Option<&str> {
        match self {
            Reply::Data(payload) => Some(payload.as_str()),
            _ => None,
        }
    }

    /// 把数据解析为浮点数
    pub fn as_f64(&self) -> Result<f64, ProtocolError> {
        let payload = self
            .payload()
            .ok_or_else(|| ProtocolError::MissingPayload(self.to_string()))?;
        payload
            .parse::<f64>()
            .map_err(|_| ProtocolError::InvalidNumber(payload.to_string()))
    }

    /// 把数据解析为整数
    ///
    /// 控制器有时以浮点格式返回位图（如 `"5.0"`），此时截断为整数。
    pub fn as_i64(&self) -> Result<i64, ProtocolError> {
        let payload = self
            .payload()
            .ok_or_else(|| ProtocolError::MissingPayload(self.to_string()))?;
        if let Ok(value) = payload.parse::<i64>() {
            return Ok(value);
        }
        payload
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v as i64)
            .ok_or_else(|| ProtocolError::InvalidNumber(payload.to_string()))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Data(payload) => write!(f, "success ({payload})"),
            Reply::Ack => f.write_str("success"),
            Reply::BadExecution => f.write_str("bad execution"),
            Reply::CannotExecute => f.write_str("cannot execute"),
            Reply::Timeout => f.write_str("command timeout"),
            Reply::LinkDown => f.write_str("link down"),
            Reply::Unclassified(raw) => write!(f, "unclassified response {raw:?}"),
        }
    }
}
