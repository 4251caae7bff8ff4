//! 扫描计划
//!
//! 校验操作者输入的五个扫描窗口文本，并生成有序的扫描点序列。扫描点在开始
//! 扫描时计算一次，之后不再改变。
//!
//! # 点序列
//!
//! - 双向：扫描轴每隔一步在两个边界间往返，索引轴每隔一步前进一个步长，
//!   形成蛇形路径，长度 `2n + 2`
//! - 单向：每三个点中扫描轴先到终点再回到起点（回程），然后索引轴前进，
//!   长度 `3n + 3`
//!
//! 其中 `n = |索引终点 - 索引起点| / 步长`。

use crate::error::{ScanError, ScanField};
use std::fmt;
use std::str::FromStr;
use timc_driver::AxisId;
use timc_protocol::{MAX_DISPLAY_MAGNITUDE, round2};
use timc_tools::ScanSettings;

/// 步长整除判断的容差（以步数计）
const DIVISIBILITY_TOLERANCE: f64 = 1e-6;

/// 扫描方向模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    Unidirectional,
    #[default]
    Bidirectional,
}

impl ScanDirection {
    /// 每个索引步对应的点数
    pub fn points_per_step(self) -> usize {
        match self {
            ScanDirection::Unidirectional => 3,
            ScanDirection::Bidirectional => 2,
        }
    }
}

impl fmt::Display for ScanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanDirection::Unidirectional => f.write_str("Unidirectional"),
            ScanDirection::Bidirectional => f.write_str("Bidirectional"),
        }
    }
}

impl FromStr for ScanDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unidirectional" | "uni" => Ok(ScanDirection::Unidirectional),
            "bidirectional" | "bi" => Ok(ScanDirection::Bidirectional),
            other => Err(format!(
                "unknown scan direction `{other}`, expected Unidirectional or Bidirectional"
            )),
        }
    }
}

/// 开始扫描请求（操作者原始输入）
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub scan_start: String,
    pub scan_stop: String,
    pub index_start: String,
    pub index_stop: String,
    pub index_step: String,
    pub scan_speed: f64,
    pub index_speed: f64,
    pub direction: ScanDirection,
    /// 扫描轴，另一根轴为索引轴
    pub scan_axis: AxisId,
}

impl ScanRequest {
    /// 从保存的站点设置恢复上次的扫描输入
    pub fn from_settings(settings: &ScanSettings) -> Result<Self, ScanError> {
        let direction = settings
            .direction
            .parse::<ScanDirection>()
            .map_err(ScanError::InvalidSetting)?;
        let scan_axis = settings
            .scan_axis
            .parse::<AxisId>()
            .map_err(ScanError::InvalidSetting)?;
        Ok(Self {
            scan_start: settings.scan_start.clone(),
            scan_stop: settings.scan_stop.clone(),
            index_start: settings.index_start.clone(),
            index_stop: settings.index_stop.clone(),
            index_step: settings.index_step.clone(),
            scan_speed: settings.scan_speed,
            index_speed: settings.index_speed,
            direction,
            scan_axis,
        })
    }

    /// 写回站点设置（文本原样保存）
    pub fn write_settings(&self, settings: &mut ScanSettings) {
        settings.scan_start = self.scan_start.clone();
        settings.scan_stop = self.scan_stop.clone();
        settings.index_start = self.index_start.clone();
        settings.index_stop = self.index_stop.clone();
        settings.index_step = self.index_step.clone();
        settings.scan_speed = self.scan_speed;
        settings.index_speed = self.index_speed;
        settings.direction = self.direction.to_string();
        settings.scan_axis = self.scan_axis.to_string();
    }

    fn bounds(&self) -> [(ScanField, &str); 5] {
        [
            (ScanField::ScanStart, self.scan_start.as_str()),
            (ScanField::ScanStop, self.scan_stop.as_str()),
            (ScanField::IndexStart, self.index_start.as_str()),
            (ScanField::IndexStop, self.index_stop.as_str()),
            (ScanField::IndexStep, self.index_step.as_str()),
        ]
    }
}

/// 扫描点：（扫描轴目标，索引轴目标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub scan: f64,
    pub index: f64,
}

/// 已校验的扫描计划
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub direction: ScanDirection,
    pub scan_axis: AxisId,
    pub scan_start: f64,
    pub scan_stop: f64,
    pub index_start: f64,
    pub index_stop: f64,
    /// 步长（已取绝对值）
    pub index_step: f64,
    pub scan_speed: f64,
    pub index_speed: f64,
    points: Vec<ScanPoint>,
}

impl ScanPlan {
    /// 校验请求并生成扫描点
    ///
    /// 校验顺序：五个文本输入逐个检查，然后速度，然后起止点与步长。任何
    /// 失败都在发出运动命令之前返回。
    pub fn from_request(request: &ScanRequest) -> Result<Self, ScanError> {
        let mut values = [0.0; 5];
        for (value, (field, text)) in values.iter_mut().zip(request.bounds()) {
            *value = parse_bound(field, text)?;
        }

        for speed in [request.scan_speed, request.index_speed] {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(ScanError::ZeroSpeed);
            }
        }

        let [scan_start, scan_stop, index_start, index_stop, index_step] = values.map(round2);
        if scan_start == scan_stop || index_start == index_stop {
            return Err(ScanError::SameStartStop);
        }
        let index_step = index_step.abs();
        if index_step == 0.0 {
            return Err(ScanError::ZeroStep);
        }
        if step_count(index_start, index_stop, index_step).is_none() {
            return Err(ScanError::StepNotMultiple);
        }

        let points = generate(
            request.direction,
            scan_start,
            scan_stop,
            index_start,
            index_stop,
            index_step,
        );
        Ok(Self {
            direction: request.direction,
            scan_axis: request.scan_axis,
            scan_start,
            scan_stop,
            index_start,
            index_stop,
            index_step,
            scan_speed: request.scan_speed,
            index_speed: request.index_speed,
            points,
        })
    }

    pub fn points(&self) -> &[ScanPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn index_axis(&self) -> AxisId {
        self.scan_axis.other()
    }

    /// 扫描轴位置是否仍在扫描范围内（与起止点顺序无关）
    pub fn scan_range_contains(&self, position: f64) -> bool {
        let (low, high) = if self.scan_start <= self.scan_stop {
            (self.scan_start, self.scan_stop)
        } else {
            (self.scan_stop, self.scan_start)
        };
        (low..=high).contains(&position)
    }
}

/// 校验单个边界文本并解析
///
/// 至多一个 `-` 且只能在开头，至多一个 `.`，其余必须是数字，绝对值不超过
/// 显示上限。
pub fn parse_bound(field: ScanField, text: &str) -> Result<f64, ScanError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ScanError::MissingInput { field });
    }
    let minus = text.matches('-').count();
    if minus > 1 || (minus == 1 && !text.starts_with('-')) {
        return Err(ScanError::InvalidMinus { field });
    }
    if text.matches('.').count() > 1 {
        return Err(ScanError::InvalidPeriod { field });
    }
    let digits = text.trim_start_matches('-');
    if !digits.chars().any(|c| c.is_ascii_digit())
        || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return Err(ScanError::NotANumber { field });
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| ScanError::NotANumber { field })?;
    if value.abs() > MAX_DISPLAY_MAGNITUDE {
        return Err(ScanError::ExceedsLimit { field });
    }
    Ok(value)
}

/// 索引步数 `n`，步长不能整除索引范围时返回 None
pub fn step_count(index_start: f64, index_stop: f64, index_step: f64) -> Option<usize> {
    if !(index_step.is_finite() && index_step > 0.0) {
        return None;
    }
    let ratio = (index_stop - index_start).abs() / index_step;
    let n = ratio.round();
    if n < 1.0 || (ratio - n).abs() > DIVISIBILITY_TOLERANCE {
        return None;
    }
    Some(n as usize)
}

/// 给定步数时的点序列长度
pub fn expected_len(direction: ScanDirection, steps: usize) -> usize {
    direction.points_per_step() * (steps + 1)
}

/// 生成扫描点序列
///
/// 输入应已通过校验；步长无法整除索引范围时返回空序列。索引值沿
/// `index_start → index_stop` 方向前进，保留两位小数。
pub fn generate(
    direction: ScanDirection,
    scan_start: f64,
    scan_stop: f64,
    index_start: f64,
    index_stop: f64,
    index_step: f64,
) -> Vec<ScanPoint> {
    let Some(steps) = step_count(index_start, index_stop, index_step) else {
        return Vec::new();
    };
    let sign = (index_stop - index_start).signum();
    let index_at = |k: usize| round2(index_start + k as f64 * index_step * sign);

    (0..expected_len(direction, steps))
        .map(|i| match direction {
            ScanDirection::Unidirectional => ScanPoint {
                scan: if i % 3 == 1 { scan_stop } else { scan_start },
                index: index_at(i / 3),
            },
            ScanDirection::Bidirectional => ScanPoint {
                scan: if (i + 1) / 2 % 2 == 1 { scan_stop } else { scan_start },
                index: index_at(i / 2),
            },
        })
        .collect()
}
