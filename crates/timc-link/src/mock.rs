//! Mock 链路（无硬件依赖）
//!
//! - [`SimulatedController`]: 有状态的内存控制器，解析命令文本并模拟轴使能、
//!   运动到位、故障位图、参数与链路断开
//! - [`ScriptedLink`]: 按顺序返回预设响应，用于握手等简单场景
//!
//! 两者都记录收到的命令，测试可以据此检查命令顺序。

use crate::{LinkError, LinkTransport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// 按顺序返回预设响应的链路
///
/// 响应耗尽后返回空字符串（等价于读取超时）。
pub struct ScriptedLink {
    responses: VecDeque<String>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl ScriptedLink {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: false,
        }
    }

    /// 已发送命令（不含结束符）
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// 共享的发送记录，链路被移入分发线程后仍可读取
    pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }
}

impl LinkTransport for ScriptedLink {
    fn exchange(&mut self, line: &str) -> Result<String, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        self.sent.lock().push(line.to_string());
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[derive(Debug, Clone)]
struct SimAxis {
    enabled: bool,
    position: f64,
    velocity: f64,
    current: f64,
    position_error: f64,
    fault_mask: u32,
    /// 运动目标与剩余的状态查询次数
    pending_move: Option<(f64, u32)>,
    params: HashMap<u16, String>,
}

impl SimAxis {
    fn new() -> Self {
        let params = [
            (32u16, "2"),
            (39, "5"),
            (123, "25"),
            (129, "mm"),
            (2, "250"),
            (41, "3"),
            (1, "1"),
        ]
        .into_iter()
        .map(|(n, v)| (n, v.to_string()))
        .collect();
        Self {
            enabled: false,
            position: 0.0,
            velocity: 0.0,
            current: 0.0,
            position_error: 0.0,
            fault_mask: 0,
            pending_move: None,
            params,
        }
    }

    fn in_position(&self) -> bool {
        self.pending_move.is_none() && self.velocity == 0.0
    }

    fn status_word(&self) -> u32 {
        u32::from(self.enabled) | (u32::from(self.in_position()) << 2)
    }

    /// 每次状态查询推进一步运动
    fn advance(&mut self) {
        if let Some((target, remaining)) = self.pending_move {
            if remaining <= 1 {
                self.position = target;
                self.pending_move = None;
            } else {
                self.pending_move = Some((target, remaining - 1));
            }
        }
    }
}

#[derive(Debug)]
struct SimState {
    axes: HashMap<String, SimAxis>,
    link_down: bool,
    move_latency: u32,
    exchange_delay: Duration,
    in_flight: usize,
    max_in_flight: usize,
    log: Vec<String>,
    overrides: Vec<(String, String)>,
    /// `RESET` 之后不应答的交换次数
    reset_silence: u32,
    /// 重启中：剩余的不应答交换次数
    rebooting: u32,
    resets: usize,
}

/// 模拟控制器
///
/// 克隆得到的句柄共享同一份状态，测试可以在链路被移入分发线程之后继续
/// 操纵控制器（注入故障、移动轴、断开链路）。
///
/// # 示例
///
/// ```
/// use timc_link::LinkTransport;
/// use timc_link::mock::SimulatedController;
///
/// let sim = SimulatedController::new(&["TRANSLATOR", "CIRC"]);
/// let mut link = sim.link();
/// assert_eq!(link.exchange("ENABLE TRANSLATOR").unwrap(), "%\n");
/// assert_eq!(link.exchange("AXISSTATUS(TRANSLATOR)").unwrap(), "%5\n");
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedController {
    pub fn new(axes: &[&str]) -> Self {
        let axes = axes
            .iter()
            .map(|name| (name.to_string(), SimAxis::new()))
            .collect();
        Self {
            state: Arc::new(Mutex::new(SimState {
                axes,
                link_down: false,
                move_latency: 0,
                exchange_delay: Duration::ZERO,
                in_flight: 0,
                max_in_flight: 0,
                log: Vec::new(),
                overrides: Vec::new(),
                reset_silence: 0,
                rebooting: 0,
                resets: 0,
            })),
        }
    }

    /// 创建连接到本控制器的链路
    pub fn link(&self) -> SimulatedLink {
        SimulatedLink {
            controller: self.clone(),
            closed: false,
        }
    }

    /// 运动命令在多少次 `AXISSTATUS` 查询后到位（0 表示立即到位）
    pub fn set_move_latency(&self, polls: u32) {
        self.state.lock().move_latency = polls;
    }

    /// 每次交换的模拟耗时（用于并发测试）
    pub fn set_exchange_delay(&self, delay: Duration) {
        self.state.lock().exchange_delay = delay;
    }

    /// `RESET` 之后控制器重启期间不应答的交换次数
    pub fn set_reset_silence(&self, exchanges: u32) {
        self.state.lock().reset_silence = exchanges;
    }

    /// 收到的 `RESET` 次数
    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn set_link_down(&self, down: bool) {
        self.state.lock().link_down = down;
    }

    pub fn set_fault(&self, axis: &str, mask: u32) {
        if let Some(a) = self.state.lock().axes.get_mut(axis) {
            a.fault_mask = mask;
        }
    }

    pub fn fault(&self, axis: &str) -> u32 {
        self.state.lock().axes.get(axis).map_or(0, |a| a.fault_mask)
    }

    /// 模拟操作者在控制器侧直接移动轴
    pub fn set_position(&self, axis: &str, position: f64) {
        if let Some(a) = self.state.lock().axes.get_mut(axis) {
            a.position = position;
            a.pending_move = None;
        }
    }

    pub fn position(&self, axis: &str) -> f64 {
        self.state.lock().axes.get(axis).map_or(0.0, |a| a.position)
    }

    pub fn set_enabled(&self, axis: &str, enabled: bool) {
        if let Some(a) = self.state.lock().axes.get_mut(axis) {
            a.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, axis: &str) -> bool {
        self.state.lock().axes.get(axis).is_some_and(|a| a.enabled)
    }

    /// 设置电流、速度与位置误差反馈值
    pub fn set_telemetry(&self, axis: &str, current: f64, velocity: f64, position_error: f64) {
        if let Some(a) = self.state.lock().axes.get_mut(axis) {
            a.current = current;
            a.velocity = velocity;
            a.position_error = position_error;
        }
    }

    pub fn set_param(&self, axis: &str, number: u16, value: &str) {
        if let Some(a) = self.state.lock().axes.get_mut(axis) {
            a.params.insert(number, value.to_string());
        }
    }

    pub fn param(&self, axis: &str, number: u16) -> Option<String> {
        self.state
            .lock()
            .axes
            .get(axis)
            .and_then(|a| a.params.get(&number).cloned())
    }

    /// 下一条以 `prefix` 开头的命令返回 `raw`（一次性）
    pub fn inject_response(&self, prefix: &str, raw: &str) {
        self.state
            .lock()
            .overrides
            .push((prefix.to_string(), raw.to_string()));
    }

    /// 收到的所有命令（按到达顺序）
    pub fn command_log(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// 观察到的最大同时在途交换数
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    fn handle(&self, line: &str) -> String {
        let delay = {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.exchange_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.in_flight -= 1;
        state.log.push(line.to_string());
        if state.link_down {
            return String::new();
        }
        if state.rebooting > 0 {
            state.rebooting -= 1;
            return String::new();
        }
        if let Some(pos) = state
            .overrides
            .iter()
            .position(|(prefix, _)| line.starts_with(prefix.as_str()))
        {
            return state.overrides.remove(pos).1;
        }
        let reply = Self::execute(&mut state, line.trim());
        format!("{reply}\n")
    }

    fn execute(state: &mut SimState, line: &str) -> String {
        let latency = state.move_latency;
        let (verb, args) = split_command(line);
        let args: Vec<&str> = args
            .split([' ', ','])
            .filter(|s| !s.is_empty())
            .collect();

        match verb.as_str() {
            "ACKNOWLEDGEALL" => {
                for axis in state.axes.values_mut() {
                    axis.fault_mask = 0;
                }
                "%".to_string()
            },
            "WAIT" | "COMMITPARAMETERS" => "%".to_string(),
            "RESET" => {
                // 重启：两轴去使能，位置归零
                for axis in state.axes.values_mut() {
                    axis.enabled = false;
                    axis.position = 0.0;
                    axis.velocity = 0.0;
                    axis.pending_move = None;
                }
                state.rebooting = state.reset_silence;
                state.resets += 1;
                "%".to_string()
            },
            "POSOFFSET" => {
                // POSOFFSET SET <axis>, <pos>
                match (args.get(1), args.get(2).and_then(|v| v.parse::<f64>().ok())) {
                    (Some(name), Some(pos)) => match state.axes.get_mut(*name) {
                        Some(axis) => {
                            axis.position = pos;
                            "%".to_string()
                        },
                        None => "!".to_string(),
                    },
                    _ => "#".to_string(),
                }
            },
            "SETPARM" => match (
                args.first(),
                args.get(1).and_then(|n| n.parse::<u16>().ok()),
                args.get(2),
            ) {
                (Some(name), Some(number), Some(value)) => match state.axes.get_mut(*name) {
                    Some(axis) => {
                        axis.params.insert(number, value.to_string());
                        "%".to_string()
                    },
                    None => "!".to_string(),
                },
                _ => "#".to_string(),
            },
            _ => {
                let Some(axis) = args.first().and_then(|name| state.axes.get_mut(*name)) else {
                    return "#".to_string();
                };
                match verb.as_str() {
                    "ENABLE" => {
                        if axis.fault_mask != 0 {
                            "!".to_string()
                        } else {
                            axis.enabled = true;
                            "%".to_string()
                        }
                    },
                    "DISABLE" => {
                        axis.enabled = false;
                        axis.pending_move = None;
                        axis.velocity = 0.0;
                        "%".to_string()
                    },
                    "ABORT" => {
                        axis.pending_move = None;
                        axis.velocity = 0.0;
                        "%".to_string()
                    },
                    "FREERUN" => match args.get(1).and_then(|v| v.parse::<f64>().ok()) {
                        Some(_) if !axis.enabled => "!".to_string(),
                        Some(speed) => {
                            axis.velocity = speed;
                            "%".to_string()
                        },
                        None => "#".to_string(),
                    },
                    "MOVEABS" | "MOVEINC" => {
                        let value = args.get(1).and_then(|v| v.parse::<f64>().ok());
                        match value {
                            _ if !axis.enabled => "!".to_string(),
                            Some(value) => {
                                let target = if verb == "MOVEINC" {
                                    axis.position + value
                                } else {
                                    value
                                };
                                if latency == 0 {
                                    axis.position = target;
                                } else {
                                    axis.pending_move = Some((target, latency));
                                }
                                "%".to_string()
                            },
                            None => "#".to_string(),
                        }
                    },
                    "AXISSTATUS" => {
                        let word = axis.status_word();
                        axis.advance();
                        format!("%{word}")
                    },
                    "AXISFAULT" => format!("%{}", axis.fault_mask),
                    "PFBKPROG" => format!("%{}", axis.position),
                    "IFBK" => format!("%{}", axis.current),
                    "VFBK" => format!("%{}", axis.velocity),
                    "PERR" => format!("%{}", axis.position_error),
                    "GETPARM" => args
                        .get(1)
                        .and_then(|n| n.parse::<u16>().ok())
                        .and_then(|n| axis.params.get(&n))
                        .map_or_else(|| "#".to_string(), |v| format!("%{v}")),
                    _ => "#".to_string(),
                }
            },
        }
    }
}

/// 拆分动词与参数：`AXISSTATUS(X)` / `AXISFAULT (X)` / `MOVEABS X 1 F 2`
fn split_command(line: &str) -> (String, String) {
    let verb_end = line
        .find(|c: char| c == ' ' || c == '(')
        .unwrap_or(line.len());
    let verb = line[..verb_end].to_ascii_uppercase();
    let rest = line[verb_end..]
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .to_string();
    (verb, rest)
}

/// 连接到 [`SimulatedController`] 的链路
pub struct SimulatedLink {
    controller: SimulatedController,
    closed: bool,
}

impl LinkTransport for SimulatedLink {
    fn exchange(&mut self, line: &str) -> Result<String, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        Ok(self.controller.handle(line))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        "simulated".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("AXISSTATUS(X)"),
            ("AXISSTATUS".to_string(), "X".to_string())
        );
        assert_eq!(
            split_command("AXISFAULT (X)"),
            ("AXISFAULT".to_string(), "X".to_string())
        );
        assert_eq!(
            split_command("GETPARM(X, 123)"),
            ("GETPARM".to_string(), "X, 123".to_string())
        );
        assert_eq!(
            split_command("MOVEABS X 1 F 2"),
            ("MOVEABS".to_string(), "X 1 F 2".to_string())
        );
        assert_eq!(
            split_command("ACKNOWLEDGEALL"),
            ("ACKNOWLEDGEALL".to_string(), String::new())
        );
    }

    #[test]
    fn test_reset_reboots_controller() {
        let sim = SimulatedController::new(&["A"]);
        sim.set_reset_silence(2);
        let mut link = sim.link();
        link.exchange("ENABLE A").unwrap();
        sim.set_position("A", 7.5);

        assert_eq!(link.exchange("RESET").unwrap(), "%\n");
        assert_eq!(link.exchange("ACKNOWLEDGEALL").unwrap(), "");
        assert_eq!(link.exchange("ACKNOWLEDGEALL").unwrap(), "");
        assert_eq!(link.exchange("ACKNOWLEDGEALL").unwrap(), "%\n");
        assert_eq!(sim.resets(), 1);
        assert_eq!(sim.position("A"), 0.0);
        assert!(!sim.is_enabled("A"));
    }

    #[test]
    fn test_enable_and_move() {
        let sim = SimulatedController::new(&["A"]);
        let mut link = sim.link();

        // 未使能时运动被拒绝
        assert_eq!(link.exchange("MOVEABS A 5 F 1").unwrap(), "!\n");
        assert_eq!(link.exchange("ENABLE A").unwrap(), "%\n");
        assert_eq!(link.exchange("MOVEABS A 5 F 1").unwrap(), "%\n");
        assert_eq!(sim.position("A"), 5.0);
        assert_eq!(link.exchange("MOVEINC A -2 F 1").unwrap(), "%\n");
        assert_eq!(link.exchange("PFBKPROG(A)").unwrap(), "%3\n");
    }

    #[test]
    fn test_move_latency() {
        let sim = SimulatedController::new(&["A"]);
        sim.set_move_latency(2);
        sim.set_enabled("A", true);
        let mut link = sim.link();

        link.exchange("MOVEABS A 10 F 1").unwrap();
        // 运动中：使能但未到位
        assert_eq!(link.exchange("AXISSTATUS(A)").unwrap(), "%1\n");
        assert_eq!(link.exchange("AXISSTATUS(A)").unwrap(), "%1\n");
        assert_eq!(link.exchange("AXISSTATUS(A)").unwrap(), "%5\n");
        assert_eq!(sim.position("A"), 10.0);
    }

    #[test]
    fn test_abort_keeps_position() {
        let sim = SimulatedController::new(&["A"]);
        sim.set_move_latency(5);
        sim.set_enabled("A", true);
        let mut link = sim.link();

        link.exchange("MOVEABS A 10 F 1").unwrap();
        link.exchange("ABORT A").unwrap();
        assert_eq!(link.exchange("AXISSTATUS(A)").unwrap(), "%5\n");
        assert_eq!(sim.position("A"), 0.0);
    }

    #[test]
    fn test_faults_and_acknowledge() {
        let sim = SimulatedController::new(&["A", "B"]);
        let mut link = sim.link();
        sim.set_fault("B", 0b101);

        assert_eq!(link.exchange("AXISFAULT (B)").unwrap(), "%5\n");
        assert_eq!(link.exchange("ENABLE B").unwrap(), "!\n");
        assert_eq!(link.exchange("ACKNOWLEDGEALL").unwrap(), "%\n");
        assert_eq!(sim.fault("B"), 0);
    }

    #[test]
    fn test_params() {
        let sim = SimulatedController::new(&["A"]);
        let mut link = sim.link();
        assert_eq!(link.exchange("GETPARM(A, 123)").unwrap(), "%25\n");
        assert_eq!(link.exchange("SETPARM A, 123, 40").unwrap(), "%\n");
        assert_eq!(sim.param("A", 123).as_deref(), Some("40"));
        assert_eq!(link.exchange("GETPARM(A, 999)").unwrap(), "#\n");
    }

    #[test]
    fn test_link_down_and_injection() {
        let sim = SimulatedController::new(&["A"]);
        let mut link = sim.link();

        sim.inject_response("ABORT", "$\n");
        assert_eq!(link.exchange("ABORT A").unwrap(), "$\n");
        assert_eq!(link.exchange("ABORT A").unwrap(), "%\n");

        sim.set_link_down(true);
        assert_eq!(link.exchange("ABORT A").unwrap(), "");
        assert_eq!(sim.command_log().len(), 3);

        link.close();
        assert!(matches!(link.exchange("ABORT A"), Err(LinkError::Closed)));
    }

    #[test]
    fn test_unknown_axis_and_verb() {
        let sim = SimulatedController::new(&["A"]);
        let mut link = sim.link();
        assert_eq!(link.exchange("ENABLE Z").unwrap(), "#\n");
        assert_eq!(link.exchange("FLY A").unwrap(), "#\n");
    }
}
