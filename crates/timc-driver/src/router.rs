//! 命令路由模块
//!
//! 单一分发线程独占物理链路。每轮循环按优先级（Control > Scan > Status >
//! Feedback）检查四个请求队列，只服务第一个非空队列中的一个请求：经链路
//! 交换后把原始响应放入同一通道的响应队列。
//!
//! 由此保证：
//! - 链路上同一时刻最多只有一个在途命令（严格请求/响应，无流水线）
//! - 高优先级通道有待处理请求时，低优先级通道不会前进
//!
//! 所有队列空闲时睡眠一个固定的短间隔，不会无限期阻塞。

use crate::channel::Channel;
use crate::hooks::HookManager;
use crate::metrics::LinkMetrics;
use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use timc_link::LinkTransport;
use tracing::{debug, error, info, trace};

/// 路由配置
///
/// # Example
///
/// ```
/// use timc_driver::RouterConfig;
/// use std::time::Duration;
///
/// let config = RouterConfig {
///     idle_interval: Duration::from_micros(500),
/// };
/// assert_ne!(config, RouterConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// 所有队列为空时的睡眠间隔
    pub idle_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_micros(100),
        }
    }
}

/// 分发线程侧的通道端点
pub(crate) struct DispatchLane {
    requests: Receiver<String>,
    responses: Sender<String>,
}

/// 调用方侧的通道端点
pub(crate) struct ClientLane {
    pub(crate) requests: Sender<String>,
    pub(crate) responses: Receiver<String>,
}

/// 为四个通道创建请求/响应队列对（固定表，按 [`Channel::index`] 下标）
pub(crate) fn lanes() -> ([DispatchLane; Channel::COUNT], [ClientLane; Channel::COUNT]) {
    let [a, b, c, d]: [(DispatchLane, ClientLane); Channel::COUNT] = std::array::from_fn(|_| {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        (
            DispatchLane {
                requests: request_rx,
                responses: response_tx,
            },
            ClientLane {
                requests: request_tx,
                responses: response_rx,
            },
        )
    });
    ([a.0, b.0, c.0, d.0], [a.1, b.1, c.1, d.1])
}

/// 单轮服务结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// 服务了指定通道的一个请求
    Serviced(Channel),
    /// 所有队列为空
    Idle,
    /// 所有请求端都已断开
    Disconnected,
}

/// 服务一个请求
///
/// 按优先级找到第一个非空请求队列，取出一个请求并完成链路交换。链路层错误
/// 记录日志并按空响应（链路断开）返回给调用方。
pub(crate) fn service_once<L: LinkTransport + ?Sized>(
    link: &mut L,
    lanes: &[DispatchLane; Channel::COUNT],
    metrics: &LinkMetrics,
    hooks: &RwLock<HookManager>,
) -> ServiceOutcome {
    let mut disconnected = 0;
    for channel in Channel::ALL {
        let lane = &lanes[channel.index()];
        let line = match lane.requests.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => continue,
            Err(TryRecvError::Disconnected) => {
                disconnected += 1;
                continue;
            },
        };

        let raw = match link.exchange(&line) {
            Ok(raw) => raw,
            Err(e) => {
                error!("[{}] link exchange failed for `{}`: {}", channel, line, e);
                metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                String::new()
            },
        };
        debug!("[{}] {} -> {:?}", channel, line, raw);
        metrics.exchanges[channel.index()].fetch_add(1, Ordering::Relaxed);
        hooks.read().trigger_exchange(channel, &line, &raw);

        if lane.responses.send(raw).is_err() {
            trace!("[{}] response receiver dropped", channel);
        }
        return ServiceOutcome::Serviced(channel);
    }

    if disconnected == Channel::COUNT {
        ServiceOutcome::Disconnected
    } else {
        ServiceOutcome::Idle
    }
}

/// 分发线程循环
///
/// # 参数
/// - `link`: 物理链路（线程内独占）
/// - `lanes`: 分发侧通道端点
/// - `metrics`: 链路指标
/// - `hooks`: 交换回调
/// - `config`: 路由配置
/// - `is_running`: 运行标志，置为 false 后在当前交换完成时退出
///
/// 退出时关闭链路并丢弃响应发送端，仍在等待的调用方随即收到断开。
pub(crate) fn dispatch_loop<L: LinkTransport + ?Sized>(
    link: &mut L,
    lanes: [DispatchLane; Channel::COUNT],
    metrics: Arc<LinkMetrics>,
    hooks: Arc<RwLock<HookManager>>,
    config: RouterConfig,
    is_running: Arc<AtomicBool>,
) {
    info!("Dispatcher started on {}", link.describe());
    while is_running.load(Ordering::Acquire) {
        match service_once(link, &lanes, &metrics, &hooks) {
            ServiceOutcome::Serviced(_) => {},
            ServiceOutcome::Idle => {
                metrics.idle_cycles.fetch_add(1, Ordering::Relaxed);
                spin_sleep::sleep(config.idle_interval);
            },
            ServiceOutcome::Disconnected => {
                debug!("All request senders dropped, dispatcher exiting");
                break;
            },
        }
    }
    link.close();
    drop(lanes);
    info!("Dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use timc_link::mock::ScriptedLink;

    fn fixture() -> (
        [DispatchLane; Channel::COUNT],
        [ClientLane; Channel::COUNT],
        LinkMetrics,
        RwLock<HookManager>,
    ) {
        let (dispatch, client) = lanes();
        (dispatch, client, LinkMetrics::new(), RwLock::new(HookManager::new()))
    }

    #[test]
    fn test_idle_when_empty() {
        let (dispatch, _client, metrics, hooks) = fixture();
        let mut link = ScriptedLink::new(Vec::<String>::new());
        assert_eq!(
            service_once(&mut link, &dispatch, &metrics, &hooks),
            ServiceOutcome::Idle
        );
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_control_serviced_before_feedback() {
        let (dispatch, client, metrics, hooks) = fixture();
        let mut link = ScriptedLink::new(["%1\n", "%2\n"]);

        // Feedback 先入队，Control 后入队
        client[Channel::Feedback.index()]
            .requests
            .send("PFBKPROG(A)".to_string())
            .unwrap();
        client[Channel::Control.index()]
            .requests
            .send("ENABLE A".to_string())
            .unwrap();

        assert_eq!(
            service_once(&mut link, &dispatch, &metrics, &hooks),
            ServiceOutcome::Serviced(Channel::Control)
        );
        assert_eq!(
            service_once(&mut link, &dispatch, &metrics, &hooks),
            ServiceOutcome::Serviced(Channel::Feedback)
        );
        assert_eq!(link.sent(), vec!["ENABLE A", "PFBKPROG(A)"]);
        assert_eq!(
            client[Channel::Control.index()].responses.try_recv().unwrap(),
            "%1\n"
        );
        assert_eq!(
            client[Channel::Feedback.index()].responses.try_recv().unwrap(),
            "%2\n"
        );
    }

    #[test]
    fn test_fifo_within_channel() {
        let (dispatch, client, metrics, hooks) = fixture();
        let mut link = ScriptedLink::new(["%a", "%b", "%c"]);
        let lane = &client[Channel::Status.index()];
        for cmd in ["ONE", "TWO", "THREE"] {
            lane.requests.send(cmd.to_string()).unwrap();
        }
        for _ in 0..3 {
            service_once(&mut link, &dispatch, &metrics, &hooks);
        }
        let responses: Vec<String> = lane.responses.try_iter().collect();
        assert_eq!(responses, vec!["%a", "%b", "%c"]);
        assert_eq!(link.sent(), vec!["ONE", "TWO", "THREE"]);
        assert_eq!(metrics.snapshot().exchanges_on(Channel::Status), 3);
    }

    #[test]
    fn test_link_error_becomes_empty_response() {
        let (dispatch, client, metrics, hooks) = fixture();
        let mut link = ScriptedLink::new(["%1"]);
        link.close();

        client[Channel::Scan.index()]
            .requests
            .send("ABORT A".to_string())
            .unwrap();
        service_once(&mut link, &dispatch, &metrics, &hooks);

        assert_eq!(client[Channel::Scan.index()].responses.try_recv().unwrap(), "");
        assert_eq!(metrics.snapshot().transport_errors, 1);
    }

    #[test]
    fn test_disconnected_when_all_clients_dropped() {
        let (dispatch, client, metrics, hooks) = fixture();
        drop(client);
        let mut link = ScriptedLink::new(Vec::<String>::new());
        assert_eq!(
            service_once(&mut link, &dispatch, &metrics, &hooks),
            ServiceOutcome::Disconnected
        );
    }

    #[test]
    fn test_priority_for_all_queue_states() {
        // 对 4 个通道的所有非空组合，被服务的总是优先级最高的通道
        for mask in 1u8..16 {
            let (dispatch, client, metrics, hooks) = fixture();
            let mut link = ScriptedLink::new(["%"; 4]);
            for channel in Channel::ALL {
                if mask & (1 << channel.index()) != 0 {
                    client[channel.index()]
                        .requests
                        .send(channel.name().to_string())
                        .unwrap();
                }
            }
            let expected = Channel::ALL
                .into_iter()
                .find(|c| mask & (1 << c.index()) != 0)
                .unwrap();
            assert_eq!(
                service_once(&mut link, &dispatch, &metrics, &hooks),
                ServiceOutcome::Serviced(expected),
                "mask {mask:04b}"
            );
        }
    }
}
