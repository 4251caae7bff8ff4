//! 命令门面
//!
//! 所有组件与控制器交换命令的唯一入口。[`CommandFacade::acmd`] 把命令放入
//! 指定通道的请求队列，然后阻塞等待同一通道响应队列中的响应并完成分类。
//! 对调用方而言这是同步调用，真正的链路交换发生在分发线程中。
//!
//! 每个通道有一把锁，保证"入队 + 出队"成对完成：同一通道上的多个调用方
//! 不会拿到彼此的响应。一旦观察到链路断开，门面进入离线状态，后续调用
//! 直接返回 [`Reply::LinkDown`]，不再产生链路流量。

use crate::channel::Channel;
use crate::error::DriverError;
use crate::metrics::LinkMetrics;
use crate::router::ClientLane;
use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use timc_protocol::{Command, Reply};
use tracing::{error, warn};

struct Lane {
    endpoints: ClientLane,
    /// 串行化同一通道上的 send + recv
    exchange: Mutex<()>,
}

/// 命令门面
pub struct CommandFacade {
    lanes: [Lane; Channel::COUNT],
    online: AtomicBool,
    metrics: Arc<LinkMetrics>,
}

impl CommandFacade {
    pub(crate) fn new(endpoints: [ClientLane; Channel::COUNT], metrics: Arc<LinkMetrics>) -> Self {
        let lanes = endpoints.map(|endpoints| Lane {
            endpoints,
            exchange: Mutex::new(()),
        });
        Self {
            lanes,
            online: AtomicBool::new(true),
            metrics,
        }
    }

    /// 交换一条命令并分类结果
    ///
    /// 阻塞直到该通道的响应到达。调用方必须把所有非成功分类视为"命令没有
    /// 产生效果"。
    pub fn acmd(&self, channel: Channel, text: &str) -> Reply {
        if !self.is_online() {
            return Reply::LinkDown;
        }
        let lane = &self.lanes[channel.index()];
        let _guard = lane.exchange.lock();

        if lane.endpoints.requests.send(text.to_string()).is_err() {
            return self.link_lost(channel, text);
        }
        let raw = match lane.endpoints.responses.recv() {
            Ok(raw) => raw,
            Err(_) => return self.link_lost(channel, text),
        };
        self.classify(channel, text, &raw)
    }

    /// 交换一条类型化命令
    pub fn send(&self, channel: Channel, command: &Command<'_>) -> Reply {
        self.acmd(channel, &command.to_string())
    }

    /// 控制器是否在线
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// 离线模式启动（握手失败或未配置链路）
    pub(crate) fn set_offline(&self) {
        self.online.store(false, Ordering::Release);
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    /// 非阻塞入队（不等待响应）
    ///
    /// 仅供独占某个通道的生产者使用（反馈采样器独占 Feedback 通道）；与同一
    /// 通道上的 `acmd` 混用会破坏请求/响应的对应关系。
    pub fn enqueue(&self, channel: Channel, text: &str) -> Result<(), DriverError> {
        if !self.is_online() {
            return Err(DriverError::Offline);
        }
        self.lanes[channel.index()]
            .endpoints
            .requests
            .send(text.to_string())
            .map_err(|_| DriverError::ChannelClosed)
    }

    /// 非阻塞取出一个响应并分类（与 [`enqueue`](Self::enqueue) 配对使用）
    ///
    /// 队列为空时返回 None；分发线程已退出时返回 `Some(Reply::LinkDown)`。
    pub fn try_response(&self, channel: Channel, text: &str) -> Option<Reply> {
        match self.lanes[channel.index()].endpoints.responses.try_recv() {
            Ok(raw) => Some(self.classify(channel, text, &raw)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.link_lost(channel, text)),
        }
    }

    /// 交换一条命令并返回原始响应行
    ///
    /// 不分类，也不改变在线状态：控制器复位期间的空响应不代表链路断开。
    pub(crate) fn exchange_raw(&self, channel: Channel, text: &str) -> String {
        let lane = &self.lanes[channel.index()];
        let _guard = lane.exchange.lock();
        if lane.endpoints.requests.send(text.to_string()).is_err() {
            return String::new();
        }
        lane.endpoints.responses.recv().unwrap_or_default()
    }

    /// 丢弃通道中未被取走的响应，返回丢弃数量
    pub(crate) fn discard_responses(&self, channel: Channel) -> usize {
        let responses = &self.lanes[channel.index()].endpoints.responses;
        let mut discarded = 0;
        while responses.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    /// 通道中尚未被分发线程取走的请求数
    pub fn pending_requests(&self, channel: Channel) -> usize {
        self.lanes[channel.index()].endpoints.requests.len()
    }

    fn classify(&self, channel: Channel, text: &str, raw: &str) -> Reply {
        let reply = Reply::classify(raw);
        self.metrics.record_reply(&reply);
        match &reply {
            Reply::Data(_) | Reply::Ack => {},
            Reply::BadExecution | Reply::CannotExecute | Reply::Timeout => {
                warn!("[{}] `{}` failed: {}", channel, text, reply);
            },
            Reply::Unclassified(raw) => {
                error!("[{}] `{}` returned unclassified response {:?}", channel, text, raw);
            },
            Reply::LinkDown => {
                self.mark_offline(channel, text);
            },
        }
        reply
    }

    fn link_lost(&self, channel: Channel, text: &str) -> Reply {
        self.metrics.record_reply(&Reply::LinkDown);
        self.mark_offline(channel, text);
        Reply::LinkDown
    }

    fn mark_offline(&self, channel: Channel, text: &str) {
        if self.online.swap(false, Ordering::AcqRel) {
            error!("[{}] link down while sending `{}`, controller offline", channel, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookManager;
    use crate::router::{RouterConfig, dispatch_loop, lanes};
    use parking_lot::RwLock;
    use std::thread::JoinHandle;
    use timc_link::mock::ScriptedLink;

    fn start(link: ScriptedLink) -> (CommandFacade, Arc<AtomicBool>, JoinHandle<()>) {
        let (dispatch, client) = lanes();
        let metrics = Arc::new(LinkMetrics::new());
        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();
        let loop_metrics = metrics.clone();
        let handle = std::thread::spawn(move || {
            let mut link = link;
            dispatch_loop(
                &mut link,
                dispatch,
                loop_metrics,
                Arc::new(RwLock::new(HookManager::new())),
                RouterConfig::default(),
                running,
            );
        });
        (CommandFacade::new(client, metrics), is_running, handle)
    }

    #[test]
    fn test_acmd_classification_end_to_end() {
        let (facade, is_running, handle) = start(ScriptedLink::new(["%12.34\n", "!\n", ""]));

        assert_eq!(
            facade.acmd(Channel::Control, "PFBKPROG(A)"),
            Reply::Data("12.34".to_string())
        );
        assert_eq!(facade.acmd(Channel::Scan, "MOVEABS A 1 F 1"), Reply::BadExecution);
        assert!(facade.is_online());
        assert_eq!(facade.acmd(Channel::Status, "AXISFAULT (A)"), Reply::LinkDown);
        assert!(!facade.is_online());

        // 离线后不再产生链路流量
        assert_eq!(facade.acmd(Channel::Control, "ENABLE A"), Reply::LinkDown);
        let snapshot = facade.metrics().snapshot();
        assert_eq!(snapshot.exchanges_total(), 3);
        assert_eq!(snapshot.bad_execution, 1);

        is_running.store(false, Ordering::Release);
        handle.join().unwrap();
    }

    #[test]
    fn test_acmd_after_dispatcher_exit() {
        let (facade, is_running, handle) = start(ScriptedLink::new(Vec::<String>::new()));
        is_running.store(false, Ordering::Release);
        handle.join().unwrap();

        assert_eq!(facade.acmd(Channel::Control, "ENABLE A"), Reply::LinkDown);
        assert!(!facade.is_online());
        assert!(matches!(
            facade.enqueue(Channel::Feedback, "VFBK(A)"),
            Err(DriverError::Offline)
        ));
    }

    #[test]
    fn test_enqueue_and_try_response() {
        let (facade, is_running, handle) = start(ScriptedLink::new(["%3.5\n"]));

        facade.enqueue(Channel::Feedback, "VFBK(A)").unwrap();
        let reply = loop {
            if let Some(reply) = facade.try_response(Channel::Feedback, "VFBK(A)") {
                break reply;
            }
            std::thread::yield_now();
        };
        assert_eq!(reply.as_f64().unwrap(), 3.5);
        assert_eq!(facade.pending_requests(Channel::Feedback), 0);
        assert!(facade.try_response(Channel::Feedback, "VFBK(A)").is_none());

        is_running.store(false, Ordering::Release);
        handle.join().unwrap();
    }

    #[test]
    fn test_raw_exchange_keeps_online() {
        let (facade, is_running, handle) = start(ScriptedLink::new(["", "%\n", "%7\n", "%7\n"]));

        assert_eq!(facade.exchange_raw(Channel::Control, "ACKNOWLEDGEALL"), "");
        assert!(facade.is_online());
        assert_eq!(facade.exchange_raw(Channel::Control, "ACKNOWLEDGEALL"), "%\n");

        // 分发线程串行交换：Control 响应返回时 Feedback 的交换已经完成
        facade.enqueue(Channel::Feedback, "VFBK(A)").unwrap();
        while facade.pending_requests(Channel::Feedback) > 0 {
            std::thread::yield_now();
        }
        assert_eq!(facade.exchange_raw(Channel::Control, "PFBKPROG(A)"), "%7\n");
        assert_eq!(facade.discard_responses(Channel::Feedback), 1);
        assert!(facade.try_response(Channel::Feedback, "VFBK(A)").is_none());

        is_running.store(false, Ordering::Release);
        handle.join().unwrap();
    }
}
