//! 通信中枢
//!
//! 持有流缓冲区、扇出队列和任务事件组，作为唯一实例在启动时构造，
//! 之后以 `&CommsHub` 的形式交给中断处理函数和各任务。
//! `init` 是唯一的初始化入口，启动后不再重新初始化。

use crate::comms::fanout::{FanoutQueue, OccupancyPolicy};
use crate::comms::stream::StreamBuffer;
use crate::config::{FANOUT_SLOTS, MAX_MSG_LEN, SLOT_PAYLOAD_MAX, STREAM_CAPACITY};
use crate::log_info;
use crate::sync::event::TaskEvents;

/// UART 接收流缓冲区
pub type UartStream = StreamBuffer<STREAM_CAPACITY>;

/// 显示/转发共享负载队列
pub type PayloadQueue = FanoutQueue<FANOUT_SLOTS, SLOT_PAYLOAD_MAX>;

/// 中枢配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// 扇出队列占用量策略
    pub policy: OccupancyPolicy,
    /// 单条消息最大长度 (含结束符)，不超过 `MAX_MSG_LEN`
    pub max_message_len: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HubConfig {
    /// 默认配置: 共享占用量，最大消息长度 `MAX_MSG_LEN`
    pub const fn new() -> Self {
        Self {
            policy: OccupancyPolicy::Shared,
            max_message_len: MAX_MSG_LEN,
        }
    }

    /// 设置占用量策略
    pub const fn with_policy(mut self, policy: OccupancyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置最大消息长度 (超过 `MAX_MSG_LEN` 时截断)
    pub const fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = if len > MAX_MSG_LEN { MAX_MSG_LEN } else { len };
        self
    }
}

/// 通信中枢
///
/// # Example
/// ```ignore
/// static HUB: CommsHub = CommsHub::new(HubConfig::new());
///
/// HUB.init();
/// // UART 中断
/// framer::on_rx_byte(&HUB, byte);
/// ```
pub struct CommsHub {
    stream: UartStream,
    fanout: PayloadQueue,
    events: TaskEvents,
    config: HubConfig,
}

impl CommsHub {
    pub const fn new(config: HubConfig) -> Self {
        Self {
            stream: StreamBuffer::new(),
            fanout: FanoutQueue::with_policy(config.policy),
            events: TaskEvents::new(),
            config,
        }
    }

    /// 启动初始化: 复位并清空全部缓冲区
    pub fn init(&self) {
        self.stream.init();
        self.fanout.init();
        self.flush_all();
    }

    /// 清空流缓冲区和扇出队列
    pub fn flush_all(&self) {
        self.stream.flush();
        self.fanout.flush_all();
        log_info!("All buffers flushed");
    }

    #[inline(always)]
    pub fn stream(&self) -> &UartStream {
        &self.stream
    }

    #[inline(always)]
    pub fn fanout(&self) -> &PayloadQueue {
        &self.fanout
    }

    #[inline(always)]
    pub fn events(&self) -> &TaskEvents {
        &self.events
    }

    #[inline(always)]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}
