//! 分帧任务
//!
//! UART 接收中断把字节写入流缓冲区，读到结束符时唤醒本任务。
//! 本任务取出完整消息，先投递给串口转发、再投递给显示。
//!
//! 故障恢复:
//! - 流缓冲区满: 中断侧丢弃被截断的消息 (已缓冲的部分和到下一个结束符为止的剩余部分)，
//!   已完整到达的消息保留
//! - `Incomplete` / `TooLong`: 放弃当前消息并清空流缓冲区
//! - 任一投递被拒绝: 清空整个扇出队列 (其他消费者未读的槽位一并丢失)

use crate::comms::error::CommsError;
use crate::comms::fanout::ConsumerId;
use crate::comms::hub::CommsHub;
use crate::config::{EOM_MARKER, MAX_MSG_LEN};
use crate::sync::event::{Notify, TaskId, EV_FRAME_READY};
use crate::util::log::*;

/// 单次分帧结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 消息 (含结束符的长度) 已投递给全部消费者
    Dispatched(usize),
    /// 投递失败，扇出队列已清空
    FanoutFlushed,
    /// 分帧失败，流缓冲区已清空
    StreamFlushed(CommsError),
}

/// 投递顺序
const DISPATCH_ORDER: [ConsumerId; ConsumerId::COUNT] = [ConsumerId::SerialForward, ConsumerId::Display];

/// UART 接收中断处理 (生产者上下文)
///
/// 不挂起；正常路径 O(1)，溢出时回退一次未结束的尾部
#[inline]
pub fn on_rx_byte(hub: &CommsHub, byte: u8) {
    match hub.stream().write_byte(byte) {
        Ok(()) => {
            if byte == EOM_MARKER {
                hub.events().notify(TaskId::Framer, EV_FRAME_READY);
            }
        }
        Err(_) => {
            hub.stream().resynchronize();
            log_warn!("RX buffer full, truncated message dropped");
        }
    }
}

/// 取出一条消息并扇出
pub fn dispatch_pending(hub: &CommsHub) -> DispatchOutcome {
    let mut msg = [0u8; MAX_MSG_LEN];
    let limit = hub.config().max_message_len;

    let len = match hub.stream().read_message(&mut msg[..limit]) {
        Ok(len) => len,
        Err(e) => {
            hub.stream().flush();
            if e.is_framing() {
                log_debug!("Frame dropped: {}", e);
            } else {
                log_warn!("Stream read failed: {}", e);
            }
            return DispatchOutcome::StreamFlushed(e);
        }
    };
    let message = &msg[..len];

    let mut rejected = false;
    for consumer in DISPATCH_ORDER {
        let sent = hub
            .fanout()
            .send(message, consumer, consumer.notification(), hub.events());
        rejected |= sent.is_err();
    }

    if rejected {
        hub.fanout().flush_all();
        log_warn!("Fan-out inconsistent, payload queue flushed");
        return DispatchOutcome::FanoutFlushed;
    }

    log_trace!("Dispatched {} byte message", len);
    DispatchOutcome::Dispatched(len)
}

/// 处理缓冲区中所有已完整到达的消息
///
/// 多个结束符可能只产生一次唤醒，因此按完整消息数循环。
/// 尚未收到结束符的尾部字节保留在缓冲区中。
pub fn drain_frames(hub: &CommsHub) -> usize {
    let mut handled = 0;
    while hub.stream().pending_frames() > 0 {
        dispatch_pending(hub);
        handled += 1;
    }
    handled
}

/// 分帧任务主循环
pub async fn run(hub: &CommsHub) {
    log_info!("Framer task started");

    let events = hub.events().group(TaskId::Framer);
    loop {
        let ev = events.wait(EV_FRAME_READY).await;
        events.clear(ev);

        drain_frames(hub);
    }
}
