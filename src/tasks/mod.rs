//! 任务模块
//!
//! 通信层的三个任务，均只在等待自身事件时挂起:
//! - `framer`: 从流缓冲区分帧并扇出 (含 UART 接收中断处理函数)
//! - `display`: 渲染显示负载
//! - `forward`: 以十进制文本转发串口负载
//!
//! 各任务主循环是普通 async fn，由固件入口包装为 Embassy 任务。

pub mod display;
pub mod forward;
pub mod framer;

pub use display::DisplaySink;
pub use framer::DispatchOutcome;

use crate::comms::fanout::{ConsumerId, OccupancyPolicy};
use crate::comms::hub::CommsHub;
use crate::util::log::*;

/// 共享占用量下，消费者游标可能指向寄给其他消费者的槽位
pub(crate) fn trace_foreign_slot(hub: &CommsHub, consumer: ConsumerId) {
    if hub.fanout().policy() != OccupancyPolicy::Shared {
        return;
    }
    if let Ok((target, _)) = hub.fanout().peek_slot(consumer) {
        if target != consumer {
            log_debug!("{:?} cursor on slot addressed to {:?}", consumer, target);
        }
    }
}
