//! 显示渲染任务
//!
//! 收到 `EV_DISPLAY` 后从扇出队列取出负载，清屏并逐个绘制字节的十进制值
//! (不含末尾结束符)。
//!
//! 在 `Shared` 占用量策略下，绘制完成后清空整个扇出队列，
//! 串口转发任务若尚未读取其槽位，该槽位随之丢失。

use crate::comms::codec::message_body;
use crate::comms::error::Result;
use crate::comms::fanout::{ConsumerId, OccupancyPolicy};
use crate::comms::hub::CommsHub;
use crate::config::{DISPLAY_COLUMN_STEP, DISPLAY_ROW};
use crate::sync::event::{TaskId, EV_DISPLAY};
use crate::util::log::*;

/// 显示屏驱动边界
pub trait DisplaySink {
    /// 清屏
    fn clear(&mut self);

    /// 在 (x, y) 处绘制十进制数值
    fn print_int(&mut self, x: u16, y: u16, value: u8);
}

impl<T: DisplaySink + ?Sized> DisplaySink for &mut T {
    fn clear(&mut self) {
        (**self).clear();
    }

    fn print_int(&mut self, x: u16, y: u16, value: u8) {
        (**self).print_int(x, y, value);
    }
}

/// 渲染一份负载
///
/// # Returns
/// 绘制的数值个数；队列为空时返回 `BufferEmpty`
pub fn render_pending<D: DisplaySink + ?Sized>(hub: &CommsHub, display: &mut D) -> Result<usize> {
    super::trace_foreign_slot(hub, ConsumerId::Display);
    let payload = hub.fanout().receive(ConsumerId::Display)?;
    let body = message_body(&payload);

    display.clear();
    let mut x: u16 = 0;
    for &value in body {
        display.print_int(x, DISPLAY_ROW, value);
        x = x.saturating_add(DISPLAY_COLUMN_STEP);
    }

    if hub.fanout().policy() == OccupancyPolicy::Shared {
        hub.fanout().flush_all();
    }

    Ok(body.len())
}

/// 显示任务主循环
pub async fn run<D: DisplaySink>(hub: &CommsHub, mut display: D) {
    log_info!("Display task started");

    let events = hub.events().group(TaskId::Display);
    loop {
        let ev = events.wait(EV_DISPLAY).await;
        events.clear(ev);

        // 共享占用量下每次唤醒只读取一份，避免读走其他消费者的配额
        loop {
            if let Err(e) = render_pending(hub, &mut display) {
                log_debug!("Display: nothing to render ({})", e);
                break;
            }
            if hub.fanout().policy() == OccupancyPolicy::Shared {
                break;
            }
        }
    }
}
