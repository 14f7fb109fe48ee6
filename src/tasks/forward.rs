//! 串口转发任务
//!
//! 收到 `EV_FORWARD` 后从扇出队列取出负载，以十进制文本写回串口:
//! `[49, 50, 0]` => `"49, 50.\n\r"`

use core::fmt::Write;

use crate::comms::codec::write_decimal_line;
use crate::comms::error::Result;
use crate::comms::fanout::{ConsumerId, OccupancyPolicy};
use crate::comms::hub::CommsHub;
use crate::sync::event::{TaskId, EV_FORWARD};
use crate::util::log::*;

/// 转发一份负载
///
/// # Returns
/// 负载长度 (含结束符)；队列为空时返回 `BufferEmpty`
pub fn forward_pending<W: Write + ?Sized>(hub: &CommsHub, serial: &mut W) -> Result<usize> {
    super::trace_foreign_slot(hub, ConsumerId::SerialForward);
    let payload = hub.fanout().receive(ConsumerId::SerialForward)?;

    if write_decimal_line(&payload, serial).is_err() {
        log_warn!("Serial forward truncated");
    }

    Ok(payload.len())
}

/// 串口转发任务主循环
pub async fn run<W: Write>(hub: &CommsHub, mut serial: W) {
    log_info!("Forward task started");

    let events = hub.events().group(TaskId::SerialForward);
    loop {
        let ev = events.wait(EV_FORWARD).await;
        events.clear(ev);

        loop {
            if let Err(e) = forward_pending(hub, &mut serial) {
                log_debug!("Forward: nothing to send ({})", e);
                break;
            }
            if hub.fanout().policy() == OccupancyPolicy::Shared {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::error::CommsError;
    use crate::comms::hub::HubConfig;
    use crate::config::EOM_MARKER;
    use heapless::String;

    #[test]
    fn test_forward_writes_decimal_line() {
        let hub = CommsHub::new(HubConfig::new());
        let mut serial: String<64> = String::new();

        hub.fanout()
            .send(
                &[49, 50, EOM_MARKER],
                ConsumerId::SerialForward,
                ConsumerId::SerialForward.notification(),
                hub.events(),
            )
            .unwrap();

        assert_eq!(forward_pending(&hub, &mut serial), Ok(3));
        assert_eq!(serial.as_str(), "49, 50.\n\r");
    }

    #[test]
    fn test_forward_empty_queue_writes_nothing() {
        let hub = CommsHub::new(HubConfig::new());
        let mut serial: String<64> = String::new();

        assert_eq!(forward_pending(&hub, &mut serial), Err(CommsError::BufferEmpty));
        assert!(serial.is_empty());
    }
}
