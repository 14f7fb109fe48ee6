//! 多消费者扇出队列
//!
//! 一个生产者 (分帧任务) 把同一条消息分别投递给多个命名消费者，
//! 所有消费者共享同一组槽位，每个消费者维护自己的读游标。
//!
//! # 占用量策略
//!
//! - `OccupancyPolicy::Shared` (默认): 全部消费者共用一个占用计数。
//!   任何消费者的 `receive` 都会减少该计数，任何消费者的 `flush_all`
//!   都会丢弃其他消费者尚未读取的槽位。
//! - `OccupancyPolicy::PerConsumer`: 每个消费者单独计数，
//!   `receive` 只返回寄给自己的槽位，槽位在收件人读取后才被回收。
//!
//! ```text
//!            write
//!              │
//!   ┌────┬────┬▼───┬────┬────┬────┬────┬────┐
//!   │ S0 │ S1 │    │    │    │    │    │    │   slots[SLOTS]
//!   └▲───┴▲───┴────┴────┴────┴────┴────┴────┘
//!    │    │
//!  read[SerialForward]
//!         read[Display]
//! ```

use heapless::Vec;

use crate::comms::error::{CommsError, Result};
use crate::debug_assert_msg;
use crate::sync::event::{Notification, Notify, TaskId, EV_DISPLAY, EV_FORWARD};
use crate::sync::primitives::{new_blocking_mutex, CriticalBlockingMutex};

/// 槽位负载
pub type Payload<const MAX: usize> = Vec<u8, MAX>;

/// 扇出目标消费者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum ConsumerId {
    /// 显示渲染
    Display = 0,
    /// 串口转发
    SerialForward = 1,
}

impl ConsumerId {
    /// 消费者数量
    pub const COUNT: usize = 2;

    /// 全部消费者
    pub const ALL: [ConsumerId; Self::COUNT] = [ConsumerId::Display, ConsumerId::SerialForward];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 默认通知: 唤醒对应的消费者任务
    pub const fn notification(self) -> Notification {
        match self {
            ConsumerId::Display => Notification::new(TaskId::Display, EV_DISPLAY),
            ConsumerId::SerialForward => Notification::new(TaskId::SerialForward, EV_FORWARD),
        }
    }
}

/// 外部协议中的消费者编号
///
/// 0 表示 "无消费者"，返回 `NullArgument`
impl TryFrom<u8> for ConsumerId {
    type Error = CommsError;

    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            1 => Ok(ConsumerId::Display),
            2 => Ok(ConsumerId::SerialForward),
            _ => Err(CommsError::NullArgument),
        }
    }
}

/// 占用量统计策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum OccupancyPolicy {
    /// 单一共享计数 (flush_all 会丢弃其他消费者未读的数据)
    #[default]
    Shared,
    /// 按消费者计数，槽位由收件人读取后回收
    PerConsumer,
}

#[derive(Clone)]
struct Slot<const MAX: usize> {
    payload: Payload<MAX>,
    target: ConsumerId,
    notification: Notification,
    /// 收件人已读取 (仅 PerConsumer 使用)
    consumed: bool,
}

impl<const MAX: usize> Slot<MAX> {
    const fn new() -> Self {
        Self {
            payload: Vec::new(),
            target: ConsumerId::Display,
            notification: ConsumerId::Display.notification(),
            consumed: true,
        }
    }
}

struct FanoutState<const SLOTS: usize, const MAX: usize> {
    slots: [Slot<MAX>; SLOTS],
    write: usize,
    read: [usize; ConsumerId::COUNT],
    /// 已写入未回收的槽位数
    occupancy: usize,
    /// 最旧的未回收槽位 (仅 PerConsumer 使用)
    tail: usize,
    /// 每个消费者未读的槽位数 (仅 PerConsumer 使用)
    pending: [usize; ConsumerId::COUNT],
    policy: OccupancyPolicy,
}

impl<const SLOTS: usize, const MAX: usize> FanoutState<SLOTS, MAX> {
    const fn new(policy: OccupancyPolicy) -> Self {
        Self {
            slots: [const { Slot::new() }; SLOTS],
            write: 0,
            read: [0; ConsumerId::COUNT],
            occupancy: 0,
            tail: 0,
            pending: [0; ConsumerId::COUNT],
            policy,
        }
    }

    fn reset(&mut self) {
        self.write = 0;
        self.read = [0; ConsumerId::COUNT];
        self.occupancy = 0;
        self.tail = 0;
        self.pending = [0; ConsumerId::COUNT];
    }

    fn push(&mut self, payload: &[u8], target: ConsumerId, notification: Notification) -> Result<()> {
        if payload.len() > MAX || self.occupancy >= SLOTS {
            return Err(CommsError::Rejected);
        }

        let slot = &mut self.slots[self.write];
        slot.payload.clear();
        slot.payload
            .extend_from_slice(payload)
            .map_err(|_| CommsError::Rejected)?;
        slot.target = target;
        slot.notification = notification;
        slot.consumed = false;

        self.write = (self.write + 1) % SLOTS;
        self.occupancy += 1;
        if self.policy == OccupancyPolicy::PerConsumer {
            self.pending[target.index()] += 1;
        }
        self.check_invariant();
        Ok(())
    }

    fn pop(&mut self, consumer: ConsumerId) -> Result<Payload<MAX>> {
        match self.policy {
            OccupancyPolicy::Shared => self.pop_shared(consumer),
            OccupancyPolicy::PerConsumer => self.pop_addressed(consumer),
        }
    }

    /// 读取消费者游标处的槽位，不检查收件人
    fn pop_shared(&mut self, consumer: ConsumerId) -> Result<Payload<MAX>> {
        if self.occupancy == 0 {
            return Err(CommsError::BufferEmpty);
        }

        let cursor = &mut self.read[consumer.index()];
        let payload = self.slots[*cursor].payload.clone();
        *cursor = (*cursor + 1) % SLOTS;
        self.occupancy -= 1;
        self.check_invariant();
        Ok(payload)
    }

    /// 从最旧的未回收槽位开始查找寄给该消费者的第一个槽位
    fn pop_addressed(&mut self, consumer: ConsumerId) -> Result<Payload<MAX>> {
        if self.pending[consumer.index()] == 0 {
            return Err(CommsError::BufferEmpty);
        }

        let found = (0..self.occupancy)
            .map(|offset| (self.tail + offset) % SLOTS)
            .find(|&idx| {
                let slot = &self.slots[idx];
                slot.target == consumer && !slot.consumed
            })
            .ok_or(CommsError::BufferEmpty)?;

        let slot = &mut self.slots[found];
        slot.consumed = true;
        let payload = slot.payload.clone();

        self.read[consumer.index()] = (found + 1) % SLOTS;
        self.pending[consumer.index()] -= 1;

        while self.occupancy > 0 && self.slots[self.tail].consumed {
            self.tail = (self.tail + 1) % SLOTS;
            self.occupancy -= 1;
        }
        self.check_invariant();
        Ok(payload)
    }

    fn discard_all(&mut self) {
        self.read = [self.write; ConsumerId::COUNT];
        self.tail = self.write;
        self.occupancy = 0;
        self.pending = [0; ConsumerId::COUNT];
    }

    fn available(&self, consumer: ConsumerId) -> usize {
        match self.policy {
            OccupancyPolicy::Shared => self.occupancy,
            OccupancyPolicy::PerConsumer => self.pending[consumer.index()],
        }
    }

    #[inline(always)]
    fn check_invariant(&self) {
        debug_assert_msg!(
            self.occupancy <= SLOTS && self.write < SLOTS,
            "fanout state out of range: write={} occupancy={}",
            self.write,
            self.occupancy
        );
    }
}

/// 多消费者扇出队列
///
/// # Type Parameters
/// * `SLOTS` - 槽位数量
/// * `MAX` - 单个槽位的最大负载字节数
///
/// # Example
/// ```ignore
/// static EVENTS: TaskEvents = TaskEvents::new();
/// static QUEUE: FanoutQueue<8, 128> = FanoutQueue::new();
///
/// // 生产者
/// QUEUE.send(&msg, ConsumerId::Display, ConsumerId::Display.notification(), &EVENTS)?;
///
/// // 显示任务 (收到 EV_DISPLAY 后)
/// let payload = QUEUE.receive(ConsumerId::Display)?;
/// ```
pub struct FanoutQueue<const SLOTS: usize, const MAX: usize> {
    state: CriticalBlockingMutex<FanoutState<SLOTS, MAX>>,
}

impl<const SLOTS: usize, const MAX: usize> FanoutQueue<SLOTS, MAX> {
    /// 创建共享占用量的队列
    pub const fn new() -> Self {
        Self::with_policy(OccupancyPolicy::Shared)
    }

    /// 以指定占用量策略创建队列
    pub const fn with_policy(policy: OccupancyPolicy) -> Self {
        assert!(SLOTS > 0, "SLOTS must be non-zero");

        Self {
            state: new_blocking_mutex(FanoutState::new(policy)),
        }
    }

    /// 复位全部游标与计数
    pub fn init(&self) {
        self.state.lock(|state| state.borrow_mut().reset());
    }

    pub fn policy(&self) -> OccupancyPolicy {
        self.state.lock(|state| state.borrow().policy)
    }

    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        SLOTS
    }

    /// 已占用的槽位数
    pub fn len(&self) -> usize {
        self.state.lock(|state| state.borrow().occupancy)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 该消费者当前可成功 `receive` 的次数
    pub fn pending(&self, consumer: ConsumerId) -> usize {
        self.state.lock(|state| state.borrow().available(consumer))
    }

    /// 投递一份负载并通知收件任务
    ///
    /// 负载超过 `MAX` 或队列已满时返回 `Rejected`，状态不变。
    /// 通知在释放锁之后发出。
    pub fn send<N>(
        &self,
        payload: &[u8],
        target: ConsumerId,
        notification: Notification,
        notifier: &N,
    ) -> Result<()>
    where
        N: Notify + ?Sized,
    {
        self.state
            .lock(|state| state.borrow_mut().push(payload, target, notification))?;

        notifier.notify(notification.task, notification.event);
        Ok(())
    }

    /// 读取该消费者的下一份负载
    pub fn receive(&self, consumer: ConsumerId) -> Result<Payload<MAX>> {
        self.state.lock(|state| state.borrow_mut().pop(consumer))
    }

    /// 查看该消费者下一次 `Shared` 读取将命中的槽位的收件人与通知
    pub fn peek_slot(&self, consumer: ConsumerId) -> Result<(ConsumerId, Notification)> {
        self.state.lock(|state| {
            let state = state.borrow();
            if state.occupancy == 0 {
                return Err(CommsError::BufferEmpty);
            }
            let slot = &state.slots[state.read[consumer.index()]];
            Ok((slot.target, slot.notification))
        })
    }

    /// 丢弃全部槽位 (包括其他消费者尚未读取的)
    pub fn flush_all(&self) {
        self.state.lock(|state| state.borrow_mut().discard_all());
    }
}

impl<const SLOTS: usize, const MAX: usize> Default for FanoutQueue<SLOTS, MAX> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::event::{EventMask, TaskEvents};
    use core::cell::Cell;

    /// 记录最后一次通知
    struct RecordingNotifier {
        last: Cell<Option<(TaskId, EventMask)>>,
        count: Cell<usize>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                last: Cell::new(None),
                count: Cell::new(0),
            }
        }
    }

    impl Notify for RecordingNotifier {
        fn notify(&self, task: TaskId, event: EventMask) {
            self.last.set(Some((task, event)));
            self.count.set(self.count.get() + 1);
        }
    }

    type TestQueue = FanoutQueue<8, 16>;

    fn send_to(queue: &TestQueue, payload: &[u8], target: ConsumerId, notifier: &impl Notify) -> Result<()> {
        queue.send(payload, target, target.notification(), notifier)
    }

    #[test]
    fn test_send_receive_roundtrip() {
        let queue = TestQueue::new();
        let notifier = RecordingNotifier::new();

        send_to(&queue, &[1, 2, 3], ConsumerId::Display, &notifier).unwrap();
        assert_eq!(notifier.last.get(), Some((TaskId::Display, EV_DISPLAY)));

        let payload = queue.receive(ConsumerId::Display).unwrap();
        assert_eq!(payload.as_slice(), &[1, 2, 3]);
        assert_eq!(payload.len(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_oversize_rejected_without_side_effects() {
        let queue = TestQueue::new();
        let notifier = RecordingNotifier::new();

        let big = [0xAAu8; 17];
        assert_eq!(
            send_to(&queue, &big, ConsumerId::SerialForward, &notifier),
            Err(CommsError::Rejected)
        );
        assert_eq!(queue.len(), 0);
        assert_eq!(notifier.count.get(), 0);
    }

    #[test]
    fn test_full_queue_rejected() {
        let queue: FanoutQueue<2, 4> = FanoutQueue::new();
        let events = TaskEvents::new();

        queue.send(&[1], ConsumerId::Display, ConsumerId::Display.notification(), &events).unwrap();
        queue.send(&[2], ConsumerId::Display, ConsumerId::Display.notification(), &events).unwrap();
        assert_eq!(
            queue.send(&[3], ConsumerId::Display, ConsumerId::Display.notification(), &events),
            Err(CommsError::Rejected)
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_receive_empty() {
        let queue = TestQueue::new();
        assert_eq!(queue.receive(ConsumerId::Display), Err(CommsError::BufferEmpty));
        assert_eq!(queue.peek_slot(ConsumerId::Display), Err(CommsError::BufferEmpty));
    }

    #[test]
    fn test_shared_cursor_ignores_target() {
        let queue = TestQueue::new();
        let events = TaskEvents::new();

        send_to(&queue, &[7], ConsumerId::SerialForward, &events).unwrap();
        send_to(&queue, &[8], ConsumerId::Display, &events).unwrap();

        // 显示游标从槽位 0 开始，读到的是寄给串口转发的槽位
        let (target, notification) = queue.peek_slot(ConsumerId::Display).unwrap();
        assert_eq!(target, ConsumerId::SerialForward);
        assert_eq!(notification.task, TaskId::SerialForward);
        assert_eq!(queue.receive(ConsumerId::Display).unwrap().as_slice(), &[7]);
    }

    /// 共享占用量缺陷: A 读取后 flush_all，B 未读的槽位随之丢失
    #[test]
    fn test_shared_occupancy_flush_loses_other_consumer() {
        let queue = TestQueue::new();
        let events = TaskEvents::new();
        let payload = [b'x', b'y', 0];

        send_to(&queue, &payload, ConsumerId::Display, &events).unwrap();
        send_to(&queue, &payload, ConsumerId::SerialForward, &events).unwrap();

        assert!(queue.receive(ConsumerId::Display).is_ok());
        queue.flush_all();

        assert_eq!(queue.receive(ConsumerId::SerialForward), Err(CommsError::BufferEmpty));
    }

    /// 共享计数下，同一消费者可以把别人的配额也读掉
    #[test]
    fn test_shared_occupancy_single_consumer_drains_both() {
        let queue = TestQueue::new();
        let events = TaskEvents::new();

        send_to(&queue, &[1], ConsumerId::Display, &events).unwrap();
        send_to(&queue, &[2], ConsumerId::SerialForward, &events).unwrap();

        assert!(queue.receive(ConsumerId::Display).is_ok());
        assert!(queue.receive(ConsumerId::Display).is_ok());
        assert_eq!(queue.receive(ConsumerId::SerialForward), Err(CommsError::BufferEmpty));
    }

    #[test]
    fn test_per_consumer_delivers_after_other_consumer_done() {
        let queue = TestQueue::with_policy(OccupancyPolicy::PerConsumer);
        let events = TaskEvents::new();
        let payload = [b'x', b'y', 0];

        send_to(&queue, &payload, ConsumerId::Display, &events).unwrap();
        send_to(&queue, &payload, ConsumerId::SerialForward, &events).unwrap();

        assert_eq!(queue.receive(ConsumerId::Display).unwrap().as_slice(), &payload);
        assert_eq!(queue.receive(ConsumerId::Display), Err(CommsError::BufferEmpty));
        assert_eq!(queue.pending(ConsumerId::SerialForward), 1);

        assert_eq!(queue.receive(ConsumerId::SerialForward).unwrap().as_slice(), &payload);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_per_consumer_reclaims_in_order() {
        let queue: FanoutQueue<2, 4> = FanoutQueue::with_policy(OccupancyPolicy::PerConsumer);
        let events = TaskEvents::new();

        queue.send(&[1], ConsumerId::SerialForward, ConsumerId::SerialForward.notification(), &events).unwrap();
        queue.send(&[2], ConsumerId::Display, ConsumerId::Display.notification(), &events).unwrap();

        // 槽位 1 已读但槽位 0 未读，仍然占满
        queue.receive(ConsumerId::Display).unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.send(&[3], ConsumerId::Display, ConsumerId::Display.notification(), &events),
            Err(CommsError::Rejected)
        );

        queue.receive(ConsumerId::SerialForward).unwrap();
        assert_eq!(queue.len(), 0);

        // 回绕后继续按序投递
        queue.send(&[4], ConsumerId::Display, ConsumerId::Display.notification(), &events).unwrap();
        queue.send(&[5], ConsumerId::Display, ConsumerId::Display.notification(), &events).unwrap();
        assert_eq!(queue.receive(ConsumerId::Display).unwrap().as_slice(), &[4]);
        assert_eq!(queue.receive(ConsumerId::Display).unwrap().as_slice(), &[5]);
    }

    #[test]
    fn test_flush_all_resets_every_consumer() {
        let queue = TestQueue::with_policy(OccupancyPolicy::PerConsumer);
        let events = TaskEvents::new();

        for consumer in ConsumerId::ALL {
            send_to(&queue, &[9], consumer, &events).unwrap();
        }
        queue.flush_all();

        for consumer in ConsumerId::ALL {
            assert_eq!(queue.pending(consumer), 0);
            assert_eq!(queue.receive(consumer), Err(CommsError::BufferEmpty));
        }

        send_to(&queue, &[1], ConsumerId::Display, &events).unwrap();
        assert_eq!(queue.receive(ConsumerId::Display).unwrap().as_slice(), &[1]);
    }

    #[test]
    fn test_send_notifies_event_group() {
        let queue = TestQueue::new();
        let events = TaskEvents::new();

        send_to(&queue, &[1], ConsumerId::SerialForward, &events).unwrap();
        assert_eq!(events.group(TaskId::SerialForward).get(), EV_FORWARD);
        assert_eq!(events.group(TaskId::Display).get(), 0);
    }

    #[test]
    fn test_consumer_id_from_raw() {
        assert_eq!(ConsumerId::try_from(1), Ok(ConsumerId::Display));
        assert_eq!(ConsumerId::try_from(2), Ok(ConsumerId::SerialForward));
        assert_eq!(ConsumerId::try_from(0), Err(CommsError::NullArgument));
        assert_eq!(ConsumerId::try_from(3), Err(CommsError::NullArgument));
    }

    #[test]
    fn test_init_resets_cursors() {
        let queue = TestQueue::new();
        let events = TaskEvents::new();
        send_to(&queue, &[1], ConsumerId::Display, &events).unwrap();

        queue.init();
        assert!(queue.is_empty());
        assert_eq!(queue.policy(), OccupancyPolicy::Shared);
        assert_eq!(queue.capacity(), 8);
    }
}
