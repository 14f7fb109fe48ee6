//! 任务事件通知
//!
//! 每个任务拥有一个事件组 (`EventGroup`):
//! - 任意上下文 (包括中断) 调用 `set` 标记 "有待处理工作"
//! - 任务在 `wait` 上挂起，直到关心的事件位被置位
//! - 任务被唤醒后调用 `clear` 清除事件位，再处理工作
//!
//! 任务只在 `wait` 处挂起，这是唯一的调度点。

use core::cell::Cell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex};
use embassy_sync::waitqueue::AtomicWaker;

/// 事件位掩码
pub type EventMask = u32;

// ===== 事件位定义 =====

/// 流缓冲区中已有完整消息 (唤醒分帧任务)
pub const EV_FRAME_READY: EventMask = 1 << 0;

/// 扇出队列中有显示负载
pub const EV_DISPLAY: EventMask = 1 << 1;

/// 扇出队列中有串口转发负载
pub const EV_FORWARD: EventMask = 1 << 2;

/// 通信层中的任务标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum TaskId {
    /// 分帧任务 (流缓冲区消费者，扇出队列生产者)
    Framer = 0,
    /// 显示渲染任务
    Display = 1,
    /// 串口转发任务
    SerialForward = 2,
}

impl TaskId {
    /// 任务数量
    pub const COUNT: usize = 3;

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// 通知描述符: 唤醒哪个任务、使用哪个事件位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub struct Notification {
    pub task: TaskId,
    pub event: EventMask,
}

impl Notification {
    pub const fn new(task: TaskId, event: EventMask) -> Self {
        Self { task, event }
    }
}

/// 通知发送端
///
/// 非阻塞，可在任意上下文调用 (包括中断)
pub trait Notify {
    fn notify(&self, task: TaskId, event: EventMask);
}

/// 单个任务的事件组
pub struct EventGroup {
    pending: BlockingMutex<CriticalSectionRawMutex, Cell<EventMask>>,
    waker: AtomicWaker,
}

impl EventGroup {
    pub const fn new() -> Self {
        Self {
            pending: BlockingMutex::new(Cell::new(0)),
            waker: AtomicWaker::new(),
        }
    }

    /// 置位事件并唤醒等待的任务
    #[inline]
    pub fn set(&self, mask: EventMask) {
        self.pending.lock(|pending| pending.set(pending.get() | mask));
        self.waker.wake();
    }

    /// 读取当前挂起的事件 (不清除)
    #[inline]
    pub fn get(&self) -> EventMask {
        self.pending.lock(|pending| pending.get())
    }

    /// 清除指定事件位
    #[inline]
    pub fn clear(&self, mask: EventMask) {
        self.pending.lock(|pending| pending.set(pending.get() & !mask));
    }

    /// 等待 `mask` 中任一事件被置位
    ///
    /// 返回命中的事件位，不会自动清除
    pub async fn wait(&self, mask: EventMask) -> EventMask {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            let hit = self.get() & mask;
            if hit != 0 {
                Poll::Ready(hit)
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl Default for EventGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// 全部任务的事件组
pub struct TaskEvents {
    groups: [EventGroup; TaskId::COUNT],
}

impl TaskEvents {
    pub const fn new() -> Self {
        const EMPTY: EventGroup = EventGroup::new();
        Self {
            groups: [EMPTY; TaskId::COUNT],
        }
    }

    /// 获取指定任务的事件组
    #[inline(always)]
    pub fn group(&self, task: TaskId) -> &EventGroup {
        &self.groups[task.index()]
    }
}

impl Default for TaskEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl Notify for TaskEvents {
    #[inline]
    fn notify(&self, task: TaskId, event: EventMask) {
        self.group(task).set(event);
    }
}
