//! 同步原语模块
//!
//! 基于 embassy-sync 封装:
//! - `CriticalBlockingMutex`: 中断与任务共享的临界区互斥锁
//! - `EventGroup` / `TaskEvents`: 任务事件通知
//! - `SpscByteRing`: 无锁 SPSC 字节环形缓冲区

pub mod event;
pub mod primitives;
pub mod ringbuffer;

pub use event::{EventGroup, EventMask, Notification, Notify, TaskEvents, TaskId};
pub use primitives::CriticalBlockingMutex;
pub use ringbuffer::SpscByteRing;
