//! 同步原语封装
//!
//! 基于 embassy-sync 提供的同步原语，统一使用 CriticalSectionRawMutex。
//! 通信缓冲区既要被中断 (生产者) 访问，又要被任务 (消费者) 访问，
//! 因此互斥资源必须是阻塞式临界区锁，而不是异步 Mutex。

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex};

// ===== 类型别名: 简化使用 =====

/// 临界区阻塞互斥锁 - 中断与任务共享的独占访问资源
///
/// `lock` 在临界区内执行闭包，闭包返回即释放，
/// 所有退出路径 (包括错误返回) 都会释放锁。
///
/// # Example
/// ```ignore
/// static STATE: CriticalBlockingMutex<Counter> = CriticalBlockingMutex::new(RefCell::new(Counter::new()));
///
/// let value = STATE.lock(|cell| {
///     let mut counter = cell.borrow_mut();
///     counter.value += 1;
///     counter.value
/// });
/// ```
pub type CriticalBlockingMutex<T> = BlockingMutex<CriticalSectionRawMutex, RefCell<T>>;

// ===== 便捷构造函数 =====

/// 创建新的阻塞互斥锁
#[inline]
pub const fn new_blocking_mutex<T>(value: T) -> CriticalBlockingMutex<T> {
    BlockingMutex::new(RefCell::new(value))
}

// ===== 同步工具函数 =====

/// 在临界区中执行闭包
///
/// 禁用中断确保原子性，适用于非常短的操作
///
/// # Warning
/// 临界区内不能执行任何异步操作或长时间计算
#[inline]
pub fn with_critical_section<R, F>(f: F) -> R
where
    F: FnOnce(critical_section::CriticalSection) -> R,
{
    critical_section::with(f)
}
