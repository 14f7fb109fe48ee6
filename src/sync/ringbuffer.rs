//! 无锁 SPSC 字节环形缓冲区
//!
//! `StreamBuffer` 的无锁替代实现，热路径上不进入临界区:
//! - 单生产者单消费者，通过 `split` 得到唯一的 `Producer` / `Consumer`
//! - head / tail 分别位于独立缓存行，避免 false sharing
//! - Release/Acquire 配对保证字节数据先于游标可见
//! - 满时丢弃新字节，与 `StreamBuffer` 语义一致

use core::cell::UnsafeCell;
use portable_atomic::{AtomicUsize, Ordering};

use crate::comms::error::{CommsError, Result};
use crate::comms::frame::{read_frame, ByteQueue};

/// 缓存行对齐的游标
#[repr(C, align(32))]
struct Cursor {
    value: AtomicUsize,
}

impl Cursor {
    const fn new() -> Self {
        Self {
            value: AtomicUsize::new(0),
        }
    }
}

/// 无锁字节环形缓冲区
///
/// # Type Parameters
/// * `N` - 容量 (必须是 2 的幂以优化取模运算)
///
/// # Example
/// ```ignore
/// let mut ring: SpscByteRing<256> = SpscByteRing::new();
/// let (mut producer, mut consumer) = ring.split();
///
/// // 中断上下文
/// let _ = producer.write_byte(byte);
///
/// // 分帧任务
/// let mut msg = [0u8; 128];
/// let len = consumer.read_message(&mut msg)?;
/// ```
#[repr(C)]
pub struct SpscByteRing<const N: usize> {
    /// 写入位置 (生产者更新，单调递增)
    head: Cursor,
    /// 读取位置 (消费者更新，单调递增)
    tail: Cursor,
    /// 数据存储
    buffer: UnsafeCell<[u8; N]>,
}

// Safety: 只能通过 split 得到的唯一 Producer/Consumer 访问存储
unsafe impl<const N: usize> Sync for SpscByteRing<N> {}

impl<const N: usize> SpscByteRing<N> {
    /// 创建新的空环形缓冲区
    ///
    /// # Panics
    /// 编译时检查 N 必须是 2 的幂
    pub const fn new() -> Self {
        assert!(N > 0 && (N & (N - 1)) == 0, "N must be a power of 2");

        Self {
            head: Cursor::new(),
            tail: Cursor::new(),
            buffer: UnsafeCell::new([0; N]),
        }
    }

    /// 缓冲区容量
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 当前字节数
    #[inline(always)]
    pub fn len(&self) -> usize {
        let head = self.head.value.load(Ordering::Acquire);
        let tail = self.tail.value.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// 掩码 (用于快速取模)
    #[inline(always)]
    const fn mask(&self) -> usize {
        N - 1
    }

    /// 拆分为生产者和消费者
    ///
    /// `&mut self` 保证同一时刻只存在一对句柄
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }
}

impl<const N: usize> Default for SpscByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// 生产者句柄 (中断上下文)
pub struct Producer<'a, const N: usize> {
    ring: &'a SpscByteRing<N>,
}

unsafe impl<const N: usize> Send for Producer<'_, N> {}

impl<const N: usize> Producer<'_, N> {
    /// 写入单个字节
    ///
    /// 满时返回 `BufferFull`，不覆盖旧数据
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        let ring = self.ring;
        let head = ring.head.value.load(Ordering::Relaxed);
        let tail = ring.tail.value.load(Ordering::Acquire);

        if head.wrapping_sub(tail) >= N {
            return Err(CommsError::BufferFull);
        }

        let idx = head & ring.mask();
        // Safety: 槽位 idx 在 head 发布前不会被消费者读取
        unsafe {
            (*ring.buffer.get())[idx] = byte;
        }

        ring.head.value.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

/// 消费者句柄 (分帧任务)
pub struct Consumer<'a, const N: usize> {
    ring: &'a SpscByteRing<N>,
}

unsafe impl<const N: usize> Send for Consumer<'_, N> {}

impl<const N: usize> Consumer<'_, N> {
    /// 读取单个字节
    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        let ring = self.ring;
        let head = ring.head.value.load(Ordering::Acquire);
        let tail = ring.tail.value.load(Ordering::Relaxed);

        if head == tail {
            return Err(CommsError::BufferEmpty);
        }

        let idx = tail & ring.mask();
        // Safety: 槽位 idx 已由生产者发布，且在 tail 推进前不会被覆盖
        let byte = unsafe { (*ring.buffer.get())[idx] };

        ring.tail.value.store(tail.wrapping_add(1), Ordering::Release);
        Ok(byte)
    }

    /// 读取一条完整消息 (含结束符)，语义同 `StreamBuffer::read_message`
    ///
    /// 扫描期间生产者仍可写入，新字节可能被本次读取包含
    pub fn read_message(&mut self, out: &mut [u8]) -> Result<usize> {
        read_frame(self, out)
    }

    /// 丢弃当前所有已发布的字节
    #[inline]
    pub fn flush(&mut self) {
        let head = self.ring.head.value.load(Ordering::Acquire);
        self.ring.tail.value.store(head, Ordering::Release);
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<const N: usize> ByteQueue for Consumer<'_, N> {
    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        Consumer::read_byte(self)
    }
}
