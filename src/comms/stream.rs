//! 流式字节缓冲区
//!
//! 中断上下文 (UART 接收) 逐字节写入，分帧任务按结束符读取整条消息。
//!
//! - 固定容量，满时丢弃新字节 (不覆盖最旧数据)
//! - 溢出后进入重同步: 丢弃未结束的尾部，直到下一个结束符 (含) 为止的字节都不入队
//! - 每个操作都持有同一个临界区锁，写入路径 O(1) 且不会挂起
//! - `read_message` 在一次加锁内完成整个扫描，中断写入不会插入其中

use crate::comms::error::{CommsError, Result};
use crate::comms::frame::{read_frame, ByteQueue};
use crate::config::EOM_MARKER;
use crate::debug_assert_msg;
use crate::sync::primitives::{new_blocking_mutex, CriticalBlockingMutex};

/// 缓冲区内部状态 (只在锁内访问)
struct StreamState<const N: usize> {
    storage: [u8; N],
    /// 下一个待读取位置
    read: usize,
    /// 下一个空闲位置
    write: usize,
    /// 已存储未读取的字节数
    occupancy: usize,
    /// 缓冲区中未读取的结束符数量 (= 完整消息数)
    frames: usize,
    /// 溢出后丢弃字节，直到下一个结束符
    resync: bool,
}

impl<const N: usize> StreamState<N> {
    const fn new() -> Self {
        Self {
            storage: [0; N],
            read: 0,
            write: 0,
            occupancy: 0,
            frames: 0,
            resync: false,
        }
    }

    fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
        self.occupancy = 0;
        self.frames = 0;
        self.resync = false;
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        if self.resync {
            if byte == EOM_MARKER {
                self.resync = false;
            }
            return Ok(());
        }

        if self.occupancy >= N {
            return Err(CommsError::BufferFull);
        }

        self.storage[self.write] = byte;
        self.write = (self.write + 1) % N;
        self.occupancy += 1;
        if byte == EOM_MARKER {
            self.frames += 1;
        }
        self.check_invariant();
        Ok(())
    }

    fn pop(&mut self) -> Result<u8> {
        if self.occupancy == 0 {
            return Err(CommsError::BufferEmpty);
        }

        let byte = self.storage[self.read];
        self.read = (self.read + 1) % N;
        self.occupancy -= 1;
        if byte == EOM_MARKER {
            self.frames -= 1;
        }
        self.check_invariant();
        Ok(byte)
    }

    /// 溢出处理: 回退写游标到最后一个结束符之后，并进入重同步
    ///
    /// 已完整到达的消息保留
    fn truncate_partial(&mut self) {
        while self.occupancy > 0 {
            let last = (self.write + N - 1) % N;
            if self.storage[last] == EOM_MARKER {
                break;
            }
            self.write = last;
            self.occupancy -= 1;
        }
        self.resync = true;
        self.check_invariant();
    }

    /// 读游标追上写游标 = 空
    fn discard(&mut self) {
        self.read = self.write;
        self.occupancy = 0;
        self.frames = 0;
    }

    #[inline(always)]
    fn check_invariant(&self) {
        debug_assert_msg!(
            self.occupancy <= N
                && self.frames <= self.occupancy
                && (self.write + N - self.read) % N == self.occupancy % N,
            "stream cursors out of sync: read={} write={} occupancy={}",
            self.read,
            self.write,
            self.occupancy
        );
    }
}

impl<const N: usize> ByteQueue for StreamState<N> {
    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        self.pop()
    }
}

/// 流式字节缓冲区
///
/// 单生产者 (中断) 单消费者 (分帧任务)。
///
/// # Type Parameters
/// * `N` - 容量 (字节)
///
/// # Example
/// ```ignore
/// static RX: StreamBuffer<256> = StreamBuffer::new();
///
/// // 中断上下文
/// let _ = RX.write_byte(byte);
///
/// // 分帧任务
/// let mut msg = [0u8; 128];
/// match RX.read_message(&mut msg) {
///     Ok(len) => handle(&msg[..len]),
///     Err(_) => RX.flush(),
/// }
/// ```
pub struct StreamBuffer<const N: usize> {
    state: CriticalBlockingMutex<StreamState<N>>,
}

impl<const N: usize> StreamBuffer<N> {
    /// 创建空缓冲区
    pub const fn new() -> Self {
        assert!(N > 0, "N must be non-zero");

        Self {
            state: new_blocking_mutex(StreamState::new()),
        }
    }

    /// 复位为空状态
    pub fn init(&self) {
        self.state.lock(|state| state.borrow_mut().reset());
    }

    /// 缓冲区容量
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 当前存储的字节数
    pub fn len(&self) -> usize {
        self.state.lock(|state| state.borrow().occupancy)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// 缓冲区中已完整到达的消息数
    pub fn pending_frames(&self) -> usize {
        self.state.lock(|state| state.borrow().frames)
    }

    /// 写入单个字节 (中断上下文)
    ///
    /// 满时返回 `BufferFull`，状态不变，字节被丢弃。
    /// 重同步期间字节被静默丢弃 (返回 `Ok`)，见 `resynchronize`
    #[inline]
    pub fn write_byte(&self, byte: u8) -> Result<()> {
        self.state.lock(|state| state.borrow_mut().push(byte))
    }

    /// 读取单个字节
    #[inline]
    pub fn read_byte(&self) -> Result<u8> {
        self.state.lock(|state| state.borrow_mut().pop())
    }

    /// 读取一条完整消息 (含结束符)
    ///
    /// 最大长度为 `out.len()`。失败时已读取的字节不会恢复，
    /// 调用方通常应随后调用 `flush` 重新同步。
    pub fn read_message(&self, out: &mut [u8]) -> Result<usize> {
        self.state.lock(|state| read_frame(&mut *state.borrow_mut(), out))
    }

    /// 溢出恢复: 丢弃未结束的尾部消息，并丢弃后续字节直到下一个结束符 (含)
    ///
    /// 在 `write_byte` 返回 `BufferFull` 后由中断侧调用。
    /// 缓冲区中已完整到达的消息不受影响。
    pub fn resynchronize(&self) {
        self.state.lock(|state| state.borrow_mut().truncate_partial());
    }

    /// 是否正在丢弃被截断消息的剩余字节
    pub fn is_resyncing(&self) -> bool {
        self.state.lock(|state| state.borrow().resync)
    }

    /// 丢弃所有未读字节
    ///
    /// 不结束重同步: 被截断消息的剩余字节仍会被丢弃
    pub fn flush(&self) {
        self.state.lock(|state| state.borrow_mut().discard());
    }
}

impl<const N: usize> Default for StreamBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_occupancy() {
        let buf: StreamBuffer<8> = StreamBuffer::new();

        for byte in 1..=5u8 {
            buf.write_byte(byte).unwrap();
        }
        assert_eq!(buf.len(), 5);

        assert_eq!(buf.read_byte(), Ok(1));
        assert_eq!(buf.read_byte(), Ok(2));
        assert_eq!(buf.len(), 3);

        // 跨越回绕点继续写入
        for byte in 6..=10u8 {
            buf.write_byte(byte).unwrap();
        }
        assert_eq!(buf.len(), 8);
        assert!(buf.is_full());

        for expected in 3..=10u8 {
            assert_eq!(buf.read_byte(), Ok(expected));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_write_when_full_drops_byte() {
        let buf: StreamBuffer<4> = StreamBuffer::new();
        for byte in [10, 20, 30, 40] {
            buf.write_byte(byte).unwrap();
        }

        assert_eq!(buf.write_byte(99), Err(CommsError::BufferFull));
        assert_eq!(buf.len(), 4);

        // 内容与顺序不受影响
        for expected in [10, 20, 30, 40] {
            assert_eq!(buf.read_byte(), Ok(expected));
        }
        assert_eq!(buf.read_byte(), Err(CommsError::BufferEmpty));
    }

    #[test]
    fn test_read_empty() {
        let buf: StreamBuffer<4> = StreamBuffer::new();
        assert_eq!(buf.read_byte(), Err(CommsError::BufferEmpty));
    }

    #[test]
    fn test_read_message_success() {
        let buf: StreamBuffer<16> = StreamBuffer::new();
        for byte in [b'A', b'B', EOM_MARKER] {
            buf.write_byte(byte).unwrap();
        }

        let mut msg = [0u8; 8];
        assert_eq!(buf.read_message(&mut msg), Ok(3));
        assert_eq!(&msg[..3], &[b'A', b'B', EOM_MARKER]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_message_incomplete_is_destructive() {
        let buf: StreamBuffer<16> = StreamBuffer::new();
        buf.write_byte(b'A').unwrap();
        buf.write_byte(b'B').unwrap();

        let mut msg = [0u8; 8];
        assert_eq!(buf.read_message(&mut msg), Err(CommsError::Incomplete));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_message_too_long() {
        let buf: StreamBuffer<16> = StreamBuffer::new();
        for byte in [b'A', b'B', b'C', EOM_MARKER] {
            buf.write_byte(byte).unwrap();
        }

        let mut msg = [0u8; 2];
        assert_eq!(buf.read_message(&mut msg), Err(CommsError::TooLong));
    }

    #[test]
    fn test_read_message_leaves_next_message() {
        let buf: StreamBuffer<16> = StreamBuffer::new();
        for byte in [b'1', EOM_MARKER, b'2', EOM_MARKER] {
            buf.write_byte(byte).unwrap();
        }

        assert_eq!(buf.pending_frames(), 2);

        let mut msg = [0u8; 8];
        assert_eq!(buf.read_message(&mut msg), Ok(2));
        assert_eq!(buf.pending_frames(), 1);
        assert_eq!(buf.read_message(&mut msg), Ok(2));
        assert_eq!(msg[0], b'2');
        assert_eq!(buf.pending_frames(), 0);
    }

    #[test]
    fn test_flush_always_empties() {
        let buf: StreamBuffer<4> = StreamBuffer::new();
        buf.flush();
        assert_eq!(buf.len(), 0);

        for byte in [1, 2, 3, 4] {
            buf.write_byte(byte).unwrap();
        }
        buf.read_byte().unwrap();
        buf.flush();

        assert_eq!(buf.len(), 0);
        assert_eq!(buf.read_byte(), Err(CommsError::BufferEmpty));

        // flush 后继续正常工作
        buf.write_byte(7).unwrap();
        assert_eq!(buf.read_byte(), Ok(7));
    }

    #[test]
    fn test_resynchronize_keeps_complete_frames() {
        let buf: StreamBuffer<8> = StreamBuffer::new();
        for byte in [1, EOM_MARKER, 9, 9, 9, 9, 9, 9] {
            buf.write_byte(byte).unwrap();
        }
        assert_eq!(buf.write_byte(9), Err(CommsError::BufferFull));

        buf.resynchronize();
        assert!(buf.is_resyncing());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.pending_frames(), 1);

        // 被截断消息的剩余部分 (含结束符) 不入队
        for byte in [9, 9, EOM_MARKER] {
            assert_eq!(buf.write_byte(byte), Ok(()));
        }
        assert!(!buf.is_resyncing());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.pending_frames(), 1);

        buf.write_byte(5).unwrap();
        buf.write_byte(EOM_MARKER).unwrap();

        let mut msg = [0u8; 8];
        assert_eq!(buf.read_message(&mut msg), Ok(2));
        assert_eq!(&msg[..2], &[1, EOM_MARKER]);
        assert_eq!(buf.read_message(&mut msg), Ok(2));
        assert_eq!(&msg[..2], &[5, EOM_MARKER]);
    }

    #[test]
    fn test_resynchronize_without_terminator_empties() {
        let buf: StreamBuffer<4> = StreamBuffer::new();
        for byte in [1, 2, 3, 4] {
            buf.write_byte(byte).unwrap();
        }

        buf.resynchronize();
        assert!(buf.is_empty());
        assert_eq!(buf.pending_frames(), 0);

        // flush 不结束重同步
        buf.flush();
        buf.write_byte(7).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_init_resets() {
        let buf: StreamBuffer<4> = StreamBuffer::new();
        buf.write_byte(1).unwrap();
        buf.resynchronize();
        buf.init();
        assert!(buf.is_empty());
        assert!(!buf.is_resyncing());
        assert_eq!(buf.capacity(), 4);
    }
}
