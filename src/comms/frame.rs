//! 结束符分帧
//!
//! 从连续字节流中逐字节读取，直到读到结束符 (`config::EOM_MARKER`)。
//! 加锁的流缓冲区和无锁 SPSC 环形缓冲区共用同一套分帧逻辑。

use crate::comms::error::{CommsError, Result};
use crate::config::EOM_MARKER;

/// 单字节读取源
pub trait ByteQueue {
    /// 读取一个字节，空时返回 `BufferEmpty`
    fn read_byte(&mut self) -> Result<u8>;
}

/// 读取一条以结束符结尾的消息到 `out`
///
/// 最大消息长度为 `out.len()`，结束符计入长度。
///
/// # Returns
/// - `Ok(len)`: 读到结束符，`out[..len]` 为完整消息
/// - `Err(Incomplete)`: 读空前未见结束符
/// - `Err(TooLong)`: 已读满 `out.len()` 字节仍无结束符
/// - `Err(NullArgument)`: `out` 为空
///
/// 失败时已读取的字节不会放回。
pub fn read_frame<Q>(queue: &mut Q, out: &mut [u8]) -> Result<usize>
where
    Q: ByteQueue + ?Sized,
{
    if out.is_empty() {
        return Err(CommsError::NullArgument);
    }

    let mut len = 0;
    loop {
        let byte = match queue.read_byte() {
            Ok(byte) => byte,
            Err(CommsError::BufferEmpty) => return Err(CommsError::Incomplete),
            Err(e) => return Err(e),
        };

        out[len] = byte;
        len += 1;

        if byte == EOM_MARKER {
            return Ok(len);
        }

        // 已无空间容纳结束符
        if len >= out.len() {
            return Err(CommsError::TooLong);
        }
    }
}
