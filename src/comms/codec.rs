//! 下游负载编码
//!
//! 负载的最后一个字节是结束符，渲染和转发时都需要去掉。
//! 串口转发格式: 十进制数值，以 `", "` 分隔，以 `".\n\r"` 结尾。

use core::fmt::{self, Write};

use crate::config::{EOM_MARKER, FORWARD_DELIMITER, FORWARD_TRAILER};

/// 去掉末尾结束符后的消息正文
///
/// 末尾不是结束符时原样返回
#[inline]
pub fn message_body(payload: &[u8]) -> &[u8] {
    match payload.split_last() {
        Some((&last, body)) if last == EOM_MARKER => body,
        _ => payload,
    }
}

/// 以十进制文本写出消息正文
///
/// `[49, 50, 0]` => `"49, 50.\n\r"`
pub fn write_decimal_line<W: Write + ?Sized>(payload: &[u8], out: &mut W) -> fmt::Result {
    let body = message_body(payload);

    for (i, value) in body.iter().enumerate() {
        if i > 0 {
            out.write_str(FORWARD_DELIMITER)?;
        }
        write!(out, "{}", value)?;
    }
    out.write_str(FORWARD_TRAILER)
}

/// 把 `bytes` 全部交给 `write`
///
/// `write` 每次可能只接受一部分 (例如 UART TX FIFO 剩余空间)，返回接受的字节数
pub fn write_all_with<E, F>(mut bytes: &[u8], mut write: F) -> core::result::Result<(), E>
where
    F: FnMut(&[u8]) -> core::result::Result<usize, E>,
{
    while !bytes.is_empty() {
        let written = write(bytes)?;
        bytes = bytes.get(written..).unwrap_or(&[]);
    }
    Ok(())
}
