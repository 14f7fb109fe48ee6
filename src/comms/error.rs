//! 通信层错误码
//!
//! 所有缓冲区操作返回 `Result`，不会终止程序。
//! 调用方根据错误类型决定恢复策略 (丢弃并重新同步 / 清空扇出队列)。

use core::fmt;

/// 缓冲区操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "log-defmt", derive(defmt::Format))]
pub enum CommsError {
    /// 生产者侧容量耗尽，字节被丢弃
    BufferFull,
    /// 消费者侧无数据可读
    BufferEmpty,
    /// 数据源耗尽前未读到结束符
    Incomplete,
    /// 消息长度超过上限仍未读到结束符
    TooLong,
    /// 扇出队列已满或负载超过槽位上限
    Rejected,
    /// 无效句柄 (空输出缓冲区 / 未知消费者 ID)
    NullArgument,
}

impl CommsError {
    /// 帧读取失败 (应丢弃当前消息并清空流缓冲区)
    #[inline]
    pub const fn is_framing(&self) -> bool {
        matches!(self, CommsError::Incomplete | CommsError::TooLong)
    }
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CommsError::BufferFull => "buffer full",
            CommsError::BufferEmpty => "buffer empty",
            CommsError::Incomplete => "message incomplete",
            CommsError::TooLong => "message too long",
            CommsError::Rejected => "send rejected",
            CommsError::NullArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

/// 通信层结果类型
pub type Result<T> = core::result::Result<T, CommsError>;
