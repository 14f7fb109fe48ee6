//! TaskComms - 中断驱动的分帧缓冲区与多消费者扇出队列
//!
//! 本库提供以下核心功能:
//! - 中断写入、按结束符分帧读取的流式字节缓冲区
//! - 单生产者多消费者的槽位扇出队列 (共享 / 按消费者占用量)
//! - 任务事件通知与临界区互斥封装 (基于 Embassy)
//! - 分帧 / 显示 / 串口转发三个任务的主循环
//! - 条件编译日志系统

#![cfg_attr(not(test), no_std)]

pub mod comms;
pub mod sync;
pub mod tasks;
pub mod util;

// ===== 重导出常用类型 =====
pub use comms::{
    CommsError,
    CommsHub,
    ConsumerId,
    FanoutQueue,
    HubConfig,
    OccupancyPolicy,
    StreamBuffer,
};
pub use sync::{Notification, Notify, SpscByteRing, TaskEvents, TaskId};

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 系统配置常量
pub mod config {
    /// 流缓冲区容量 (字节)
    pub const STREAM_CAPACITY: usize = 256;

    /// 消息结束符
    pub const EOM_MARKER: u8 = b'\0';

    /// 单条消息最大长度 (含结束符)
    pub const MAX_MSG_LEN: usize = 128;

    /// 扇出队列槽位数
    pub const FANOUT_SLOTS: usize = 8;

    /// 单个槽位最大负载 (字节)
    pub const SLOT_PAYLOAD_MAX: usize = 128;

    /// 显示: 每个数值的水平间距 (像素)
    pub const DISPLAY_COLUMN_STEP: u16 = 16;

    /// 显示: 绘制行 (像素)
    pub const DISPLAY_ROW: u16 = 20;

    /// 串口转发: 数值分隔符
    pub const FORWARD_DELIMITER: &str = ", ";

    /// 串口转发: 行尾
    pub const FORWARD_TRAILER: &str = ".\n\r";

    /// 日志/转发 UART 波特率
    pub const UART_BAUDRATE: u32 = 115_200;

    /// UART 接收 FIFO 中断阈值 (字节)，逐字节送入流缓冲区
    pub const UART_RX_FIFO_THRESHOLD: u16 = 1;

    // 分帧得到的完整消息必须能放入单个槽位
    const _: () = assert!(MAX_MSG_LEN <= SLOT_PAYLOAD_MAX);
}
