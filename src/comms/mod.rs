//! 任务间通信模块
//!
//! 数据流:
//!
//! ```text
//! UART RX 中断 ──► StreamBuffer ──► 分帧任务 ──► FanoutQueue ──┬──► 显示任务
//!                                                             └──► 串口转发任务
//! ```
//!
//! - `stream`: 中断写入、按结束符分帧读取的字节缓冲区
//! - `fanout`: 单生产者多消费者的槽位队列
//! - `frame`: 分帧逻辑 (加锁/无锁缓冲区共用)
//! - `codec`: 下游负载编码
//! - `hub`: 持有全部缓冲区的中枢

pub mod codec;
pub mod error;
pub mod fanout;
pub mod frame;
pub mod hub;
pub mod stream;

pub use error::{CommsError, Result};
pub use fanout::{ConsumerId, FanoutQueue, OccupancyPolicy, Payload};
pub use hub::{CommsHub, HubConfig};
pub use stream::StreamBuffer;
