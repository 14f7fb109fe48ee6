//! 条件编译日志系统
//!
//! 根据 feature 选择日志后端:
//! - `log-defmt`: defmt (需要固件链接 `defmt-rtt`)
//! - `dev` / `log-println`: esp-println 文本日志，带级别前缀
//! - 默认 (主机测试 / release): 完全禁用日志，参数不求值
//!
//! 通信层只在故障路径上输出诊断信息，正常收发路径不打印。
//! 五个级别宏都转发给 `__comms_log!`，由它选择后端。

// ===================================================================
// 后端分派
// ===================================================================
#[cfg(feature = "log-defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __comms_log {
    (info, $tag:literal, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $tag:literal, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $tag:literal, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $tag:literal, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $tag:literal, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __comms_log {
    ($level:ident, $tag:literal, $($arg:tt)*) => {
        esp_println::println!(concat!("[", $tag, "] {}"), format_args!($($arg)*))
    };
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __comms_log {
    ($level:ident, $tag:literal, $($arg:tt)*) => {};
}

// ===================================================================
// 级别宏
// ===================================================================
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__comms_log!(info, "INFO", $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__comms_log!(debug, "DEBUG", $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__comms_log!(warn, "WARN", $($arg)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__comms_log!(error, "ERROR", $($arg)*) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__comms_log!(trace, "TRACE", $($arg)*) };
}

pub use log_debug;
pub use log_error;
pub use log_info;
pub use log_trace;
pub use log_warn;

// ===================================================================
// 不变量检查 (仅 debug 构建)
// ===================================================================

/// 缓冲区游标/计数不变量检查，release 构建中完全移除
///
/// defmt 不接受 `format_args!`，因此 defmt 后端分两行输出
#[macro_export]
macro_rules! debug_assert_msg {
    ($cond:expr, $($arg:tt)*) => {
        #[cfg(debug_assertions)]
        {
            if !$cond {
                #[cfg(feature = "log-defmt")]
                {
                    $crate::log_error!("invariant violated:");
                    $crate::log_error!($($arg)*);
                }
                #[cfg(not(feature = "log-defmt"))]
                $crate::log_error!("invariant violated: {}", format_args!($($arg)*));

                panic!("invariant violated: {}", format_args!($($arg)*));
            }
        }
    };
}

pub use debug_assert_msg;
