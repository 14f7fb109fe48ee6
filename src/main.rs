//! TaskComms 固件入口 - ESP32-S3
//!
//! - UART0 接收中断: 逐字节写入流缓冲区 (生产者上下文)
//! - 分帧任务: 分帧并扇出到显示/串口转发
//! - 显示任务: 渲染负载 (本板无屏幕，以日志输出代替)
//! - 转发任务: 以十进制文本写回 UART0
//!
//! 硬件目标: ESP32-S3-N16R8

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::{
    handler,
    interrupt::{software::SoftwareInterruptControl, Priority},
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, RxConfig, Uart, UartInterrupt},
    Blocking,
};
use esp_rtos::embassy::InterruptExecutor;
use static_cell::StaticCell;

use taskcomms::comms::codec::write_all_with;
use taskcomms::sync::primitives::with_critical_section;
use taskcomms::tasks::{display, forward, framer, DisplaySink};
use taskcomms::{config, CommsHub, HubConfig, OccupancyPolicy, NAME, VERSION};
#[allow(unused_imports)]
use taskcomms::util::log::*;

esp_bootloader_esp_idf::esp_app_desc!();

// ===== defmt 全局 logger =====
#[cfg(feature = "log-defmt")]
use defmt_rtt as _;

// ===== Panic Handler =====
#[cfg(any(feature = "dev", feature = "log-println"))]
use esp_backtrace as _;

#[cfg(not(any(feature = "dev", feature = "log-println")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop { core::hint::spin_loop(); }
}

// ===== 静态分配 =====
/// 通信中枢 - 中断与三个任务共享
///
/// 显示与转发任务在同一执行器上，轮询顺序不固定；共享占用量下显示任务的
/// `flush_all` 会丢掉转发任务尚未读取的槽位，因此固件使用按消费者占用量。
static HUB: CommsHub =
    CommsHub::new(HubConfig::new().with_policy(OccupancyPolicy::PerConsumer));

/// 分帧执行器 (高于显示/转发所在的线程模式执行器)
static FRAMER_EXECUTOR: StaticCell<InterruptExecutor<1>> = StaticCell::new();

/// UART0 - 接收中断读取 FIFO，转发任务写入
static UART: Mutex<RefCell<Option<Uart<'static, Blocking>>>> = Mutex::new(RefCell::new(None));

// ===== UART 接收中断 =====
#[handler]
fn uart_rx_handler() {
    with_critical_section(|cs| {
        let mut uart = UART.borrow_ref_mut(cs);
        let Some(uart) = uart.as_mut() else {
            return;
        };

        // FIFO 阈值为 1，每个字节都会触发一次中断，这里一次取空
        let mut fifo = [0u8; 16];
        while let Ok(n) = uart.read_buffered(&mut fifo) {
            if n == 0 {
                break;
            }
            for &byte in &fifo[..n] {
                framer::on_rx_byte(&HUB, byte);
            }
        }

        uart.clear_interrupts(UartInterrupt::RxFifoFull.into());
    });
}

// ===== 下游边界 =====

/// 串口转发输出 (写入 UART0)
struct SerialOut;

impl fmt::Write for SerialOut {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        with_critical_section(|cs| {
            let mut uart = UART.borrow_ref_mut(cs);
            let uart = uart.as_mut().ok_or(fmt::Error)?;

            write_all_with(s.as_bytes(), |chunk| uart.write(chunk)).map_err(|_| fmt::Error)
        })
    }
}

/// 以日志代替屏幕的显示输出
struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn clear(&mut self) {
        log_debug!("Display cleared");
    }

    fn print_int(&mut self, x: u16, y: u16, value: u8) {
        log_info!("Display ({}, {}): {}", x, y, value);
    }
}

// ===== Embassy 任务包装 =====

#[embassy_executor::task]
async fn framer_task(hub: &'static CommsHub) {
    framer::run(hub).await;
}

#[embassy_executor::task]
async fn display_task(hub: &'static CommsHub) {
    display::run(hub, LogDisplay).await;
}

#[embassy_executor::task]
async fn forward_task(hub: &'static CommsHub) {
    forward::run(hub, SerialOut).await;
}

// ===== 主入口点 =====
#[esp_rtos::main]
async fn main(spawner: Spawner) {
    // ========================================
    // 1. 硬件初始化
    // ========================================
    let peripherals = esp_hal::init(esp_hal::Config::default());

    log_info!("{} v{} starting on ESP32-S3", NAME, VERSION);

    // ========================================
    // 2. 启动 RTOS 时间驱动
    // ========================================
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // ========================================
    // 3. 缓冲区初始化 (唯一初始化入口，必须早于接收中断)
    // ========================================
    HUB.init();

    // ========================================
    // 4. UART0 + 接收中断
    // ========================================
    // 默认 RX FIFO 阈值过高，短消息会滞留在硬件 FIFO 中
    let uart_config = UartConfig::default()
        .with_baudrate(config::UART_BAUDRATE)
        .with_rx(RxConfig::default().with_fifo_full_threshold(config::UART_RX_FIFO_THRESHOLD));
    let mut uart = match Uart::new(peripherals.UART0, uart_config) {
        Ok(uart) => uart.with_rx(peripherals.GPIO44).with_tx(peripherals.GPIO43),
        Err(_) => {
            log_error!("UART0 configuration rejected");
            return;
        }
    };
    uart.set_interrupt_handler(uart_rx_handler);

    with_critical_section(|cs| {
        uart.listen(UartInterrupt::RxFifoFull);
        UART.borrow_ref_mut(cs).replace(uart);
    });

    log_info!("UART0 RX interrupt enabled");

    // ========================================
    // 5. 启动任务
    // ========================================
    // 分帧任务在中断执行器上运行，可抢占消费者任务
    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    let framer_executor = FRAMER_EXECUTOR.init(InterruptExecutor::new(sw_ints.software_interrupt1));
    let framer_spawner = framer_executor.start(Priority::Priority2);
    framer_spawner.must_spawn(framer_task(&HUB));

    log_info!("Framer executor started (Priority2)");

    spawner.must_spawn(display_task(&HUB));
    spawner.must_spawn(forward_task(&HUB));

    log_info!("All tasks spawned, entering main loop");

    // ========================================
    // 6. 主循环 - 缓冲区监控
    // ========================================
    let mut tick_count: u64 = 0;

    loop {
        tick_count += 1;

        if tick_count % 10 == 0 {
            log_info!(
                "Heartbeat: {} ticks, rx={} bytes, fanout={} slots",
                tick_count,
                HUB.stream().len(),
                HUB.fanout().len()
            );
        }

        Timer::after(Duration::from_secs(1)).await;
    }
}
