//! Vigil - Real-time Monitoring Node Firmware
//!
//! Main firmware binary for RP2040-based monitoring nodes. Three periodic
//! tasks (sensor, counter, display) run on the vigil kernel, one interrupt
//! executor per priority; the peripherals are owned by embassy tasks
//! around it.
//!
//! Executors:
//! - SWI_IRQ_0 (P0): the I2C sensor bus, so transaction completions
//!   arrive while the sensor task busy-waits at its level
//! - SWI_IRQ_1..3 (P1..P3): kernel levels, see [`kernel`]
//! - thread mode: idle loop (status panel, halt), display link TX, query
//!   endpoint

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_futures::select::select;
use embassy_rp::bind_interrupts;
use embassy_rp::i2c::{self, I2c};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority as IrqPriority};
use embassy_rp::peripherals::{I2C1, UART0, UART1};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::{Duration, Instant, Timer};
use heapless::String;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use vigil_core::bridge::Bridged;
use vigil_core::config::MAX_PATH_LEN;
use vigil_core::node::{spawn_node, NodeTasks, MAX_LEVELS};
use vigil_core::scheduler::{Halt, IdleHook, Levels};
use vigil_core::status::StatusPanel;
use vigil_core::tasks::{draw_static_labels, CounterTask, DisplayTask, SensorTask};
use vigil_drivers::sensor::{Resolution, Tmp100};

use crate::channels::{BRIDGE, COUNTER, QUERIES, TEMPERATURE};
use crate::display::LinkRenderer;
use crate::halt::{halt, Fatal};
use crate::kernel::{MAX_TASKS, TABLE};
use crate::tasks::BusSensor;

mod channels;
mod config;
mod display;
mod halt;
mod kernel;
mod stack_guard;
mod tasks;

/// Longest the idle loop sleeps without a scheduling change
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The node's task bodies, living for the program duration
type Node = NodeTasks<'static, Bridged<'static, BusSensor>, LinkRenderer>;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
});

/// Executor for the sensor bus, above every kernel level
static SENSOR_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_0() {
    SENSOR_EXECUTOR.on_interrupt()
}

// Static cells for UART buffers (must live forever)
static LINK_TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static LINK_RX_BUF: StaticCell<[u8; 16]> = StaticCell::new();
static NET_TX_BUF: StaticCell<[u8; 1024]> = StaticCell::new();
static NET_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

// The endpoint task borrows the data path for the program duration
static DATA_PATH: StaticCell<String<MAX_PATH_LEN>> = StaticCell::new();

// Kernel levels borrow the task bodies for the program duration
static NODE: StaticCell<Node> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Vigil firmware starting...");

    stack_guard::paint();
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = config::load_config();
    info!(
        "Periods: counter={}ms sensor={}ms display={}ms",
        config.counter.period_ms, config.sensor.period_ms, config.display.period_ms
    );

    // Display link on UART0 (GP0 TX, GP1 RX), 115200 baud default
    let link_tx_buf = LINK_TX_BUF.init([0u8; 512]);
    let link_rx_buf = LINK_RX_BUF.init([0u8; 16]);
    let link = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let link = link.into_buffered(Irqs, link_tx_buf, link_rx_buf);
    let (link_tx, _link_rx) = link.split();

    if spawner.spawn(tasks::display_tx_task(link_tx)).is_err() {
        halt(Fatal::Spawn("display_tx")).await;
    }

    // Boot screen, queued before any kernel task can draw
    let mut renderer = LinkRenderer;
    renderer.clear();
    draw_static_labels(&mut renderer, &config.display);

    // TMP100 on I2C1 (GP14 SDA, GP15 SCL), serviced at interrupt priority
    let i2c = I2c::new_async(p.I2C1, p.PIN_15, p.PIN_14, Irqs, i2c::Config::default());
    let resolution =
        Resolution::from_bits(config.sensor.resolution_bits).unwrap_or(Resolution::Bits12);
    let sensor = Tmp100::new(config.sensor.address, resolution);

    interrupt::SWI_IRQ_0.set_priority(IrqPriority::P0);
    let bus_spawner = SENSOR_EXECUTOR.start(interrupt::SWI_IRQ_0);
    if bus_spawner.spawn(tasks::sensor_bus_task(i2c, sensor)).is_err() {
        halt(Fatal::Spawn("sensor_bus")).await;
    }

    // Query endpoint on UART1 (GP4 TX, GP5 RX) to the network bridge
    if config.endpoint.enabled {
        let net_tx_buf = NET_TX_BUF.init([0u8; 1024]);
        let net_rx_buf = NET_RX_BUF.init([0u8; 256]);
        let net = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, UartConfig::default());
        let net = net.into_buffered(Irqs, net_tx_buf, net_rx_buf);

        let data_path = DATA_PATH.init(config.endpoint.data_path.clone());
        let first_sample = Duration::from_millis(config.sensor.period_ms.into());
        if spawner
            .spawn(tasks::endpoint_task(net, data_path.as_str(), first_sample))
            .is_err()
        {
            halt(Fatal::Spawn("endpoint")).await;
        }
    } else {
        info!("Query endpoint disabled");
    }

    let node = NODE.init(NodeTasks {
        counter: CounterTask::new(&COUNTER, config.counter.duty_cycle()),
        sensor: SensorTask::new(
            Bridged::new(BusSensor, &BRIDGE),
            &TEMPERATURE,
            config.sensor.error_policy,
        ),
        display: DisplayTask::new(LinkRenderer, &COUNTER, &TEMPERATURE, config.display.clone()),
    });

    // One level per distinct priority, each on its own interrupt executor
    let mut levels: Levels<'static, MAX_TASKS, MAX_LEVELS> = Levels::new(&TABLE);
    match spawn_node(&mut levels, node, &config) {
        Ok(handles) => info!(
            "Kernel tasks created: counter={} sensor={} display={}",
            handles.counter, handles.sensor, handles.display
        ),
        Err(e) => {
            error!("Failed to create kernel tasks: {:?}", e);
            halt(Fatal::Kernel(Halt::Spawn(e))).await;
        }
    }

    for (rank, level) in levels.into_levels().into_iter().enumerate() {
        let priority = level.priority().0;
        if kernel::start_level(rank).spawn(kernel::level_task(level)).is_err() {
            halt(Fatal::Spawn("level")).await;
        }
        info!("Priority {} tasks on level executor {}", priority, rank);
    }

    info!("All tasks spawned, kernel running");

    // Thread mode only gets here when every level is parked
    let mut status = StatusPanel::new(LinkRenderer, &QUERIES);
    loop {
        let seen = TABLE.generation();

        if let Some(reason) = TABLE.halted() {
            halt(Fatal::Kernel(reason)).await;
        }
        if let Some(info) = TABLE.idle(Instant::now().as_millis()) {
            status.on_idle(&info);
        }

        select(TABLE.changed(seen), Timer::after(IDLE_POLL)).await;
    }
}
