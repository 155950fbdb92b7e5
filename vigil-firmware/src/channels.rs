//! Inter-task communication channels
//!
//! The two latest-value channels carry the readings between the kernel
//! tasks and the endpoint. The rest connects the kernel to the embassy
//! tasks that own the peripherals.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use heapless::Vec;
use portable_atomic::AtomicU32;

use vigil_core::bridge::{CompletionBridge, Transaction};
use vigil_core::channel::LatestValue;
use vigil_core::endpoint::QueryCounter;
use vigil_protocol::frame::MAX_FRAME_SIZE;

/// Capacity of the draw command queue
const DRAW_QUEUE_SIZE: usize = 16;

/// One encoded display link frame
pub type DrawFrame = Vec<u8, MAX_FRAME_SIZE>;

/// Latest counter value (counter task → display task, endpoint)
pub static COUNTER: LatestValue<u32> = LatestValue::new();

/// Latest temperature in °C (sensor task → display task, endpoint)
pub static TEMPERATURE: LatestValue<f32> = LatestValue::new();

/// Completion bridge between the sensor task and the I2C bus task
pub static BRIDGE: CompletionBridge = CompletionBridge::new();

/// Transaction the sensor task wants the bus task to run
pub static SENSOR_REQUEST: Signal<CriticalSectionRawMutex, Transaction> = Signal::new();

/// Last temperature read by the bus task, as `f32` bits
pub static SENSOR_READING: AtomicU32 = AtomicU32::new(0);

/// Queries answered on the data path
pub static QUERIES: QueryCounter = QueryCounter::new();

/// Encoded draw commands waiting for the display link
pub static DRAW_QUEUE: Channel<CriticalSectionRawMutex, DrawFrame, DRAW_QUEUE_SIZE> =
    Channel::new();

/// Peek a channel, waiting at most `timeout` for a first value
pub async fn peek_timeout<T: Copy>(channel: &LatestValue<T>, timeout: Duration) -> Option<T> {
    channel.peek_until(Timer::after(timeout)).await
}
