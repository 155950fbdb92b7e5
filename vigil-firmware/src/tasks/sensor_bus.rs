//! Sensor bus task
//!
//! Runs on the interrupt-priority executor and owns the I2C bus. Each
//! transaction the sensor task issues is executed here, and its outcome is
//! delivered through the completion bridge from interrupt priority, so it
//! preempts the kernel while the sensor task busy-waits.

use defmt::*;
use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::I2C1;
use portable_atomic::Ordering;

use vigil_core::bridge::Transaction;
use vigil_core::traits::SensorDriver;
use vigil_drivers::sensor::Tmp100;

use crate::channels::{BRIDGE, SENSOR_READING, SENSOR_REQUEST};

/// Sensor bus task - executes TMP100 transactions on request
#[embassy_executor::task]
pub async fn sensor_bus_task(mut i2c: I2c<'static, I2C1, Async>, mut sensor: Tmp100) {
    info!("Sensor bus task started (TMP100 at {:#x})", sensor.address());

    loop {
        let transaction = SENSOR_REQUEST.wait().await;
        let status = sensor.execute(&mut i2c, transaction).await;

        if status.is_success() {
            SENSOR_READING.store(sensor.temperature_c().to_bits(), Ordering::Release);
        } else {
            warn!("Sensor {:?} failed: {:?}", transaction, status);
        }

        if !BRIDGE.on_hardware_event(status) {
            warn!("Completion for {:?} with nothing issued", transaction);
        }
    }
}

/// Kernel-side handle on the bus task
///
/// Starting an operation only raises a request; the bus task runs it and
/// reports completion through [`BRIDGE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BusSensor;

impl BusSensor {
    fn start(&mut self, transaction: Transaction) {
        SENSOR_REQUEST.signal(transaction);
    }
}

impl SensorDriver for BusSensor {
    fn initialize(&mut self) {
        self.start(Transaction::Initialize);
    }

    fn configure(&mut self) {
        self.start(Transaction::Configure);
    }

    fn request_read(&mut self) {
        self.start(Transaction::Read);
    }

    fn temperature_c(&self) -> f32 {
        f32::from_bits(SENSOR_READING.load(Ordering::Acquire))
    }
}
