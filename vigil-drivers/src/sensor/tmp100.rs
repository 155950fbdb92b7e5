//! TMP100 digital temperature sensor (I2C)
//!
//! The TMP100 holds its reading in a 16-bit, left-justified two's
//! complement register. At 12-bit resolution one LSB is 0.0625 °C.
//!
//! # Registers
//!
//! Every access starts by writing the pointer register; reads then return
//! the register the pointer selects:
//! - 0x00 temperature (read only, 2 bytes)
//! - 0x01 configuration (1 byte, resolution in bits 6:5)
//! - 0x02 / 0x03 low / high alert limits (2 bytes)

use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};
use embedded_hal_async::i2c::I2c;
use vigil_core::bridge::{Transaction, TransactionStatus};

/// TMP100 register pointers
pub mod reg {
    /// Temperature result
    pub const TEMPERATURE: u8 = 0x00;
    /// Configuration
    pub const CONFIG: u8 = 0x01;
    /// Low alert limit
    pub const T_LOW: u8 = 0x02;
    /// High alert limit
    pub const T_HIGH: u8 = 0x03;
}

/// Resolution bits (R1:R0) in the configuration register
const CONFIG_RES_MASK: u8 = 0x60;
const CONFIG_RES_SHIFT: u8 = 5;

/// Degrees per LSB of the 12-bit result
const DEGREES_PER_LSB: f32 = 0.0625;

/// Conversion resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 0.5 °C, fastest conversion
    Bits9,
    /// 0.25 °C
    Bits10,
    /// 0.125 °C
    Bits11,
    /// 0.0625 °C, slowest conversion
    Bits12,
}

impl Resolution {
    /// Resolution for a bit count (9-12)
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            9 => Some(Resolution::Bits9),
            10 => Some(Resolution::Bits10),
            11 => Some(Resolution::Bits11),
            12 => Some(Resolution::Bits12),
            _ => None,
        }
    }

    /// R1:R0 field value
    fn field(self) -> u8 {
        match self {
            Resolution::Bits9 => 0,
            Resolution::Bits10 => 1,
            Resolution::Bits11 => 2,
            Resolution::Bits12 => 3,
        }
    }
}

/// Map an I2C error kind onto a transaction status
pub fn status_from_kind(kind: ErrorKind) -> TransactionStatus {
    match kind {
        ErrorKind::Bus => TransactionStatus::BusError,
        ErrorKind::ArbitrationLoss => TransactionStatus::ArbitrationLost,
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => TransactionStatus::AddressNack,
        ErrorKind::NoAcknowledge(_) => TransactionStatus::DataNack,
        ErrorKind::Overrun => TransactionStatus::Overrun,
        _ => TransactionStatus::Other,
    }
}

/// TMP100 driver
#[derive(Debug, Clone)]
pub struct Tmp100 {
    address: u8,
    resolution: Resolution,
    /// Last result, right-justified 12-bit two's complement
    raw: i16,
    /// Configuration register as last written
    config: u8,
}

impl Tmp100 {
    /// Create a driver for the sensor at `address`
    pub fn new(address: u8, resolution: Resolution) -> Self {
        Self {
            address,
            resolution,
            raw: 0,
            config: 0,
        }
    }

    /// I2C address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Point the sensor at the temperature register
    ///
    /// Also confirms the device acknowledges its address.
    pub async fn initialize<I: I2c>(&mut self, i2c: &mut I) -> Result<(), I::Error> {
        i2c.write(self.address, &[reg::TEMPERATURE]).await
    }

    /// Set the conversion resolution
    ///
    /// Read-modify-write, so the other configuration bits are preserved.
    pub async fn configure<I: I2c>(&mut self, i2c: &mut I) -> Result<(), I::Error> {
        let mut current = [0u8; 1];
        i2c.write_read(self.address, &[reg::CONFIG], &mut current)
            .await?;

        let config = (current[0] & !CONFIG_RES_MASK)
            | (self.resolution.field() << CONFIG_RES_SHIFT);
        i2c.write(self.address, &[reg::CONFIG, config]).await?;
        self.config = config;
        Ok(())
    }

    /// Read the temperature register
    pub async fn read<I: I2c>(&mut self, i2c: &mut I) -> Result<f32, I::Error> {
        let mut buf = [0u8; 2];
        i2c.write_read(self.address, &[reg::TEMPERATURE], &mut buf)
            .await?;

        // Arithmetic shift keeps the sign
        self.raw = i16::from_be_bytes(buf) >> 4;
        Ok(self.temperature_c())
    }

    /// Run one transaction and report its completion status
    ///
    /// Errors are not propagated: they become the status code the
    /// completion bridge delivers to the issuing task.
    pub async fn execute<I: I2c>(
        &mut self,
        i2c: &mut I,
        transaction: Transaction,
    ) -> TransactionStatus {
        let result = match transaction {
            Transaction::Initialize => self.initialize(i2c).await,
            Transaction::Configure => self.configure(i2c).await,
            Transaction::Read => self.read(i2c).await.map(|_| ()),
        };

        match result {
            Ok(()) => TransactionStatus::Success,
            Err(e) => status_from_kind(e.kind()),
        }
    }

    /// Temperature from the last successful read, in degrees Celsius
    pub fn temperature_c(&self) -> f32 {
        f32::from(self.raw) * DEGREES_PER_LSB
    }

    /// Configuration register as last written
    pub fn config(&self) -> u8 {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal_async::i2c::{ErrorType, Operation};

    /// Register-level TMP100 model
    struct FakeBus {
        address: u8,
        pointer: u8,
        temperature: [u8; 2],
        config: u8,
        fail: Option<ErrorKind>,
        writes: usize,
    }

    impl FakeBus {
        fn new(address: u8) -> Self {
            Self {
                address,
                pointer: 0,
                temperature: [0, 0],
                // Power-on default with the shutdown and polarity bits set
                config: 0x05,
                fail: None,
                writes: 0,
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(kind) = self.fail {
                return Err(kind);
            }
            if address != self.address {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }

            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.writes += 1;
                        if let Some((&pointer, data)) = bytes.split_first() {
                            self.pointer = pointer;
                            if pointer == reg::CONFIG {
                                if let Some(&value) = data.first() {
                                    self.config = value;
                                }
                            }
                        }
                    }
                    Operation::Read(buf) => match self.pointer {
                        reg::TEMPERATURE => {
                            for (dst, src) in buf.iter_mut().zip(self.temperature) {
                                *dst = src;
                            }
                        }
                        reg::CONFIG => {
                            if let Some(first) = buf.first_mut() {
                                *first = self.config;
                            }
                        }
                        _ => return Err(ErrorKind::Other),
                    },
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_configure_sets_resolution_and_keeps_other_bits() {
        let mut bus = FakeBus::new(0x4A);
        let mut sensor = Tmp100::new(0x4A, Resolution::Bits12);

        block_on(sensor.configure(&mut bus)).unwrap();
        assert_eq!(bus.config, 0x65);
        assert_eq!(sensor.config(), 0x65);

        let mut sensor = Tmp100::new(0x4A, Resolution::Bits9);
        block_on(sensor.configure(&mut bus)).unwrap();
        assert_eq!(bus.config, 0x05);
    }

    #[test]
    fn test_read_positive_and_negative() {
        let mut bus = FakeBus::new(0x4A);
        let mut sensor = Tmp100::new(0x4A, Resolution::Bits12);

        // 25.0625 °C = 0x191 << 4
        bus.temperature = [0x19, 0x10];
        assert_eq!(block_on(sensor.read(&mut bus)), Ok(25.0625));

        // -0.25 °C = 0xFFC << 4
        bus.temperature = [0xFF, 0xC0];
        assert_eq!(block_on(sensor.read(&mut bus)), Ok(-0.25));

        // -55 °C = 0xC90 << 4
        bus.temperature = [0xC9, 0x00];
        assert_eq!(block_on(sensor.read(&mut bus)), Ok(-55.0));
        assert_eq!(sensor.temperature_c(), -55.0);
    }

    #[test]
    fn test_initialize_selects_temperature_register() {
        let mut bus = FakeBus::new(0x4A);
        bus.pointer = reg::CONFIG;
        let mut sensor = Tmp100::new(0x4A, Resolution::Bits12);

        block_on(sensor.initialize(&mut bus)).unwrap();
        assert_eq!(bus.pointer, reg::TEMPERATURE);
        assert_eq!(bus.writes, 1);
    }

    #[test]
    fn test_execute_maps_errors_to_status() {
        let mut bus = FakeBus::new(0x48);
        let mut sensor = Tmp100::new(0x4A, Resolution::Bits12);

        assert_eq!(
            block_on(sensor.execute(&mut bus, Transaction::Initialize)),
            TransactionStatus::AddressNack
        );

        bus.address = 0x4A;
        assert_eq!(
            block_on(sensor.execute(&mut bus, Transaction::Configure)),
            TransactionStatus::Success
        );

        bus.fail = Some(ErrorKind::ArbitrationLoss);
        assert_eq!(
            block_on(sensor.execute(&mut bus, Transaction::Read)),
            TransactionStatus::ArbitrationLost
        );
    }

    #[test]
    fn test_failed_read_keeps_previous_value() {
        let mut bus = FakeBus::new(0x4A);
        let mut sensor = Tmp100::new(0x4A, Resolution::Bits12);

        bus.temperature = [0x17, 0xB0]; // 23.6875 °C
        block_on(sensor.read(&mut bus)).unwrap();

        bus.fail = Some(ErrorKind::Bus);
        assert_eq!(
            block_on(sensor.execute(&mut bus, Transaction::Read)),
            TransactionStatus::BusError
        );
        assert_eq!(sensor.temperature_c(), 23.6875);
    }

    #[test]
    fn test_status_from_kind() {
        assert_eq!(
            status_from_kind(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
            TransactionStatus::DataNack
        );
        assert_eq!(status_from_kind(ErrorKind::Overrun), TransactionStatus::Overrun);
        assert_eq!(status_from_kind(ErrorKind::Other), TransactionStatus::Other);
        assert_eq!(Resolution::from_bits(8), None);
    }
}
