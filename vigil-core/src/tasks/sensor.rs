//! Sensor producer task
//!
//! Brings the sensor up with one initialise and one configure transaction,
//! then reads and publishes the temperature once per period. Every
//! transaction goes through a [`HardwareCall`], so the task body stays
//! straight-line code.

use crate::bridge::{Completion, ErrorPolicy, HardwareCall, Transaction};
use crate::channel::LatestValue;
use crate::scheduler::{Context, Fault, Task};

/// Sensor bring-up phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorPhase {
    /// Initialise transaction not yet run
    Initialize,
    /// Configure transaction not yet run
    Configure,
    /// Periodic reads
    Sampling,
}

/// Sensor producer task
pub struct SensorTask<'c, H> {
    hardware: H,
    channel: &'c LatestValue<f32>,
    policy: ErrorPolicy,
    phase: SensorPhase,
    last_error: Option<Completion>,
    samples: u32,
}

impl<'c, H: HardwareCall> SensorTask<'c, H> {
    /// Create a sensor task publishing to `channel`
    pub fn new(hardware: H, channel: &'c LatestValue<f32>, policy: ErrorPolicy) -> Self {
        Self {
            hardware,
            channel,
            policy,
            phase: SensorPhase::Initialize,
            last_error: None,
            samples: 0,
        }
    }

    /// Current bring-up phase
    pub fn phase(&self) -> SensorPhase {
        self.phase
    }

    /// Most recent transaction that did not succeed
    pub fn last_error(&self) -> Option<Completion> {
        self.last_error
    }

    /// Number of readings published
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Run one transaction and apply the error policy
    ///
    /// Returns `false` if the task faulted and must stop this activation.
    fn transact(&mut self, transaction: Transaction, cx: &mut Context<'_>) -> bool {
        let completion = self.hardware.call(transaction);
        if completion.status.is_success() {
            return true;
        }

        self.last_error = Some(completion);
        match self.policy {
            ErrorPolicy::Record => true,
            ErrorPolicy::Abort => {
                cx.fault(Fault::Hardware {
                    transaction: completion.transaction,
                    status: completion.status,
                });
                false
            }
        }
    }
}

impl<H: HardwareCall> Task for SensorTask<'_, H> {
    fn run(&mut self, cx: &mut Context<'_>) {
        if self.phase == SensorPhase::Initialize {
            if !self.transact(Transaction::Initialize, cx) {
                return;
            }
            self.phase = SensorPhase::Configure;
        }

        if self.phase == SensorPhase::Configure {
            if !self.transact(Transaction::Configure, cx) {
                return;
            }
            self.phase = SensorPhase::Sampling;
        }

        if !self.transact(Transaction::Read, cx) {
            return;
        }
        self.channel.publish(self.hardware.temperature_c());
        self.samples = self.samples.wrapping_add(1);

        cx.delay_period();
    }
}
