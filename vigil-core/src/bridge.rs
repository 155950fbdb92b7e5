//! Completion bridge
//!
//! Turns an interrupt-delivered "transaction finished" notification into
//! something straight-line task code can wait on.
//!
//! The task side calls [`CompletionBridge::issue`], starts the hardware
//! operation, then [`CompletionBridge::await_completion`]. The interrupt
//! side calls [`CompletionBridge::on_hardware_event`] exactly once per
//! issued transaction. Each field has a single writer: the issuing task
//! owns `Idle`/`Issued` and the done-flag reset, the interrupt path owns
//! `Completed`, the status and the done-flag set. No lock is taken.
//!
//! Waiting is a busy-wait on the caller's own timeslice, not a scheduler
//! block. The wait itself is behind [`WaitStrategy`] so it can be replaced
//! without touching callers.

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::traits::SensorDriver;

/// Hardware operation carried by a pending transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transaction {
    /// One-time sensor initialisation
    Initialize,
    /// One-time sensor configuration
    Configure,
    /// Single temperature read
    Read,
}

impl Transaction {
    fn to_byte(self) -> u8 {
        match self {
            Transaction::Initialize => 0,
            Transaction::Configure => 1,
            Transaction::Read => 2,
        }
    }

    fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Transaction::Initialize,
            1 => Transaction::Configure,
            _ => Transaction::Read,
        }
    }
}

/// Completion code delivered with a hardware event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransactionStatus {
    /// Transaction completed normally
    Success,
    /// Device did not acknowledge its address
    AddressNack,
    /// Device did not acknowledge a data byte
    DataNack,
    /// Lost bus arbitration
    ArbitrationLost,
    /// Bus-level error (misplaced start/stop)
    BusError,
    /// Receive overrun
    Overrun,
    /// Any other controller error
    Other,
}

impl TransactionStatus {
    /// Whether the transaction succeeded
    pub fn is_success(self) -> bool {
        self == TransactionStatus::Success
    }

    /// Encode as a status byte
    pub fn to_byte(self) -> u8 {
        match self {
            TransactionStatus::Success => 0,
            TransactionStatus::AddressNack => 1,
            TransactionStatus::DataNack => 2,
            TransactionStatus::ArbitrationLost => 3,
            TransactionStatus::BusError => 4,
            TransactionStatus::Overrun => 5,
            TransactionStatus::Other => 6,
        }
    }

    /// Decode a status byte (unknown codes map to `Other`)
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => TransactionStatus::Success,
            1 => TransactionStatus::AddressNack,
            2 => TransactionStatus::DataNack,
            3 => TransactionStatus::ArbitrationLost,
            4 => TransactionStatus::BusError,
            5 => TransactionStatus::Overrun,
            _ => TransactionStatus::Other,
        }
    }
}

/// Lifecycle of the bridge's single pending transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingState {
    /// Nothing outstanding
    Idle,
    /// Started by a task, hardware not finished yet
    Issued,
    /// Hardware finished, not yet consumed by the task
    Completed,
}

const STATE_IDLE: u8 = 0;
const STATE_ISSUED: u8 = 1;
const STATE_COMPLETED: u8 = 2;

/// What to do when a transaction completes with a non-success status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorPolicy {
    /// Record the status and carry on with the next step
    #[default]
    Record,
    /// Report a fault, which halts the node
    Abort,
}

/// Result of a finished transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    /// Which operation finished
    pub transaction: Transaction,
    /// Status reported by the hardware
    pub status: TransactionStatus,
}

/// Callback run in interrupt context when a transaction completes
pub type CompletionCallback = fn(Transaction, TransactionStatus);

/// Bridge between one interrupt-driven driver and one issuing task
pub struct CompletionBridge {
    state: AtomicU8,
    transaction: AtomicU8,
    status: AtomicU8,
    done: AtomicBool,
    errors: AtomicU32,
    completions: AtomicU32,
    callback: Option<CompletionCallback>,
}

impl CompletionBridge {
    /// Create an idle bridge
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            transaction: AtomicU8::new(0),
            status: AtomicU8::new(0),
            done: AtomicBool::new(false),
            errors: AtomicU32::new(0),
            completions: AtomicU32::new(0),
            callback: None,
        }
    }

    /// Create an idle bridge that runs `callback` on every completion
    pub const fn with_callback(callback: CompletionCallback) -> Self {
        let mut bridge = Self::new();
        bridge.callback = Some(callback);
        bridge
    }

    /// Mark `transaction` as issued
    ///
    /// Called from task context right before the hardware operation is
    /// started, so a fast completion cannot be lost.
    pub fn issue(&self, transaction: Transaction) {
        self.done.store(false, Ordering::Release);
        self.transaction
            .store(transaction.to_byte(), Ordering::Relaxed);
        self.state.store(STATE_ISSUED, Ordering::Release);
    }

    /// Deliver a hardware completion
    ///
    /// Called from interrupt (or other asynchronous) context. Returns
    /// `false` if nothing was issued, in which case the event is ignored.
    pub fn on_hardware_event(&self, status: TransactionStatus) -> bool {
        if self
            .state
            .compare_exchange(
                STATE_ISSUED,
                STATE_COMPLETED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        self.status.store(status.to_byte(), Ordering::Relaxed);
        self.completions.fetch_add(1, Ordering::Relaxed);
        if !status.is_success() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(callback) = self.callback {
            callback(self.issued_transaction(), status);
        }

        self.done.store(true, Ordering::Release);
        true
    }

    /// Spin until the issued transaction completes, then consume it
    ///
    /// Returns promptly once [`on_hardware_event`](Self::on_hardware_event)
    /// has run; the bridge is idle again afterwards.
    pub fn await_completion<W: WaitStrategy>(&self, wait: &mut W) -> Completion {
        while !self.done.load(Ordering::Acquire) {
            wait.pause();
        }

        let completion = Completion {
            transaction: self.issued_transaction(),
            status: TransactionStatus::from_byte(self.status.load(Ordering::Relaxed)),
        };

        self.done.store(false, Ordering::Relaxed);
        self.state.store(STATE_IDLE, Ordering::Release);
        completion
    }

    /// Whether the done flag is currently set
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Current pending-transaction state
    pub fn state(&self) -> PendingState {
        match self.state.load(Ordering::Acquire) {
            STATE_ISSUED => PendingState::Issued,
            STATE_COMPLETED => PendingState::Completed,
            _ => PendingState::Idle,
        }
    }

    /// Status of the most recent completion
    pub fn last_status(&self) -> Option<TransactionStatus> {
        if self.completions.load(Ordering::Relaxed) == 0 {
            None
        } else {
            Some(TransactionStatus::from_byte(
                self.status.load(Ordering::Relaxed),
            ))
        }
    }

    /// Number of completions that carried a non-success status
    pub fn error_count(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Number of completions delivered so far
    pub fn completion_count(&self) -> u32 {
        self.completions.load(Ordering::Relaxed)
    }

    fn issued_transaction(&self) -> Transaction {
        Transaction::from_byte(self.transaction.load(Ordering::Relaxed))
    }
}

impl Default for CompletionBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// How a task passes time while a transaction is outstanding
pub trait WaitStrategy {
    /// Called once per failed check of the done flag
    fn pause(&mut self);
}

/// Busy-wait on the calling task's timeslice
#[derive(Debug, Default, Clone, Copy)]
pub struct Spin;

impl WaitStrategy for Spin {
    fn pause(&mut self) {
        core::hint::spin_loop();
    }
}

/// A blocking hardware call as seen from task code
///
/// Task bodies only depend on this trait, so the busy-wait underneath can
/// later become a real scheduler-level block.
pub trait HardwareCall {
    /// Run `transaction` to completion
    fn call(&mut self, transaction: Transaction) -> Completion;

    /// Latest temperature held by the driver, in degrees Celsius
    fn temperature_c(&self) -> f32;
}

/// [`HardwareCall`] built from a callback-style driver and a bridge
pub struct Bridged<'b, D, W = Spin> {
    driver: D,
    bridge: &'b CompletionBridge,
    wait: W,
}

impl<'b, D: SensorDriver> Bridged<'b, D, Spin> {
    /// Bridge `driver` with the default busy-wait
    pub fn new(driver: D, bridge: &'b CompletionBridge) -> Self {
        Self::with_wait(driver, bridge, Spin)
    }
}

impl<'b, D: SensorDriver, W: WaitStrategy> Bridged<'b, D, W> {
    /// Bridge `driver` with a custom wait strategy
    pub fn with_wait(driver: D, bridge: &'b CompletionBridge, wait: W) -> Self {
        Self {
            driver,
            bridge,
            wait,
        }
    }

    /// Access the wrapped driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The bridge completions arrive on
    pub fn bridge(&self) -> &CompletionBridge {
        self.bridge
    }
}

impl<D: SensorDriver, W: WaitStrategy> HardwareCall for Bridged<'_, D, W> {
    fn call(&mut self, transaction: Transaction) -> Completion {
        self.bridge.issue(transaction);
        match transaction {
            Transaction::Initialize => self.driver.initialize(),
            Transaction::Configure => self.driver.configure(),
            Transaction::Read => self.driver.request_read(),
        }
        self.bridge.await_completion(&mut self.wait)
    }

    fn temperature_c(&self) -> f32 {
        self.driver.temperature_c()
    }
}
