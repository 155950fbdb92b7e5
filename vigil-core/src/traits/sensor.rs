//! Hardware sensor driver collaborator

/// Callback-style temperature sensor driver
///
/// Each operation only *starts* a bus transaction. Completion is reported
/// asynchronously (usually from interrupt context) through a
/// [`CompletionBridge`](crate::bridge::CompletionBridge).
pub trait SensorDriver {
    /// Start the one-time initialisation transaction
    fn initialize(&mut self);

    /// Start the one-time configuration transaction
    fn configure(&mut self);

    /// Start a temperature read
    fn request_read(&mut self);

    /// Temperature held from the last completed read, in degrees Celsius
    fn temperature_c(&self) -> f32;
}
