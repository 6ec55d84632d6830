pub mod mock;
pub mod types;

pub use mock::MockDriver;
pub use types::{AdcBurst, AdcConfig, AdcDriver, DriverEvent, DriverStatus};

/// Constructs the configured driver implementation. The hardware SDK itself
/// is out of scope for this crate, so only the mock backend is available;
/// a real deployment would match on a board identifier here and return a
/// hardware-backed `AdcDriver` instead.
pub fn create_driver() -> Box<dyn AdcDriver> {
    Box::new(MockDriver::new())
}
