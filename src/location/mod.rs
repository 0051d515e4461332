mod classifier;
mod error;
mod record;
mod sample;

pub use classifier::{Classification, MovementPolicy};
pub use error::FrameError;
pub use record::{EventType, LocationRecord, NewLocationRecord};
pub use sample::LocationSample;

pub type ReporterId = u64;
pub type TenantId = u64;
pub type VehicleId = u64;
pub type SequenceId = u64;
