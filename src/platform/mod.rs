pub mod client;
pub mod repair;
pub mod traits;

pub use client::{AtlasClient, PlatformError};
pub use repair::decode_with_repair;
pub use traits::{MeasurementSpec, ProbePlatform};
