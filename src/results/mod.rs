pub mod normalize;
pub mod reduce;
pub mod types;

pub use normalize::normalize;
pub use reduce::reduce;
pub use types::{Observation, ProbeReading, TargetRecord, VantagePoint};
