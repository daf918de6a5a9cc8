//! Progress events and observer fan-out.

mod registry;
mod types;

pub use registry::ObserverRegistry;
pub use types::JobUpdate;
