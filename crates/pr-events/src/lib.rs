pub mod bus;
pub mod types;

pub use crate::bus::ReviewBus;
pub use crate::types::EventRecord;
