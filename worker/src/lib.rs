pub mod counters;
pub mod error;
pub mod events;
pub mod gate;
pub mod processor;
pub mod progress;
pub mod registry;
pub mod types;

pub use error::ProcessorError;
pub use processor::Processor;
pub use registry::Registry;
pub use types::{MarketTiming, ProcessorConfig, WorkHandler, WorkItem, WorkType, queue_key};
