use thiserror::Error;

/// Errors surfaced to callers of `execute_now`.
///
/// The scheduling loop itself never raises these; it re-queues instead.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("unknown work type: {0}")]
    UnknownWorkType(String),

    #[error("dependencies not met for {work_id}: missing {missing:?}")]
    DependenciesNotMet { work_id: String, missing: Vec<String> },
}
