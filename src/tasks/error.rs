use std::fmt;
use std::sync::Arc;

/// Failure of a task invocation
///
/// `Clone` because a memoized failure is handed to every caller of the same task and
/// input.
#[derive(Debug, Clone)]
pub enum TaskError {
    /// The task body returned an error
    Failed(Arc<anyhow::Error>),
    /// The context was cancelled before or while the task ran
    Cancelled,
    /// A type-erased call supplied an input of the wrong type
    InputMismatch { expected: &'static str },
    /// The task body panicked
    Panicked(String),
    /// A fan-out coroutine could not be spawned
    Spawn(String),
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        TaskError::Panicked(msg)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Failed(e) => write!(f, "task failed: {e:#}"),
            TaskError::Cancelled => write!(f, "task context cancelled"),
            TaskError::InputMismatch { expected } => {
                write!(f, "task input type mismatch, expected {expected}")
            }
            TaskError::Panicked(msg) => write!(f, "task panicked: {msg}"),
            TaskError::Spawn(msg) => write!(f, "failed to spawn task coroutine: {msg}"),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Failed(e) => Some(&***e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(e: anyhow::Error) -> Self {
        // a TaskError that travelled through anyhow keeps its variant
        match e.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(e) => TaskError::Failed(Arc::new(e)),
        }
    }
}
