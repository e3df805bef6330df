// MIT License - Copyright (c) 2026 Peter Wright
// Error types

/// All errors that can occur in the synthetic-alarm library.
///
/// Action and indicator failures are contained at the point of invocation:
/// command handlers log them and complete anyway, so they never surface to
/// the command caller. They appear here as the return type of
/// [`ActionInvoker`](crate::invoker::ActionInvoker) methods.
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("Unknown action: {action}")]
    ActionNotFound { action: String },

    #[error("Action {action} failed: {reason}")]
    ActionInvocation { action: String, reason: String },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, AlarmError>;
