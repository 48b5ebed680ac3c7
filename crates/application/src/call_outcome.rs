use matchdesk_core::{AppError, AppResult};

/// Failure policy applied to background backend reads.
///
/// `Degraded` keeps the session on cached data; `Invalidated` tears it down.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call succeeded.
    Completed(T),
    /// The call failed in a way the session can ride out.
    Degraded(AppError),
    /// The backend declared the session invalid.
    Invalidated(AppError),
}

impl<T> CallOutcome<T> {
    /// Classifies a result: authorization failures invalidate, everything else degrades.
    #[must_use]
    pub fn classify(result: AppResult<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(error) if error.is_unauthorized() => Self::Invalidated(error),
            Err(error) => Self::Degraded(error),
        }
    }

    /// Classifies a result whose failures never invalidate the session.
    #[must_use]
    pub fn tolerant(result: AppResult<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(error) => Self::Degraded(error),
        }
    }
}
