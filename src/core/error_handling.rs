//! Error reporting shared by the CLI and the coordinator

/// Errors that can tell user-actionable failures from system failures
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error contains a specific, user-actionable message
    /// that should be displayed directly to the user
    ///
    /// Configuration mistakes and conflicting ownership notifications are
    /// user-actionable; consumer failures and lock poisoning are not.
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    ///
    /// This should return Some(message) when is_user_actionable() returns true,
    /// and None otherwise. The message should be clear, concise, and actionable.
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// User-actionable errors log their own message; anything else logs
/// `operation_context`. Full details always go to debug level.
///
/// ```rust,no_run
/// # use queuestate::core::error_handling::log_error_with_context;
/// # use queuestate::app::cli::config::ConfigError;
/// let error = ConfigError::Invalid {
///     message: "event_topic must not be empty".to_string(),
/// };
/// log_error_with_context(&error, "Loading configuration");
/// // Logs: "FATAL: event_topic must not be empty"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    if error.is_user_actionable() {
        if let Some(user_msg) = error.user_message() {
            log::error!("FATAL: {}", user_msg);
        } else {
            log::error!("FATAL: {}", operation_context);
        }
    } else {
        log::error!("FATAL: {}", operation_context);
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
