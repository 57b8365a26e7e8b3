//! Test Function Errors

use thiserror::Error;

/// Errors a test function can return.
///
/// The dispatcher classifies them: [`TestError::Interrupted`] aborts the
/// whole run, timeouts are ordinary failures, everything else aborts only
/// the test that raised it.
#[derive(Debug, Error)]
pub enum TestError {
    /// Operator requested cancellation while the test was running
    #[error("interrupted by operator")]
    Interrupted,

    /// The instrument or transport did not answer in time
    #[error("timeout: {0}")]
    Timeout(String),

    /// A context variable the test relies on is not bound
    #[error("missing context key: {0}")]
    MissingKey(String),

    /// A resource exists under the key but has another type
    #[error("resource `{key}` is not a {expected}")]
    Resource {
        /// Context key of the resource
        key: String,
        /// Expected type name
        expected: &'static str,
    },

    /// I/O error from a transport or the host
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure reported by the test itself
    #[error("{0}")]
    Failed(String),
}

impl TestError {
    /// Wrap any displayable error as a test failure
    pub fn failed(err: impl std::fmt::Display) -> Self {
        TestError::Failed(err.to_string())
    }

    /// Whether this error belongs to the instrument-timeout class
    pub fn is_timeout(&self) -> bool {
        match self {
            TestError::Timeout(_) => true,
            TestError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Whether this error is an operator interrupt
    pub fn is_interrupt(&self) -> bool {
        matches!(self, TestError::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(TestError::Timeout("CMD57 silent".into()).is_timeout());
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "serial read");
        assert!(TestError::from(io).is_timeout());
        assert!(!TestError::failed("boom").is_timeout());
        assert!(!TestError::Interrupted.is_timeout());
    }
}
