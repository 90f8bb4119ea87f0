use std::fmt;

/// Marker error for diagnostics that were already written to the terminal
/// by the command itself. `main` exits non-zero without printing again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandledError;

impl fmt::Display for HandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error already reported")
    }
}

impl std::error::Error for HandledError {}

/// Print a user-facing diagnostic and convert it into the marker.
pub fn report(message: &str) -> Box<dyn std::error::Error> {
    crate::output::error_stderr(message);
    Box::new(HandledError)
}

/// True when the error is the already-printed marker.
pub fn is_handled(err: &(dyn std::error::Error + 'static)) -> bool {
    err.downcast_ref::<HandledError>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_produces_handled_marker() {
        let err = report("something went wrong");
        assert!(is_handled(err.as_ref()));
    }

    #[test]
    fn foreign_errors_are_not_handled() {
        let err: Box<dyn std::error::Error> =
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "io"));
        assert!(!is_handled(err.as_ref()));
    }
}
