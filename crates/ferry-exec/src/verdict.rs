//! Success/failure decision shared by the remote and local executors

use crate::error::ExecError;

/// Terminal outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Stderr content was seen while `fail_on_stderr` was set
    StdErrPolicy,
    /// Process exited with a non-zero code
    NonZeroExit(u32),
}

impl Verdict {
    /// Decide the outcome of a finished command
    ///
    /// The stderr rule is checked before the exit code. A missing code is
    /// treated as zero, with or without a signal.
    #[must_use]
    pub fn decide(code: Option<u32>, stderr_written: bool, fail_on_stderr: bool) -> Self {
        if stderr_written && fail_on_stderr {
            return Verdict::StdErrPolicy;
        }

        match code {
            Some(code) if code != 0 => Verdict::NonZeroExit(code),
            _ => Verdict::Success,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }

    /// Convert into the result reported to callers
    ///
    /// # Errors
    /// Returns `StdErrPolicy` or `NonZeroExit` carrying `command`
    pub fn into_result(self, command: &str) -> Result<(), ExecError> {
        match self {
            Verdict::Success => Ok(()),
            Verdict::StdErrPolicy => Err(ExecError::StdErrPolicy {
                command: command.to_string(),
            }),
            Verdict::NonZeroExit(code) => Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code,
            }),
        }
    }
}

/// Whether a remote stderr chunk counts as output
///
/// Whitespace-only chunks are ignored.
#[must_use]
pub fn is_meaningful_stderr(chunk: &str) -> bool {
    !chunk.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_exit_succeeds() {
        assert_eq!(Verdict::decide(Some(0), false, true), Verdict::Success);
        assert_eq!(Verdict::decide(None, false, true), Verdict::Success);
    }

    #[test]
    fn test_stderr_takes_precedence_over_exit_code() {
        assert_eq!(Verdict::decide(Some(0), true, true), Verdict::StdErrPolicy);
        assert_eq!(Verdict::decide(Some(2), true, true), Verdict::StdErrPolicy);
    }

    #[test]
    fn test_stderr_ignored_when_allowed() {
        assert_eq!(Verdict::decide(Some(0), true, false), Verdict::Success);
        assert_eq!(Verdict::decide(Some(7), true, false), Verdict::NonZeroExit(7));
    }

    #[test]
    fn test_non_zero_exit_keeps_code() {
        for code in [1, 3, 127, 255] {
            assert_eq!(
                Verdict::decide(Some(code), false, true),
                Verdict::NonZeroExit(code)
            );
        }
    }

    #[test]
    fn test_into_result() {
        assert!(Verdict::Success.into_result("true").is_ok());

        let err = Verdict::NonZeroExit(3).into_result("exit 3").unwrap_err();
        assert_eq!(err.exit_code(), Some(3));

        let err = Verdict::StdErrPolicy.into_result("echo err 1>&2").unwrap_err();
        assert!(matches!(err, ExecError::StdErrPolicy { command } if command == "echo err 1>&2"));
    }

    #[test]
    fn test_meaningful_stderr() {
        assert!(is_meaningful_stderr("err\n"));
        assert!(!is_meaningful_stderr(""));
        assert!(!is_meaningful_stderr(" \n\t"));
    }
}
