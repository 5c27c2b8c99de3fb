//! Exit codes for the `beacon` CLI.
//!
//! Ranges:
//! - 0-9: operational outcomes (the run itself completed)
//! - 10-19: user or environment errors (fixable by the operator)
//! - 20-29: internal errors

/// Stable exit codes. Scripts and supervisors key off these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Everything delivered, or nothing to do.
    Clean = 0,

    /// Run finished but some batches were permanently rejected and dropped.
    Partial = 1,

    /// Invalid command-line arguments.
    ArgsError = 10,

    /// Configuration missing, malformed or invalid.
    ConfigError = 11,

    /// Another drain owns the journal (processing file present).
    LockError = 14,

    /// A batch could not be delivered; remaining lines were requeued.
    DeliveryFailed = 15,

    /// Internal error (bug).
    InternalError = 20,

    /// Filesystem error.
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes below 10 report how the run went rather than a failure to run.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Symbolic name for JSON output.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Partial => "OK_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::LockError => "ERR_LOCK",
            ExitCode::DeliveryFailed => "ERR_DELIVERY",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
