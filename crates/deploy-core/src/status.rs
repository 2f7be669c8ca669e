//! Status codes returned by every operation. The binary exits with the code
//! of the operation it ran; raw exit codes of remote commands pass through.

pub const SUCCESS: i32 = 0;
/// Generic failure, e.g. a file that should exist after a copy does not
pub const FAILURE: i32 = 1;
/// The remote execution tool is not where it was configured to be
pub const TOOL_MISSING: i32 = 2;
/// A required directory or source file is absent
pub const PRECONDITION_MISSING: i32 = 5;
/// A local file operation raised an I/O error
pub const LOCAL_ERROR: i32 = -1;
/// A service did not reach the requested state within its retry budget
pub const RETRY_EXHAUSTED: i32 = -5;

/// Short human label for a status code.
pub fn describe(code: i32) -> &'static str {
    match code {
        SUCCESS => "success",
        FAILURE => "failure",
        TOOL_MISSING => "remote execution tool missing",
        PRECONDITION_MISSING => "precondition missing",
        LOCAL_ERROR => "local error",
        RETRY_EXHAUSTED => "retries exhausted",
        _ => "exit code",
    }
}
