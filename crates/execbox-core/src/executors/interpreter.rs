//! Classification of captured sandbox output.

use serde_json::{Map, Value};

use super::{ExecutionResult, EXIT_CODE_KILLED, STATUS_FAILED, STATUS_OK, STATUS_TIMEOUT};

pub const EXECUTION_FAILED_MESSAGE: &str = "Code execution failed";
pub const TIMEOUT_MESSAGE: &str = "Execution timeout exceeded";

/// Build a result from raw output and the sandbox exit code. `duration_ms` is
/// left at zero for the caller to fill in.
pub fn interpret(raw_output: String, exit_code: i64) -> ExecutionResult {
    let (status_code, error) = if exit_code == 0 {
        (STATUS_OK, String::new())
    } else {
        (STATUS_FAILED, EXECUTION_FAILED_MESSAGE.to_string())
    };
    let structured_result = parse_structured(&raw_output);

    ExecutionResult {
        output: raw_output,
        error,
        status_code,
        duration_ms: 0,
        exit_code,
        structured_result,
    }
}

/// Result for a sandbox killed at its deadline. Output is not collected.
pub fn timeout_result() -> ExecutionResult {
    ExecutionResult {
        output: String::new(),
        error: TIMEOUT_MESSAGE.to_string(),
        status_code: STATUS_TIMEOUT,
        duration_ms: 0,
        exit_code: EXIT_CODE_KILLED,
        structured_result: None,
    }
}

/// Best effort: a whole-output JSON object, or nothing.
pub fn parse_structured(raw_output: &str) -> Option<Map<String, Value>> {
    let trimmed = raw_output.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }
    match serde_json::from_str::<Map<String, Value>>(trimmed) {
        Ok(object) => Some(object),
        Err(e) => {
            log::debug!("Output looked like JSON but did not parse: {}", e);
            None
        }
    }
}
