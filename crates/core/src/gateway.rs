//! Execution gateway for the external container CLI
//!
//! The gateway runs the configured binary with a prepared argument vector
//! and reports every outcome as an [`OperationResult`]. It never goes through
//! a shell, never retries, and never returns an error type of its own:
//! spawn failures, timeouts, oversized output, non-zero exits and JSON decode
//! failures all arrive as `success == false` with a human-readable message
//! and an exit code.
//!
//! Each invocation is logged under this module's tracing target before the
//! result is returned, together with the captured stderr if there was any.

use crate::args;
use crate::config::ConfigHolder;
use crate::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Exit code reported when the execution bound is exceeded
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a failure carries no process exit code
pub const UNKNOWN_EXIT_CODE: i32 = 1;

/// Message used when an otherwise successful process printed invalid JSON
pub const JSON_PARSE_ERROR: &str = "failed to parse JSON output";

/// Classification of a failed [`OperationResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    BinaryNotFound,
    Timeout {
        #[serde(rename = "afterMs")]
        after_ms: u64,
    },
    NonZeroExit,
    OutputTooLarge,
    OutputParse,
}

/// Uniform outcome envelope of every gateway call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    /// Present on success, and on a JSON decode failure as the raw text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            exit_code: 0,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, error: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            exit_code,
            failure: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Transform the payload, keeping failure details untouched
    pub fn map<U, F>(self, f: F) -> OperationResult<U>
    where
        F: FnOnce(T) -> U,
    {
        OperationResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            exit_code: self.exit_code,
            failure: self.failure,
        }
    }

    /// Drop the payload of a failed result, e.g. to change its type
    pub fn discard<U>(self) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            data: None,
            error: self.error,
            exit_code: self.exit_code,
            failure: self.failure,
        }
    }

    /// Convert into a `Result` for callers that prefer `?`
    pub fn into_result(self) -> Result<T, GatewayError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => {
                let message = self
                    .error
                    .unwrap_or_else(|| "operation produced no data".to_string());
                Err(match self.failure {
                    Some(FailureKind::BinaryNotFound) => GatewayError::BinaryNotFound { message },
                    Some(FailureKind::Timeout { after_ms }) => GatewayError::Timeout { after_ms },
                    Some(FailureKind::OutputTooLarge) => GatewayError::OutputTooLarge { message },
                    Some(FailureKind::OutputParse) | None => GatewayError::OutputParse { message },
                    Some(FailureKind::NonZeroExit) => GatewayError::NonZeroExit {
                        code: self.exit_code,
                        message,
                    },
                })
            }
        }
    }
}

/// Process stdout as delivered to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Text(String),
    Json(Value),
}

impl Output {
    /// JSON payload; raw text becomes a JSON string
    pub fn into_json(self) -> Value {
        match self {
            Output::Json(value) => value,
            Output::Text(text) => Value::String(text),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Output::Text(text) => text,
            Output::Json(value) => value.to_string(),
        }
    }
}

/// Seam between operation composition and process execution
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run the CLI with `args`, decoding stdout as JSON when `parse_json` is set
    async fn execute(&self, args: &[String], parse_json: bool) -> OperationResult<Output>;
}

/// Decode CLI stdout as JSON.
///
/// Whitespace-only output decodes as `null`. Output holding several
/// whitespace-separated JSON documents (one object per line, as some engines
/// print lists) decodes as an array of them.
pub fn decode_json(stdout: &str) -> Result<Value, serde_json::Error> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            let values: Result<Vec<Value>, _> = serde_json::Deserializer::from_str(trimmed)
                .into_iter::<Value>()
                .collect();
            match values {
                Ok(values) if values.len() > 1 => Ok(Value::Array(values)),
                _ => Err(first_error),
            }
        }
    }
}

#[derive(Debug)]
struct RawOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[derive(Debug)]
enum ProcessFailure {
    Spawn(std::io::Error),
    Io(std::io::Error),
    Timeout,
    TooLarge,
}

#[derive(Debug)]
enum StreamError {
    Io(std::io::Error),
    Overflow,
}

async fn read_bounded<R>(reader: Option<R>, limit: usize) -> Result<Vec<u8>, StreamError>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buffer = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buffer)
        .await
        .map_err(StreamError::Io)?;
    if buffer.len() > limit {
        return Err(StreamError::Overflow);
    }
    Ok(buffer)
}

async fn run_process(
    binary: &str,
    args: &[String],
    timeout: Duration,
    limit: usize,
) -> Result<RawOutput, ProcessFailure> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ProcessFailure::Spawn)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let work = async {
        let (stdout, stderr) =
            tokio::try_join!(read_bounded(stdout, limit), read_bounded(stderr, limit))?;
        let status = child.wait().await.map_err(StreamError::Io)?;
        Ok::<_, StreamError>(RawOutput {
            status,
            stdout,
            stderr,
        })
    };
    let outcome = tokio::time::timeout(timeout, work).await;

    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(StreamError::Io(e))) => Err(ProcessFailure::Io(e)),
        Ok(Err(StreamError::Overflow)) => {
            let _ = child.start_kill();
            Err(ProcessFailure::TooLarge)
        }
        Err(_) => {
            let _ = child.start_kill();
            Err(ProcessFailure::Timeout)
        }
    }
}

/// Gateway that runs the binary named by the current settings
#[derive(Debug, Clone)]
pub struct CliGateway {
    config: ConfigHolder,
}

impl CliGateway {
    pub fn new(config: ConfigHolder) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfigHolder {
        &self.config
    }
}

#[async_trait]
impl Executor for CliGateway {
    #[instrument(skip(self, args), fields(subcommand = args.first().map(String::as_str).unwrap_or("")))]
    async fn execute(&self, args: &[String], parse_json: bool) -> OperationResult<Output> {
        let config = self.config.current();
        let binary = config.binary_path.as_str();
        let command_line =
            shell_words::join(std::iter::once(binary).chain(args.iter().map(String::as_str)));
        debug!(command = %command_line, "Executing container CLI");

        let outcome = run_process(
            binary,
            args,
            config.command_timeout(),
            config.max_output_bytes,
        )
        .await;

        let output = match outcome {
            Ok(output) => output,
            Err(ProcessFailure::Spawn(e)) => {
                let message = format!("failed to start '{}': {}", binary, e);
                warn!(command = %command_line, "{}", message);
                return OperationResult::failed(
                    FailureKind::BinaryNotFound,
                    message,
                    UNKNOWN_EXIT_CODE,
                );
            }
            Err(ProcessFailure::Io(e)) => {
                let message = format!("failed to read output of '{}': {}", binary, e);
                warn!(command = %command_line, "{}", message);
                return OperationResult::failed(FailureKind::NonZeroExit, message, UNKNOWN_EXIT_CODE);
            }
            Err(ProcessFailure::Timeout) => {
                let message = format!("command timed out after {} ms", config.command_timeout_ms);
                warn!(command = %command_line, "{}", message);
                return OperationResult::failed(
                    FailureKind::Timeout {
                        after_ms: config.command_timeout_ms,
                    },
                    message,
                    TIMEOUT_EXIT_CODE,
                );
            }
            Err(ProcessFailure::TooLarge) => {
                let message = format!(
                    "output exceeded maximum buffer size of {} bytes",
                    config.max_output_bytes
                );
                warn!(command = %command_line, "{}", message);
                return OperationResult::failed(
                    FailureKind::OutputTooLarge,
                    message,
                    UNKNOWN_EXIT_CODE,
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(UNKNOWN_EXIT_CODE);
            warn!(command = %command_line, exit_code, stderr = %stderr, "Container CLI failed");
            let message = if stderr.is_empty() {
                format!("command failed: {}", output.status)
            } else {
                stderr
            };
            return OperationResult::failed(FailureKind::NonZeroExit, message, exit_code);
        }

        if !stderr.is_empty() {
            debug!(command = %command_line, stderr = %stderr, "Container CLI stderr");
        }

        if !parse_json {
            return OperationResult::ok(Output::Text(stdout));
        }

        match decode_json(&stdout) {
            Ok(value) => OperationResult::ok(Output::Json(value)),
            Err(e) => {
                warn!(command = %command_line, error = %e, "{}", JSON_PARSE_ERROR);
                OperationResult {
                    success: false,
                    data: Some(Output::Text(stdout)),
                    error: Some(JSON_PARSE_ERROR.to_string()),
                    exit_code: 0,
                    failure: Some(FailureKind::OutputParse),
                }
            }
        }
    }
}

/// Availability of the configured binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BinaryStatus {
    Available { version: String },
    Unavailable { reason: String },
}

impl BinaryStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, BinaryStatus::Available { .. })
    }
}

/// Probe the binary with `--version`. Absence is a degraded-mode signal, not an error.
pub async fn probe_binary(executor: &dyn Executor) -> BinaryStatus {
    let result = executor.execute(&args::version(), false).await;
    if result.success {
        let version = result
            .data
            .map(Output::into_text)
            .unwrap_or_default()
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        debug!(%version, "Container CLI available");
        BinaryStatus::Available { version }
    } else {
        let reason = result
            .error
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(%reason, "Container CLI unavailable");
        BinaryStatus::Unavailable { reason }
    }
}

pub mod mock {
    //! Scripted executor for exercising callers without a real engine
    //!
    //! Responses are matched by argument prefix; the most recently registered
    //! matching response wins. Every call is recorded, and a response can be
    //! delayed to create overlapping in-flight invocations.

    use super::{Executor, FailureKind, OperationResult, Output};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::debug;

    #[derive(Debug, Clone)]
    pub struct MockResponse {
        pub result: OperationResult<Output>,
        pub delay: Option<Duration>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        responses: Vec<(Vec<String>, MockResponse)>,
        calls: Vec<Vec<String>>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct MockExecutor {
        state: Arc<Mutex<MockState>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, prefix: &[&str], result: OperationResult<Output>) {
            self.respond_with(
                prefix,
                MockResponse {
                    result,
                    delay: None,
                },
            );
        }

        pub fn respond_json(&self, prefix: &[&str], value: Value) {
            self.respond(prefix, OperationResult::ok(Output::Json(value)));
        }

        pub fn respond_text(&self, prefix: &[&str], text: &str) {
            self.respond(prefix, OperationResult::ok(Output::Text(text.to_string())));
        }

        pub fn respond_failure(&self, prefix: &[&str], error: &str, exit_code: i32) {
            self.respond(
                prefix,
                OperationResult::failed(FailureKind::NonZeroExit, error, exit_code),
            );
        }

        pub fn respond_after(&self, prefix: &[&str], delay: Duration, result: OperationResult<Output>) {
            self.respond_with(
                prefix,
                MockResponse {
                    result,
                    delay: Some(delay),
                },
            );
        }

        pub fn respond_with(&self, prefix: &[&str], response: MockResponse) {
            let prefix = prefix.iter().map(|s| s.to_string()).collect();
            self.state
                .lock()
                .unwrap()
                .responses
                .push((prefix, response));
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.state.lock().unwrap().calls.clone()
        }

        /// Number of recorded calls whose argv starts with `prefix`
        pub fn call_count(&self, prefix: &[&str]) -> usize {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|call| starts_with(call, prefix))
                .count()
        }

        pub fn clear_calls(&self) {
            self.state.lock().unwrap().calls.clear();
        }
    }

    fn starts_with<S: AsRef<str>>(call: &[String], prefix: &[S]) -> bool {
        call.len() >= prefix.len()
            && call
                .iter()
                .zip(prefix.iter())
                .all(|(a, b)| a == b.as_ref())
    }

    #[async_trait]
    impl Executor for MockExecutor {
        async fn execute(&self, args: &[String], _parse_json: bool) -> OperationResult<Output> {
            let response = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(args.to_vec());
                state
                    .responses
                    .iter()
                    .rev()
                    .find(|(prefix, _)| starts_with(args, prefix.as_slice()))
                    .map(|(_, response)| response.clone())
            };
            debug!(?args, matched = response.is_some(), "MockExecutor called");

            match response {
                Some(response) => {
                    if let Some(delay) = response.delay {
                        tokio::time::sleep(delay).await;
                    }
                    response.result
                }
                None => OperationResult::failed(
                    FailureKind::NonZeroExit,
                    format!("no mock response for {:?}", args),
                    1,
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_json_array() {
        let value = decode_json("[{\"id\":\"a\"},{\"id\":\"b\"}]").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_decode_json_lines() {
        let value = decode_json("{\"ID\":\"a\"}\n{\"ID\":\"b\"}\n").unwrap();
        assert_eq!(value, json!([{"ID": "a"}, {"ID": "b"}]));
    }

    #[test]
    fn test_decode_json_empty_is_null() {
        assert_eq!(decode_json("  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_decode_json_garbage() {
        assert!(decode_json("Error: something went wrong").is_err());
        assert!(decode_json("{\"a\":1}\nnot json").is_err());
    }

    #[test]
    fn test_operation_result_map_and_into_result() {
        let result = OperationResult::ok(2).map(|n| n * 21);
        assert_eq!(result.into_result().unwrap(), 42);

        let failed: OperationResult<i32> =
            OperationResult::failed(FailureKind::NonZeroExit, "boom", 125);
        assert_eq!(
            failed.into_result(),
            Err(GatewayError::NonZeroExit {
                code: 125,
                message: "boom".to_string()
            })
        );

        let timed_out: OperationResult<i32> = OperationResult::failed(
            FailureKind::Timeout { after_ms: 250 },
            "timed out waiting for the engine",
            TIMEOUT_EXIT_CODE,
        );
        assert_eq!(
            timed_out.into_result(),
            Err(GatewayError::Timeout { after_ms: 250 })
        );
    }

    #[test]
    fn test_operation_result_serializes_camel_case() {
        let failed: OperationResult<String> =
            OperationResult::failed(FailureKind::OutputParse, JSON_PARSE_ERROR, 0);
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["exitCode"], 0);
        assert_eq!(value["success"], false);
        assert_eq!(value["failure"], "outputParse");
        assert!(value.get("data").is_none());

        let timed_out: OperationResult<String> =
            OperationResult::failed(FailureKind::Timeout { after_ms: 250 }, "timed out", TIMEOUT_EXIT_CODE);
        let value = serde_json::to_value(&timed_out).unwrap();
        assert_eq!(value["failure"]["timeout"]["afterMs"], 250);
    }

    #[tokio::test]
    async fn test_mock_executor_prefix_matching() {
        let mock = mock::MockExecutor::new();
        mock.respond_json(&["image", "list"], json!([]));
        mock.respond_text(&["--version"], "Docker version 27.0.1\n");

        let result = mock
            .execute(&["image".to_string(), "list".to_string()], true)
            .await;
        assert!(result.success);
        assert_eq!(mock.call_count(&["image"]), 1);

        let unmatched = mock.execute(&["volume".to_string()], true).await;
        assert!(!unmatched.success);
        assert_eq!(unmatched.exit_code, 1);
    }

    #[tokio::test]
    async fn test_probe_reports_first_version_line() {
        let mock = mock::MockExecutor::new();
        mock.respond_text(&["--version"], "container CLI version 0.4.1\nbuild abc\n");
        let status = probe_binary(&mock).await;
        assert_eq!(
            status,
            BinaryStatus::Available {
                version: "container CLI version 0.4.1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_probe_unavailable_is_not_an_error() {
        let mock = mock::MockExecutor::new();
        mock.respond(
            &["--version"],
            OperationResult::failed(FailureKind::BinaryNotFound, "failed to start 'nope'", 1),
        );
        let status = probe_binary(&mock).await;
        assert!(!status.is_available());
    }
}
