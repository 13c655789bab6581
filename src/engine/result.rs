//! Transient execution result model.
//!
//! Produced by the run loop from whatever the unit of work returned (or
//! panicked with) and used to decide the next status transition. Never
//! persisted as-is: only the short message and diagnostic trace land on the
//! task record.

use serde_json::Value;
use std::any::Any;
use std::error::Error;

use crate::tasks::WorkError;

/// Short user-facing message plus the operator-facing diagnostic trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionInfo {
    pub message: String,
    pub trace: String,
}

impl ExceptionInfo {
    /// Capture a business failure, rendering the error chain as the trace.
    pub fn from_work_error(err: &WorkError) -> Self {
        let mut trace = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str(&format!("\ncaused by: {cause}"));
            source = cause.source();
        }
        if let WorkError::Failed {
            detail: Some(detail),
            ..
        } = err
        {
            trace.push_str(&format!("\ndetail: {detail}"));
        }
        Self {
            message: err.to_string(),
            trace,
        }
    }

    /// Capture a panic that escaped the unit of work.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string());
        Self {
            trace: format!("panic: {message}"),
            message,
        }
    }
}

/// Outcome of one `execute()` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub return_value: Option<Value>,
    pub is_timed_out: bool,
    pub exception_info: Option<ExceptionInfo>,
}

impl ExecutionResult {
    pub fn success(return_value: Option<Value>) -> Self {
        Self {
            return_value,
            is_timed_out: false,
            exception_info: None,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            return_value: None,
            is_timed_out: true,
            exception_info: None,
        }
    }

    pub fn errored(info: ExceptionInfo) -> Self {
        Self {
            return_value: None,
            is_timed_out: false,
            exception_info: Some(info),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.exception_info.is_some()
    }

    pub fn is_success(&self) -> bool {
        !self.is_errored() && !self.is_timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_flags() {
        assert!(ExecutionResult::success(Some(json!("ok"))).is_success());
        assert!(ExecutionResult::success(None).is_success());
        assert!(!ExecutionResult::timed_out().is_success());
        assert!(!ExecutionResult::timed_out().is_errored());

        let errored = ExecutionResult::errored(ExceptionInfo {
            message: "boom".to_string(),
            trace: "boom".to_string(),
        });
        assert!(errored.is_errored());
        assert!(!errored.is_success());
    }

    #[test]
    fn test_trace_includes_error_chain_and_detail() {
        let err = WorkError::Failed {
            message: "export rejected".to_string(),
            detail: Some(json!({ "service": "config" })),
            source: Some("HTTP 502".into()),
        };
        let info = ExceptionInfo::from_work_error(&err);
        assert_eq!(info.message, "export rejected");
        assert!(info.trace.contains("caused by: HTTP 502"));
        assert!(info.trace.contains("\"service\":\"config\""));
    }

    #[test]
    fn test_panic_payload_rendering() {
        let info = ExceptionInfo::from_panic(Box::new("kaboom"));
        assert_eq!(info.message, "kaboom");
        assert_eq!(info.trace, "panic: kaboom");

        let opaque = ExceptionInfo::from_panic(Box::new(42_u8));
        assert_eq!(opaque.message, "task panicked");
    }
}
