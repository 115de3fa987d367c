use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

pub const GPU_ADAPTER_UNAVAILABLE: &str = "GPU_ADAPTER_UNAVAILABLE";
pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
pub const NO_RESULTS: &str = "NO_RESULTS";
pub const NO_FRAMES: &str = "NO_FRAMES";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    /// The machine lacks something the run needs (GPU adapter, driver).
    Runtime,
    /// Bad input from the user: config file, flags, missing result files.
    Usage,
    /// The measurement itself produced nothing usable.
    Measurement,
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, CodedErrorKind::Runtime)
    }

    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, CodedErrorKind::Usage)
    }

    pub fn measurement(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, CodedErrorKind::Measurement)
    }

    fn new(code: &'static str, message: impl Into<String>, kind: CodedErrorKind) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Process exit code for this error. A missing GPU runtime is told apart
    /// from ordinary failures so wrapper scripts can skip instead of fail.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            CodedErrorKind::Runtime => 2,
            CodedErrorKind::Usage | CodedErrorKind::Measurement => 1,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

/// Envelope for any error: coded errors keep their code, everything else is
/// reported as `UNCLASSIFIED` with the full context chain as the message.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    match find_coded_error(error) {
        Some(coded) => coded.envelope(),
        None => ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: "UNCLASSIFIED".to_owned(),
                message: format!("{error:#}"),
                details: None,
            },
        },
    }
}

pub fn exit_code_for(error: &Error) -> i32 {
    find_coded_error(error).map_or(1, CodedError::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use serde_json::json;

    #[test]
    fn coded_error_is_found_through_context_layers() {
        let result: anyhow::Result<()> = Err(anyhow::Error::new(CodedError::runtime(
            GPU_ADAPTER_UNAVAILABLE,
            "no suitable GPU adapter found",
        )))
        .context("failed to initialize renderer");

        let error = result.unwrap_err();
        let coded = find_coded_error(&error).expect("coded error should be in chain");
        assert_eq!(coded.code, GPU_ADAPTER_UNAVAILABLE);
        assert_eq!(exit_code_for(&error), 2);
    }

    #[test]
    fn envelope_serializes_details_only_when_present() {
        let plain = CodedError::usage(NO_RESULTS, "nothing to plot").envelope();
        let value = serde_json::to_value(&plain).expect("envelope should serialize");
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"]["code"], json!("NO_RESULTS"));
        assert!(value["error"].get("details").is_none());

        let detailed = CodedError::usage(INVALID_CONFIG, "bad")
            .with_details(json!({ "field": "duration_seconds" }))
            .envelope();
        let value = serde_json::to_value(&detailed).expect("envelope should serialize");
        assert_eq!(value["error"]["details"]["field"], json!("duration_seconds"));
    }

    #[test]
    fn plain_errors_are_unclassified() {
        let error = anyhow::anyhow!("disk full");
        let envelope = envelope_for(&error);
        assert_eq!(envelope.error.code, "UNCLASSIFIED");
        assert_eq!(exit_code_for(&error), 1);
    }
}
