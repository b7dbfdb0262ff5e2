//! Error taxonomy for the pipeline.
//!
//! Every failure is classified by what broke (configuration, transport,
//! response shape, value typing, data integrity, source agreement) so the
//! binary can map it to a stable exit code and the logs stay grepable.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid flag, environment, or path setup discovered before any work.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure: connect, TLS, timeout, or a non-success status.
    #[error("request for {uri} failed: {detail}")]
    Fetch { uri: String, detail: String },

    /// The source answered, but the payload does not have the promised shape.
    #[error("{context}: {detail}")]
    MalformedResponse { context: String, detail: String },

    /// A single value failed typed coercion.
    #[error("field `{field}` is not {expected}: got {value}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },

    /// The authoritative table contradicts itself (dates, monotonicity, deltas).
    #[error("data integrity fault at {date} ({field}): {detail}")]
    DataIntegrityFault {
        date: NaiveDate,
        field: &'static str,
        detail: String,
    },

    /// Redundant views of one quantity disagree beyond the allowed tolerance.
    #[error(
        "{quantity} diverges across sources: {baseline_source}={baseline} vs {candidate_source}={candidate} (tolerance {tolerance})"
    )]
    CrossSourceInconsistency {
        quantity: String,
        baseline_source: String,
        baseline: i64,
        candidate_source: String,
        candidate: i64,
        tolerance: i64,
    },

    /// Local filesystem failure (cache writes, exports).
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn fetch(uri: &str, detail: impl std::fmt::Display) -> Self {
        Self::Fetch {
            uri: uri.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn malformed(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            detail: detail.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Fetch { .. } | Self::Io { .. } => 3,
            Self::MalformedResponse { .. } | Self::TypeMismatch { .. } => 4,
            Self::DataIntegrityFault { .. } | Self::CrossSourceInconsistency { .. } => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_class() {
        let config = PipelineError::Config("bad flag".into());
        assert_eq!(config.exit_code(), 2);

        let fetch = PipelineError::fetch("https://example.com", "status 503");
        assert_eq!(fetch.exit_code(), 3);

        let malformed = PipelineError::malformed("feature query", "no rows");
        assert_eq!(malformed.exit_code(), 4);

        let mismatch = PipelineError::TypeMismatch {
            field: "value".into(),
            expected: "an integer",
            value: "\"abc\"".into(),
        };
        assert_eq!(mismatch.exit_code(), 4);

        let fault = PipelineError::DataIntegrityFault {
            date: NaiveDate::from_ymd_opt(2020, 4, 24).unwrap(),
            field: "cases",
            detail: "cumulative count shrank".into(),
        };
        assert_eq!(fault.exit_code(), 5);
    }

    #[test]
    fn integrity_fault_names_date_and_field() {
        let fault = PipelineError::DataIntegrityFault {
            date: NaiveDate::from_ymd_opt(2020, 3, 15).unwrap(),
            field: "Todesfälle",
            detail: "cumulative count shrank from 12 to 11".into(),
        };
        let message = fault.to_string();
        assert!(message.contains("2020-03-15"));
        assert!(message.contains("Todesfälle"));
        assert!(message.contains("shrank"));
    }

    #[test]
    fn divergence_names_both_sources() {
        let err = PipelineError::CrossSourceInconsistency {
            quantity: "total cases".into(),
            baseline_source: "county sum".into(),
            baseline: 100,
            candidate_source: "state sum".into(),
            candidate: 110,
            tolerance: 3,
        };
        let message = err.to_string();
        assert!(message.contains("county sum"));
        assert!(message.contains("state sum"));
        assert!(message.contains("110"));
    }
}
