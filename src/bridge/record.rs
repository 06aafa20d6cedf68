use serde::{Deserialize, Serialize};

/// Message synthesized by the caller when no terminal record arrives in time
pub const TIMEOUT_MESSAGE: &str = "Request processing timed out";

/// Status code attached to the synthesized timeout failure
pub const TIMEOUT_STATUS: u16 = 504;

/// Status used when a worker reports a failure without a status code
pub const DEFAULT_FAILURE_STATUS: u16 = 400;

/// State of one correlated exchange as stored under `(group, id)`.
///
/// Stored as `{"status":"pending"}`, `{"status":"completed","data":...}` or
/// `{"status":"failed","error":"...","statusCode":404}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CorrelationRecord<T> {
    Pending,
    Completed {
        data: T,
    },
    Failed {
        error: String,
        #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl<T> CorrelationRecord<T> {
    pub fn completed(data: T) -> Self {
        CorrelationRecord::Completed { data }
    }

    pub fn failed(error: impl Into<String>, status_code: Option<u16>) -> Self {
        CorrelationRecord::Failed {
            error: error.into(),
            status_code,
        }
    }

    /// The failure the caller reports once its budget is spent
    pub fn timed_out() -> Self {
        Self::failed(TIMEOUT_MESSAGE, Some(TIMEOUT_STATUS))
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CorrelationRecord::Pending)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CorrelationRecord::Failed { error, status_code: Some(TIMEOUT_STATUS) } if error == TIMEOUT_MESSAGE
        )
    }

    /// Status to report for a failure, falling back to 400 when the worker gave none
    pub fn failure_status(&self) -> Option<u16> {
        match self {
            CorrelationRecord::Failed { status_code, .. } => {
                Some(status_code.unwrap_or(DEFAULT_FAILURE_STATUS))
            }
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CorrelationRecord<U> {
        match self {
            CorrelationRecord::Pending => CorrelationRecord::Pending,
            CorrelationRecord::Completed { data } => CorrelationRecord::Completed { data: f(data) },
            CorrelationRecord::Failed { error, status_code } => {
                CorrelationRecord::Failed { error, status_code }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn pending_serializes_as_bare_status() {
        let record: CorrelationRecord<Value> = CorrelationRecord::Pending;
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({ "status": "pending" }));
    }

    #[test]
    fn failed_uses_camel_case_status_code() {
        let record: CorrelationRecord<Value> =
            CorrelationRecord::failed("Organization not found", Some(404));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "status": "failed", "error": "Organization not found", "statusCode": 404 })
        );

        let bare: CorrelationRecord<Value> =
            serde_json::from_value(json!({ "status": "failed", "error": "nope" })).unwrap();
        assert_eq!(bare.failure_status(), Some(DEFAULT_FAILURE_STATUS));
    }

    #[test]
    fn completed_reads_worker_written_shape() {
        let record: CorrelationRecord<Value> = serde_json::from_value(json!({
            "status": "completed",
            "data": { "organizationId": "org_1" }
        }))
        .unwrap();
        assert!(record.is_terminal());
        assert_eq!(record, CorrelationRecord::completed(json!({ "organizationId": "org_1" })));
    }

    #[test]
    fn timeout_is_recognisable() {
        let record: CorrelationRecord<()> = CorrelationRecord::timed_out();
        assert!(record.is_timeout());
        assert_eq!(record.failure_status(), Some(504));
        assert!(!CorrelationRecord::<()>::failed(TIMEOUT_MESSAGE, Some(500)).is_timeout());
    }
}
