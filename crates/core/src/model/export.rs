use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ProgressError, QuizProgress};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("malformed progress payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ProgressError),
}

/// Backup envelope written by `export` and read back by `import`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressExport {
    pub progress: QuizProgress,
    pub device_id: String,
    pub export_date: DateTime<Utc>,
}

/// Only `progress` is required when importing; backups from other devices may
/// omit the rest.
#[derive(Deserialize)]
struct ImportEnvelope {
    progress: QuizProgress,
}

impl ProgressExport {
    #[must_use]
    pub fn new(progress: QuizProgress, device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            progress,
            device_id: device_id.into(),
            export_date: now,
        }
    }

    /// Pretty-printed JSON for user download.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Extract and validate the progress record from an export payload.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` when the payload is not JSON, lacks `progress`,
    /// or carries a record that breaks an invariant.
    pub fn parse_progress(json: &str) -> Result<QuizProgress, ImportError> {
        let envelope: ImportEnvelope = serde_json::from_str(json)?;
        envelope.progress.validate()?;
        Ok(envelope.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryId, SessionData};
    use crate::time::fixed_now;

    #[test]
    fn export_then_parse_restores_progress() {
        let mut progress = QuizProgress::fresh(fixed_now());
        let mut session = SessionData::new(fixed_now());
        progress.record_answer(&mut session, &CategoryId::new("rust"), true, 3.5, fixed_now());
        progress.push_session(session);

        let json = ProgressExport::new(progress.clone(), "device_1", fixed_now())
            .to_json()
            .unwrap();
        assert!(json.contains("\"deviceId\": \"device_1\""));
        assert_eq!(ProgressExport::parse_progress(&json).unwrap(), progress);
    }

    #[test]
    fn missing_progress_is_rejected() {
        let err = ProgressExport::parse_progress(r#"{"deviceId":"x"}"#).unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
        assert!(ProgressExport::parse_progress("not json").is_err());
    }

    #[test]
    fn invariant_violations_are_rejected() {
        let mut value = serde_json::to_value(QuizProgress::fresh(fixed_now())).unwrap();
        value["correctAnswers"] = serde_json::json!(5);
        let payload = serde_json::json!({ "progress": value }).to_string();
        let err = ProgressExport::parse_progress(&payload).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Invalid(ProgressError::CorrectExceedsTotal { .. })
        ));
    }
}
