//! Job events published by the registry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus};

/// Event emitted on every job state mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Status transition
    Status {
        job_id: JobId,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Progress update (fraction in [0, 1])
    Progress { job_id: JobId, progress: f64 },
}

impl JobEvent {
    pub fn status(job_id: &JobId, status: JobStatus, message: Option<String>) -> Self {
        JobEvent::Status {
            job_id: job_id.clone(),
            status,
            message,
        }
    }

    pub fn progress(job_id: &JobId, progress: f64) -> Self {
        JobEvent::Progress {
            job_id: job_id.clone(),
            progress,
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            JobEvent::Status { job_id, .. } | JobEvent::Progress { job_id, .. } => job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = JobEvent::progress(&JobId::from_string("abc"), 0.25);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["job_id"], "abc");
        assert_eq!(json["progress"], 0.25);

        let event = JobEvent::status(&JobId::from_string("abc"), JobStatus::Done, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "done");
        assert!(json.get("message").is_none());
    }
}
