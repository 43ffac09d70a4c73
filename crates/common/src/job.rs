// Job description: one file to sync from the content store into a git repo.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire form of a job as produced upstream.
///
/// Every field is an opaque string. Missing fields decode as empty strings;
/// nothing is validated beyond successful deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobMessage {
    /// Unique user identifier; also the content-store key prefix.
    pub user_id: String,
    /// OAuth access token used to clone and push.
    pub github_token: String,
    /// Owner of the target repository.
    pub github_username: String,
    pub repo_name: String,
    /// Directory inside the repository holding the file.
    pub project_name: String,
    pub file_name: String,
    /// Path in the content store the file was written to.
    pub storage_file_path: String,
    pub commit_message: String,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("job payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("push message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Immutable job handed to the pipeline.
///
/// The credential is kept behind [`SecretString`] so `Debug` output and
/// tracing fields never carry it.
#[derive(Debug)]
pub struct Job {
    pub user_id: String,
    pub owner: String,
    pub repo_name: String,
    pub project_name: String,
    pub file_name: String,
    pub storage_file_path: String,
    pub commit_message: String,
    credential: SecretString,
}

impl Job {
    /// Decode a bare JSON job payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let message: JobMessage = serde_json::from_slice(payload)?;
        Ok(Self::from(message))
    }

    pub fn credential(&self) -> &SecretString {
        &self.credential
    }

    /// `<project>/<file>`, relative to the repository root.
    pub fn relative_file_path(&self) -> String {
        format!("{}/{}", self.project_name, self.file_name)
    }

    /// Back to the wire form. Exposes the credential, so only for re-encoding.
    pub fn to_message(&self) -> JobMessage {
        JobMessage {
            user_id: self.user_id.clone(),
            github_token: self.credential.expose_secret().to_string(),
            github_username: self.owner.clone(),
            repo_name: self.repo_name.clone(),
            project_name: self.project_name.clone(),
            file_name: self.file_name.clone(),
            storage_file_path: self.storage_file_path.clone(),
            commit_message: self.commit_message.clone(),
        }
    }
}

impl From<JobMessage> for Job {
    fn from(message: JobMessage) -> Self {
        Self {
            user_id: message.user_id,
            owner: message.github_username,
            repo_name: message.repo_name,
            project_name: message.project_name,
            file_name: message.file_name,
            storage_file_path: message.storage_file_path,
            commit_message: message.commit_message,
            credential: SecretString::from(message.github_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_fields() {
        let payload = br#"{
            "user_id": "u1",
            "github_token": "gho_secret",
            "github_username": "octo",
            "repo_name": "notes",
            "project_name": "p1",
            "file_name": "a.md",
            "storage_file_path": "u1/notes/p1/a.md",
            "commit_message": "update"
        }"#;

        let job = Job::decode(payload).expect("job should decode");
        assert_eq!(job.user_id, "u1");
        assert_eq!(job.owner, "octo");
        assert_eq!(job.repo_name, "notes");
        assert_eq!(job.relative_file_path(), "p1/a.md");
        assert_eq!(job.storage_file_path, "u1/notes/p1/a.md");
        assert_eq!(job.commit_message, "update");
        assert_eq!(job.credential().expose_secret(), "gho_secret");
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let job = Job::decode(br#"{"user_id":"u1"}"#).expect("partial job should decode");
        assert_eq!(job.user_id, "u1");
        assert_eq!(job.repo_name, "");
        assert_eq!(job.commit_message, "");
        assert_eq!(job.credential().expose_secret(), "");
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let error = Job::decode(b"not json").expect_err("decode should fail");
        assert!(matches!(error, DecodeError::Json(_)));
    }

    #[test]
    fn debug_output_hides_credential() {
        let job = Job::from(JobMessage {
            user_id: "u1".into(),
            github_token: "gho_very_secret".into(),
            ..JobMessage::default()
        });
        let rendered = format!("{job:?}");
        assert!(!rendered.contains("gho_very_secret"), "credential leaked: {rendered}");
    }

    #[test]
    fn to_message_round_trips_wire_fields() {
        let message = JobMessage {
            user_id: "u1".into(),
            github_token: "tok".into(),
            github_username: "octo".into(),
            repo_name: "notes".into(),
            project_name: "p1".into(),
            file_name: "a.md".into(),
            storage_file_path: "u1/a.md".into(),
            commit_message: "update".into(),
        };
        assert_eq!(Job::from(message.clone()).to_message(), message);
    }
}
