// Push-subscription envelope: the job JSON travels base64-encoded in
// `message.data`, alongside delivery metadata.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::{DecodeError, Job, JobMessage};

/// Envelope posted by the message-delivery layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushMessage {
    /// Base64 (standard alphabet, padded) job payload.
    #[serde(default)]
    pub data: String,
    #[serde(
        default,
        rename = "messageId",
        alias = "message_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl PushEnvelope {
    /// Wrap a raw job payload the way the delivery layer would.
    pub fn wrap(payload: &[u8], message_id: Option<String>) -> Self {
        Self {
            message: PushMessage {
                data: STANDARD.encode(payload),
                message_id,
                attributes: HashMap::new(),
            },
            subscription: None,
        }
    }

    pub fn decode_job(&self) -> Result<Job, DecodeError> {
        let payload = STANDARD.decode(self.message.data.trim())?;
        Job::decode(&payload)
    }
}

/// A decoded inbound job and the delivery id it arrived with, if any.
#[derive(Debug)]
pub struct InboundJob {
    pub job: Job,
    pub message_id: Option<String>,
}

/// Decode either a push envelope or a bare job JSON document.
///
/// A top-level object with a `message` key is treated as an envelope;
/// anything else must be the job record itself.
pub fn decode_inbound(payload: &[u8]) -> Result<InboundJob, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    if value.get("message").is_some() {
        let envelope: PushEnvelope = serde_json::from_value(value)?;
        let job = envelope.decode_job()?;
        return Ok(InboundJob { job, message_id: envelope.message.message_id });
    }

    let message: JobMessage = serde_json::from_value(value)?;
    Ok(InboundJob { job: Job::from(message), message_id: None })
}
