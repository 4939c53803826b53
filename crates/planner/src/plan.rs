use async_trait::async_trait;
use dronevox_core::Command;
use serde::Serialize;
use serde_json::Value;

use crate::error::PlannerError;
use crate::extract::extract_json_payload;

/// A model's answer to one utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DronePlan {
    /// The raw model output, shown to the user as-is.
    pub display_text: String,
    /// The parsed JSON object, saved verbatim as the job's payload copy.
    pub payload: Value,
    /// `payload.commands`, or empty when the model gave none.
    pub commands: Vec<Command>,
}

impl DronePlan {
    pub fn empty() -> Self {
        Self {
            display_text: String::new(),
            payload: serde_json::json!({ "commands": [] }),
            commands: Vec::new(),
        }
    }

    /// Build a plan from raw model output.
    pub fn from_model_output(raw: &str) -> Result<Self, PlannerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PlannerError::EmptyResponse);
        }

        let payload = extract_json_payload(raw)?;
        let commands = match payload.get("commands") {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => serde_json::from_value(list.clone()).map_err(PlannerError::InvalidCommands)?,
        };

        Ok(Self {
            display_text: raw.to_string(),
            payload,
            commands,
        })
    }
}

/// Turns transcribed speech into drone commands.
#[async_trait]
pub trait CommandPlanner: Send + Sync {
    /// Plan `text`. Blank text yields [`DronePlan::empty`] without consulting
    /// any model.
    async fn plan(&self, text: &str) -> Result<DronePlan, PlannerError>;
}
