//! A single unit of drone work as produced by the planner or a client.

use serde::{Deserialize, Deserializer, Serialize};

/// Named command parameters (`"distance": 50`, `"degree": "90"`, ...).
pub type Params = serde_json::Map<String, serde_json::Value>;

/// One entry of a job's work order.
///
/// Both fields are lenient on input: a missing or `null` action is kept as
/// `None` (the runner skips such commands), and a missing or `null`
/// `params` becomes an empty map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Params,
}

impl Command {
    /// Action name, treating an empty string the same as a missing one.
    pub fn action_name(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Params>::deserialize(deserializer)?.unwrap_or_default())
}
