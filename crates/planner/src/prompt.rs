//! Prompt template loading and assembly.

use std::path::Path;

/// Template used when no prompt file is configured.
pub const DEFAULT_TEMPLATE: &str = r#"You control a small quadcopter. Convert the user's spoken request into a JSON object and reply with that object only.

Format:
{"commands": [{"action": "<name>", "params": {...}}, ...]}

Supported actions and parameters (distances in cm, angles in degrees, speeds in cm/s):
- takeoff: altitude (optional, default 50)
- land, emergency: no parameters
- up, down, left, right, forward, back: distance
- cw, ccw: degree
- go: x, y, z, speed
- speed: value

Rules:
- Keep the user's order of actions.
- If the request is not about flying, return {"commands": []}.
- Do not add commentary outside the JSON object."#;

const UTTERANCE_HEADER: &str = "[User utterance]";

/// Read the template at `path`, or fall back to [`DEFAULT_TEMPLATE`].
pub fn load_template(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Append `utterance` to `template` under the utterance header.
pub fn build_prompt(template: &str, utterance: &str) -> String {
    format!("{template}\n\n{UTTERANCE_HEADER}\n{utterance}")
}
