use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `polar.toml` schema v1.
///
/// This is a *user-facing* config model: it is intentionally permissive so forward-compat is easy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolarConfigV1 {
    /// Optional schema string for tooling (`polar.config.v1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Policy files to enqueue, in load order.
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub repl: ReplConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplConfig {
    /// Prompt printed before each line is read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Enqueue files named on the command line when the REPL starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoload: Option<bool>,
}
