//! Config parsing and resolution.
//!
//! This crate is intentionally IO-free: it parses and resolves configuration provided as strings.
//! Loading the listed sources is the runtime's job.

#![forbid(unsafe_code)]

use anyhow::Context;

mod model;
mod resolve;

pub use model::{PolarConfigV1, ReplConfig};
pub use resolve::{DEFAULT_PROMPT, Overrides, ReplSettings, ResolvedConfig};

/// Schema identifier accepted in the `schema` key.
pub const SCHEMA_CONFIG_V1: &str = "polar.config.v1";

/// Parse `polar.toml` (or equivalent) into a typed model.
pub fn parse_config_toml(input: &str) -> anyhow::Result<PolarConfigV1> {
    let cfg: PolarConfigV1 = toml::from_str(input).context("parse polar config TOML")?;
    Ok(cfg)
}

/// Resolve the effective settings (file values + overrides + defaults).
pub fn resolve_config(cfg: PolarConfigV1, overrides: Overrides) -> anyhow::Result<ResolvedConfig> {
    resolve::resolve_config(cfg, overrides)
}
