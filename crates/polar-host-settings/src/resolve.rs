use crate::{SCHEMA_CONFIG_V1, model::PolarConfigV1};
use camino::{Utf8Path, Utf8PathBuf};
use polar_host_types::ids;

pub const DEFAULT_PROMPT: &str = "query> ";

#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub sources: Option<Vec<String>>,
    pub prompt: Option<String>,
    pub autoload: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplSettings {
    pub prompt: String,
    pub autoload: bool,
}

impl Default for ReplSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            autoload: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub sources: Vec<Utf8PathBuf>,
    pub repl: ReplSettings,
}

impl ResolvedConfig {
    /// Anchor relative source paths at `base` (usually the config file's directory).
    pub fn relative_to(mut self, base: &Utf8Path) -> Self {
        for source in &mut self.sources {
            if source.is_relative() {
                *source = base.join(&*source);
            }
        }
        self
    }
}

pub fn resolve_config(cfg: PolarConfigV1, overrides: Overrides) -> anyhow::Result<ResolvedConfig> {
    if let Some(schema) = cfg.schema.as_deref()
        && schema != SCHEMA_CONFIG_V1
    {
        anyhow::bail!("unknown schema: {schema} (expected '{SCHEMA_CONFIG_V1}')");
    }

    let sources = overrides.sources.unwrap_or(cfg.sources);
    let sources = sources
        .iter()
        .map(|s| parse_source(s))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let prompt = overrides
        .prompt
        .or(cfg.repl.prompt)
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());
    if prompt.trim().is_empty() {
        anyhow::bail!("repl.prompt must not be empty");
    }

    let autoload = overrides.autoload.or(cfg.repl.autoload).unwrap_or(false);

    Ok(ResolvedConfig {
        sources,
        repl: ReplSettings { prompt, autoload },
    })
}

// Extension only; existence is checked when the runtime enqueues the file.
fn parse_source(v: &str) -> anyhow::Result<Utf8PathBuf> {
    let path = Utf8Path::new(v);
    match path.extension() {
        Some(ext) if ids::is_policy_extension(ext) => Ok(path.to_path_buf()),
        _ => anyhow::bail!(
            "invalid source {v}: expected a .{} or .{} file",
            ids::POLICY_EXTENSIONS[0],
            ids::POLICY_EXTENSIONS[1]
        ),
    }
}
