//! Developer tasks (schema generation and fixture checks).
//!
//! Keeping this separate keeps tooling dependencies out of the runtime crates.

use anyhow::{Context, bail};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the project root (parent of xtask directory).
fn project_root() -> anyhow::Result<PathBuf> {
    let manifest_dir = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("Cannot determine current directory")?,
    };

    // If we're in the xtask directory, go up one level
    if manifest_dir.ends_with("xtask") {
        manifest_dir
            .parent()
            .map(Path::to_path_buf)
            .context("xtask has no parent")
    } else {
        Ok(manifest_dir)
    }
}

fn schemas_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("schemas"))
}

fn fixtures_dir() -> anyhow::Result<PathBuf> {
    Ok(project_root()?.join("tests").join("fixtures"))
}

/// Schema definition with its target filename.
struct SchemaSpec {
    filename: &'static str,
    generate: fn() -> schemars::Schema,
}

/// Generate the `polar.toml` schema.
fn generate_config_schema() -> schemars::Schema {
    schema_for!(polar_host_settings::PolarConfigV1)
}

/// Generate the schema for terms exchanged with the engine.
fn generate_term_schema() -> schemars::Schema {
    schema_for!(polar_host_types::Term)
}

/// Generate the schema for query step results (including host callbacks).
fn generate_step_schema() -> schemars::Schema {
    schema_for!(polar_host_types::StepResult)
}

fn schema_specs() -> Vec<SchemaSpec> {
    vec![
        SchemaSpec {
            filename: "polar.config.v1.json",
            generate: generate_config_schema,
        },
        SchemaSpec {
            filename: "polar.term.v1.json",
            generate: generate_term_schema,
        },
        SchemaSpec {
            filename: "polar.step.v1.json",
            generate: generate_step_schema,
        },
    ]
}

/// Serialize a schema to pretty-printed JSON with trailing newline.
fn serialize_schema(schema: &schemars::Schema) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(schema).context("Failed to serialize schema")?;
    json.push('\n');
    Ok(json)
}

/// Emit schemas to the schemas/ directory.
fn emit_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    fs::create_dir_all(&dir).context("Failed to create schemas directory")?;

    for spec in schema_specs() {
        let json = serialize_schema(&(spec.generate)())?;
        let path = dir.join(spec.filename);
        fs::write(&path, &json)
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    println!("\nSchemas emitted successfully.");
    Ok(())
}

/// Validate that schemas in the repo match what would be generated.
fn validate_schemas() -> anyhow::Result<()> {
    let dir = schemas_dir()?;
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for spec in schema_specs() {
        let path = dir.join(spec.filename);
        if !path.exists() {
            missing.push(spec.filename);
            continue;
        }

        let expected = serialize_schema(&(spec.generate)())?;
        let actual = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if expected != actual {
            mismatched.push(spec.filename);
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        println!("All schemas are up to date.");
        return Ok(());
    }
    if !missing.is_empty() {
        eprintln!("Missing schemas:");
        for name in &missing {
            eprintln!("  - {name}");
        }
    }
    if !mismatched.is_empty() {
        eprintln!("Schemas out of date:");
        for name in &mismatched {
            eprintln!("  - {name}");
        }
    }
    eprintln!("\nRun `cargo xtask emit-schemas` to regenerate.");
    bail!("Schema validation failed")
}

/// Check every config fixture against the generated config schema and make
/// sure it resolves, so fixtures and schema cannot drift apart.
fn check_fixtures() -> anyhow::Result<()> {
    let schema = serde_json::to_value(generate_config_schema()).context("Failed to encode schema")?;
    let validator = jsonschema::draft202012::new(&schema)
        .map_err(|e| anyhow::anyhow!("Failed to compile config schema: {e}"))?;

    let config_dir = fixtures_dir()?.join("config");
    let mut checked = 0;
    let mut errors = Vec::new();

    let mut entries = fs::read_dir(&config_dir)
        .with_context(|| format!("Failed to read {}", config_dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "toml") {
            continue;
        }
        checked += 1;
        let name = path.display().to_string();

        let text = fs::read_to_string(&path).with_context(|| format!("Failed to read {name}"))?;
        let value: serde_json::Value = match toml::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                errors.push(format!("{name}: not valid TOML: {e}"));
                continue;
            }
        };
        for err in validator.iter_errors(&value) {
            errors.push(format!("{name}: schema validation: {err}"));
        }

        let resolved = polar_host_settings::parse_config_toml(&text).and_then(|cfg| {
            polar_host_settings::resolve_config(cfg, polar_host_settings::Overrides::default())
        });
        if let Err(e) = resolved {
            errors.push(format!("{name}: {e:#}"));
        }
    }

    if errors.is_empty() {
        println!("✓ {checked} config fixture(s) valid");
        Ok(())
    } else {
        for err in &errors {
            eprintln!("  ✗ {err}");
        }
        bail!("Fixture check failed with {} errors", errors.len())
    }
}

fn print_help() {
    eprintln!("xtask commands:");
    eprintln!("  help              Show this message");
    eprintln!("  emit-schemas      Generate JSON schemas from Rust types to schemas/");
    eprintln!("  validate-schemas  Check if schemas/ matches generated output (for CI)");
    eprintln!("  print-schema-ids  Print known schema IDs");
    eprintln!("  check-fixtures    Validate tests/fixtures/config against the config schema");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match cmd {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        "emit-schemas" => emit_schemas(),
        "validate-schemas" => validate_schemas(),
        "check-fixtures" => check_fixtures(),
        "print-schema-ids" => {
            for spec in schema_specs() {
                println!("{}", spec.filename.trim_end_matches(".json"));
            }
            Ok(())
        }
        other => bail!("unknown xtask command: {other}\n\nRun `cargo xtask help` for usage."),
    }
    .context("xtask failed")
}
