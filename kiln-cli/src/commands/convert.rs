//! Convert command handler
//!
//! Runs a configuration script the way the CI host would and prints the
//! generated configuration.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use kiln_core::{Build, ConfigFile, ConvertRequest, Repository, Template, TemplateData};
use kiln_lua::{MAX_ARTIFACT_SIZE, parse_script};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Arguments of the convert command
#[derive(Args)]
pub struct ConvertArgs {
    /// Path to the Lua script
    script: PathBuf,

    /// Repository descriptor as a JSON file
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Build descriptor as a JSON file
    #[arg(long)]
    build: Option<PathBuf>,

    /// Repository namespace, overrides the descriptor
    #[arg(long)]
    namespace: Option<String>,

    /// Repository name, overrides the descriptor
    #[arg(long)]
    name: Option<String>,

    /// Template data as a JSON object file
    #[arg(long)]
    data: Option<PathBuf>,

    /// Template data entries as key=value pairs; values are parsed as JSON
    /// when possible (e.g. count=3 debug=true image=rust)
    #[arg(short, long, value_parser = parse_key_val)]
    input: Vec<(String, String)>,

    /// Run the script as a template instead of a repository configuration
    #[arg(long)]
    template: bool,

    /// Write the configuration to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Parse an input value as JSON, falling back to a plain string
fn parse_input_value(value: String) -> JsonValue {
    serde_json::from_str(&value).unwrap_or(JsonValue::String(value))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}

/// Apply `--namespace` / `--name`, deriving the slug again only when it
/// changed or was never set
fn apply_repo_overrides(repo: &mut Repository, namespace: Option<String>, name: Option<String>) {
    let overridden = namespace.is_some() || name.is_some();
    if let Some(namespace) = namespace {
        repo.namespace = namespace;
    }
    if let Some(name) = name {
        repo.name = name;
    }
    if overridden || repo.slug.is_empty() {
        repo.slug = format!("{}/{}", repo.namespace, repo.name);
    }
}

/// Handle the convert command
pub fn handle_convert_command(args: ConvertArgs) -> Result<()> {
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script file: {}", args.script.display()))?;
    let script_name = args.script.display().to_string();

    let mut repo = match &args.repo {
        Some(path) => read_json::<Repository>(path, "repository")?,
        None => Repository::new("local", "repo"),
    };
    apply_repo_overrides(&mut repo, args.namespace, args.name);

    let build = match &args.build {
        Some(path) => read_json::<Build>(path, "build")?,
        None => Build::default(),
    };

    let mut data = match &args.data {
        Some(path) => read_json::<TemplateData>(path, "template data")?,
        None => TemplateData::new(),
    };
    for (key, value) in args.input {
        data.insert(key, parse_input_value(value));
    }

    let (req, template) = if args.template {
        let template = Template::new(script_name, source);
        (ConvertRequest::new(repo, build, ConfigFile::default()), Some(template))
    } else {
        if repo.config.is_empty() {
            repo.config = script_name;
        }
        (ConvertRequest::new(repo, build, ConfigFile::new(source)), None)
    };

    debug!(
        slug = %req.repo.slug,
        event = req.build.event.as_str(),
        template = args.template,
        "running configuration script"
    );

    let artifact = parse_script(&req, template.as_ref(), &data)
        .with_context(|| format!("Failed to convert script: {}", args.script.display()))?;

    let Some(artifact) = artifact else {
        anyhow::bail!(
            "generated configuration exceeds {} bytes, nothing produced",
            MAX_ARTIFACT_SIZE
        );
    };

    match args.output {
        Some(path) => {
            fs::write(&path, &artifact)
                .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
            eprintln!(
                "{} {} ({} bytes)",
                "✓ Configuration written to".green().bold(),
                path.display().to_string().cyan(),
                artifact.len()
            );
        }
        None => print!("{}", artifact),
    }

    Ok(())
}
