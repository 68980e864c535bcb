use anyhow::{Context, bail};
use clap::Parser;
use mkrelease_lib::{Config, ReleaseDescriptor};
use std::{collections::HashMap, env, fs};
use tracing::Level;

mod error;
mod fs_utils;
mod packaging;

use crate::fs_utils::encode_size;
use crate::packaging::{Compressor, create_release_sync, plan_release};

const BIN_NAME: &str = "mkrelease";
const ENV_PREFIX: &str = "MKRELEASE_";

#[derive(Parser, Debug)]
#[command(author, version, about = "Builds a release zip for the connector", long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory the relative paths are resolved against (defaults to the working directory)
    #[arg(short, long)]
    pub base_dir: Option<String>,

    /// Directory the release archive is saved to
    #[arg(short, long)]
    pub release_dir: Option<String>,

    /// Project name used for the archive and compiled artifact names
    #[arg(short, long)]
    pub project_name: Option<String>,

    /// Store entries without compression
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stored: bool,

    /// Dry run (just list files and the output path)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub dry: bool,

    /// Generate YAML config to stdout
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub generate_yaml_config: bool,

    /// Log every step to stderr
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Release version, e.g. 1.2.0
    #[arg(value_name = "versionNumber")]
    pub versions: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    // Step 1: Read environment
    let env_config = read_env();

    // Step 2: Read config file (if exists)
    let mut file_config = Config::default();
    if let Some(path) = cli.config.clone().or(env_config.config.clone()) {
        file_config = read_config_file(&path)?;
    }

    // Step 3: Merge configs: env < file < CLI
    let merged = merge_configs(env_config, file_config, cli_to_config(&cli));
    tracing::debug!(?merged, "configuration merged");

    if cli.generate_yaml_config {
        let yaml = serde_yaml::to_string(&merged)?;
        println!("{yaml}");
        return Ok(());
    }

    // Wrong argument count prints usage and still exits 0.
    let [version] = cli.versions.as_slice() else {
        println!("Usage: {BIN_NAME} versionNumber");
        return Ok(());
    };
    if version.is_empty() {
        bail!("version number must not be empty");
    }

    let descriptor =
        ReleaseDescriptor::from_config(&merged).context("resolving release layout")?;

    if merged.dry.unwrap_or(false) {
        print_plan(&descriptor, version);
        return Ok(());
    }

    let compressor = if merged.compress.unwrap_or(true) {
        Compressor::Deflate
    } else {
        Compressor::Stored
    };

    let path = create_release_sync(&descriptor, version, compressor)
        .with_context(|| format!("making release {version}"))?;

    println!("\nSuccessfully made release: {}", path.display());
    Ok(())
}

fn print_plan(descriptor: &ReleaseDescriptor, version: &str) {
    let plan = plan_release(descriptor, version);

    println!("--- DRY RUN ---");
    for planned in &plan.entries {
        let size = match planned.size {
            Some(size) => encode_size(size),
            None => "MISSING".to_string(),
        };
        println!(
            "  {} -> {} ({})",
            planned.entry.source.display(),
            planned.entry.name_in_archive,
            size
        );
    }
    println!("Total size: {}", encode_size(plan.total_size()));
    println!("Output: {}", plan.output.display());
    if plan.overwrites {
        println!("Existing archive would be overwritten");
    }
    if !plan.is_complete() {
        println!("Release is incomplete: missing source files");
    }
}

/// Reads environment variables prefixed with MKRELEASE_
fn read_env() -> Config {
    let vars: HashMap<String, String> = env::vars().collect();
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> Config {
    macro_rules! get_env {
        ($key:expr) => {
            vars.get(&format!("{ENV_PREFIX}{}", $key)).cloned()
        };
    }

    fn flag(v: String) -> bool {
        v == "true" || v == "1" || v.eq_ignore_ascii_case("yes")
    }

    Config {
        config: get_env!("CONFIG"),
        project_name: get_env!("PROJECT_NAME"),
        base_dir: get_env!("BASE_DIR"),
        release_dir: get_env!("RELEASE_DIR"),
        readme: get_env!("README"),
        artifact: get_env!("ARTIFACT"),
        connector_config: get_env!("CONNECTOR_CONFIG"),
        launcher: get_env!("LAUNCHER"),
        compress: get_env!("COMPRESS").map(flag),
        dry: get_env!("DRY").map(flag),
    }
}

/// Reads YAML or JSON config from file
fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
    let lower = path.to_lowercase();
    let cfg = if lower.ends_with(".json") {
        serde_json::from_str(&content).with_context(|| format!("parsing JSON config {path}"))?
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("parsing YAML config {path}"))?
    };
    Ok(cfg)
}

/// Converts CLI struct into Config. Flags left off stay `None` so they do
/// not mask lower layers.
fn cli_to_config(cli: &Cli) -> Config {
    Config {
        config: cli.config.clone(),
        project_name: cli.project_name.clone(),
        base_dir: cli.base_dir.clone(),
        release_dir: cli.release_dir.clone(),
        readme: None,
        artifact: None,
        connector_config: None,
        launcher: None,
        compress: cli.stored.then_some(false),
        dry: cli.dry.then_some(true),
    }
}

/// Merge configs by priority: env < file < cli
fn merge_configs(env: Config, file: Config, cli: Config) -> Config {
    fn pick<T: Clone>(env: Option<T>, file: Option<T>, cli: Option<T>) -> Option<T> {
        cli.or(file).or(env)
    }

    Config {
        config: pick(env.config, file.config, cli.config),
        project_name: pick(env.project_name, file.project_name, cli.project_name),
        base_dir: pick(env.base_dir, file.base_dir, cli.base_dir),
        release_dir: pick(env.release_dir, file.release_dir, cli.release_dir),
        readme: pick(env.readme, file.readme, cli.readme),
        artifact: pick(env.artifact, file.artifact, cli.artifact),
        connector_config: pick(env.connector_config, file.connector_config, cli.connector_config),
        launcher: pick(env.launcher, file.launcher, cli.launcher),
        compress: pick(env.compress, file.compress, cli.compress),
        dry: pick(env.dry, file.dry, cli.dry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_beats_file_beats_env() {
        let env = Config {
            project_name: Some("env".into()),
            release_dir: Some("env-dir".into()),
            launcher: Some("env-launcher".into()),
            ..Config::default()
        };
        let file = Config {
            project_name: Some("file".into()),
            release_dir: Some("file-dir".into()),
            ..Config::default()
        };
        let cli = Config {
            project_name: Some("cli".into()),
            ..Config::default()
        };

        let merged = merge_configs(env, file, cli);
        assert_eq!(merged.project_name.as_deref(), Some("cli"));
        assert_eq!(merged.release_dir.as_deref(), Some("file-dir"));
        assert_eq!(merged.launcher.as_deref(), Some("env-launcher"));
    }

    #[test]
    fn env_vars_use_prefix_and_flag_spellings() {
        let vars: HashMap<String, String> = [
            ("MKRELEASE_PROJECT_NAME", "demo"),
            ("MKRELEASE_COMPRESS", "no"),
            ("MKRELEASE_DRY", "YES"),
            ("PROJECT_NAME", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg = config_from_vars(&vars);
        assert_eq!(cfg.project_name.as_deref(), Some("demo"));
        assert_eq!(cfg.compress, Some(false));
        assert_eq!(cfg.dry, Some(true));
        assert!(cfg.release_dir.is_none());
    }

    #[test]
    fn unset_cli_flags_do_not_override() {
        let cli = Cli::parse_from(["mkrelease", "1.0"]);
        let cfg = cli_to_config(&cli);
        assert_eq!(cfg.compress, None);
        assert_eq!(cfg.dry, None);

        let cli = Cli::parse_from(["mkrelease", "--stored", "-d", "1.0"]);
        let cfg = cli_to_config(&cli);
        assert_eq!(cfg.compress, Some(false));
        assert_eq!(cfg.dry, Some(true));
        assert_eq!(cli.versions, ["1.0"]);
    }
}
