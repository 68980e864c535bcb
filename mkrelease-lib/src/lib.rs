use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const PROJECT_NAME: &str = "flexy-osisoft-connector";

/// Directory the release archives are saved to.
pub const RELEASE_DIR: &str = "../releases/";

pub const README_PATH: &str = "../../README.md";
pub const BUILD_DIR: &str = "../build/";
pub const CONNECTOR_CONFIG_PATH: &str = "../config/ConnectorConfig.json";
pub const LAUNCHER_PATH: &str = "../scripts/jvmrun";

/// Layered configuration. Every field is optional so env, file and CLI
/// layers can be merged field by field.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub config: Option<String>,
    pub project_name: Option<String>,
    pub base_dir: Option<String>,
    pub release_dir: Option<String>,
    pub readme: Option<String>,
    pub artifact: Option<String>,
    pub connector_config: Option<String>,
    pub launcher: Option<String>,
    pub compress: Option<bool>,
    pub dry: Option<bool>,
}

/// The four files every release bundle carries, in archive order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseRole {
    Readme,
    Artifact,
    ConnectorConfig,
    Launcher,
}

impl ReleaseRole {
    pub const ALL: [ReleaseRole; 4] = [
        ReleaseRole::Readme,
        ReleaseRole::Artifact,
        ReleaseRole::ConnectorConfig,
        ReleaseRole::Launcher,
    ];
}

impl fmt::Display for ReleaseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseRole::Readme => "readme",
            ReleaseRole::Artifact => "compiled artifact",
            ReleaseRole::ConnectorConfig => "connector configuration",
            ReleaseRole::Launcher => "launch script",
        };
        f.write_str(s)
    }
}

/// A source file and the flat name it is stored under inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub role: ReleaseRole,
    pub source: PathBuf,
    pub name_in_archive: String,
}

/// Everything needed to build one release archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    pub project_name: String,
    pub release_dir: PathBuf,
    entries: Vec<ArchiveEntry>,
}

impl ReleaseDescriptor {
    /// Builds a descriptor from a merged config, falling back to the
    /// project defaults for anything left unset.
    ///
    /// Relative paths resolve against `config.base_dir`, or the current
    /// directory when that is unset.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        let base_dir = match &config.base_dir {
            Some(dir) => normalize_path(&cwd.join(dir)),
            None => cwd,
        };

        let project_name = config
            .project_name
            .clone()
            .unwrap_or_else(|| PROJECT_NAME.to_string());

        let default_artifact = format!("{BUILD_DIR}{project_name}.jar");

        let sources = [
            (ReleaseRole::Readme, config.readme.as_deref().unwrap_or(README_PATH)),
            (
                ReleaseRole::Artifact,
                config.artifact.as_deref().unwrap_or(&default_artifact),
            ),
            (
                ReleaseRole::ConnectorConfig,
                config
                    .connector_config
                    .as_deref()
                    .unwrap_or(CONNECTOR_CONFIG_PATH),
            ),
            (
                ReleaseRole::Launcher,
                config.launcher.as_deref().unwrap_or(LAUNCHER_PATH),
            ),
        ];

        let entries = sources
            .into_iter()
            .map(|(role, path)| entry_for(&base_dir, role, path))
            .collect::<Result<Vec<_>>>()?;

        let release_dir = normalize_path(
            &base_dir.join(config.release_dir.as_deref().unwrap_or(RELEASE_DIR)),
        );

        Ok(Self {
            project_name,
            release_dir,
            entries,
        })
    }

    /// Descriptor with every default, rooted at `base_dir`.
    pub fn default_for(base_dir: &Path) -> Result<Self> {
        Self::from_config(&Config {
            base_dir: Some(base_dir.to_string_lossy().to_string()),
            ..Config::default()
        })
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// `<project-name>-<version>.zip`. The version is used verbatim.
    pub fn archive_file_name(&self, version: &str) -> String {
        format!("{}-{}.zip", self.project_name, version)
    }

    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.release_dir.join(self.archive_file_name(version))
    }
}

fn entry_for(base_dir: &Path, role: ReleaseRole, path: &str) -> Result<ArchiveEntry> {
    let source = normalize_path(&base_dir.join(path));
    let name_in_archive = source
        .file_name()
        .with_context(|| format!("{role} path {path:?} has no file name"))?
        .to_string_lossy()
        .to_string();

    Ok(ArchiveEntry {
        role,
        source,
        name_in_archive,
    })
}

/// Lexically removes `.` and `..` components without touching the
/// filesystem, so paths to files that do not exist yet still resolve.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
