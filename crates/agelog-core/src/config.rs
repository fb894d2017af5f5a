use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::AgelogError;
use crate::extract::{FieldExtractor, ProjectionFields};
use crate::history::HistoryFields;

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "agelog.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub jira: JiraConfig,
}

/// Tracker field names, shared by reconstruction and the flat projection.
///
/// The team field is read once, from the history table, and reused by the
/// projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldsConfig {
    #[serde(flatten)]
    pub history: HistoryFields,
    /// Field-map key of the reopen-date custom field.
    #[serde(default = "default_reopen_field")]
    pub reopen_field: String,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            history: HistoryFields::default(),
            reopen_field: default_reopen_field(),
        }
    }
}

fn default_reopen_field() -> String {
    ProjectionFields::default().reopen_field
}

impl FieldsConfig {
    #[must_use]
    pub fn history_fields(&self) -> HistoryFields {
        self.history.clone()
    }

    #[must_use]
    pub fn projection_fields(&self) -> ProjectionFields {
        ProjectionFields {
            team_field: self.history.team_field.clone(),
            reopen_field: self.reopen_field.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Columns for `agelog issues` when `--fields` is not given.
    #[serde(default = "default_issue_fields")]
    pub default_fields: Vec<FieldExtractor>,
    /// Worker threads for the rollup; `0` picks the available parallelism.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_fields: default_issue_fields(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            site: None,
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub jira_site: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl EffectiveConfig {
    /// Jira site from the project config, falling back to the user config.
    #[must_use]
    pub fn jira_site(&self) -> Option<&str> {
        self.project
            .jira
            .site
            .as_deref()
            .or(self.user.jira_site.as_deref())
    }
}

/// Load `agelog.toml` from `explicit` or from `project_root`.
///
/// A missing default file means defaults; a missing explicit file is an error.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_project_config(project_root: &Path, explicit: Option<&Path>) -> Result<ProjectConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = project_root.join(PROJECT_CONFIG_FILE);
            if !path.exists() {
                return Ok(ProjectConfig::default());
            }
            path
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&path, &content)
}

/// # Errors
///
/// Fails when the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("agelog/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&path, &content)
}

fn parse_config<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    toml::from_str::<T>(content).map_err(|err| {
        AgelogError::ConfigParse {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
        .into()
    })
}

/// # Errors
///
/// Fails when either config file is unreadable or malformed.
pub fn resolve_config(
    project_root: &Path,
    explicit: Option<&Path>,
    cli_format: Option<&str>,
) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root, explicit)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_format,
        user.output.clone(),
        env_format,
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// Pick the output format.
///
/// Precedence: CLI flag, `FORMAT` env var, user config, then `pretty` on a
/// terminal and `csv` when piped.
#[must_use]
pub fn resolve_output(
    cli_format: Option<&str>,
    user_output: Option<String>,
    env_format: Option<String>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some("pretty"),
            "csv" => Some("csv"),
            "json" => Some("json"),
            // common aliases
            "human" | "table" => Some("pretty"),
            _ => None,
        }
    }

    if let Some(mode) = cli_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if is_tty {
        "pretty".to_string()
    } else {
        "csv".to_string()
    }
}

/// Worker count for the rollup; `0` resolves to the available parallelism.
#[must_use]
pub fn resolve_workers(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn default_issue_fields() -> Vec<FieldExtractor> {
    FieldExtractor::ALL.to_vec()
}

const fn default_workers() -> usize {
    1
}

const fn default_page_size() -> u32 {
    100
}

/// Path of the project config inside `root`.
#[must_use]
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}
