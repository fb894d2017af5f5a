use std::path::PathBuf;

use agelog_core::extract::{FieldExtractor, parse_field_list, project_issue};
use anyhow::Result;
use clap::Args;
use tracing::debug;

use super::{Context, open_output, read_snapshot};
use crate::output;

#[derive(Args, Debug)]
pub struct IssuesArgs {
    /// Issue snapshot (JSON array, search response or JSONL); omit to read stdin.
    #[arg(long, short, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Comma separated columns, e.g. `key,status,created`.
    /// Defaults to `report.default_fields`.
    #[arg(long, value_name = "LIST")]
    pub fields: Option<String>,

    /// Write the listing here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

fn resolve_columns(args: &IssuesArgs, ctx: &Context) -> Result<Vec<FieldExtractor>> {
    let columns = match args.fields.as_deref() {
        Some(raw) => parse_field_list(raw)?,
        None => ctx.config.project.report.default_fields.clone(),
    };
    if columns.is_empty() {
        anyhow::bail!("no fields selected; pass --fields with at least one column");
    }
    Ok(columns)
}

pub fn run_issues(args: &IssuesArgs, ctx: &Context) -> Result<()> {
    let columns = resolve_columns(args, ctx)?;
    let (raw_issues, _report) = read_snapshot(args.input.as_deref())?;

    let projection = ctx.config.project.fields.projection_fields();
    let rows: Vec<Vec<Option<String>>> = raw_issues
        .iter()
        .map(|issue| project_issue(issue, &columns, &projection))
        .collect();
    debug!(rows = rows.len(), columns = columns.len(), "projected issues");

    let header: Vec<&str> = columns.iter().map(|column| column.as_str()).collect();
    let mut out = open_output(args.output.as_deref())?;
    output::write_projection(&mut out, ctx.output, &header, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;
    use agelog_core::config::{EffectiveConfig, ProjectConfig, UserConfig};

    fn ctx() -> Context {
        Context {
            output: OutputMode::Csv,
            quiet: true,
            config: EffectiveConfig {
                project: ProjectConfig::default(),
                user: UserConfig::default(),
                resolved_output: "csv".to_string(),
            },
        }
    }

    fn args(fields: Option<&str>) -> IssuesArgs {
        IssuesArgs {
            input: None,
            fields: fields.map(str::to_string),
            output: None,
        }
    }

    #[test]
    fn explicit_fields_win_over_config() {
        let columns = resolve_columns(&args(Some("status,key")), &ctx()).unwrap();
        assert_eq!(columns, vec![FieldExtractor::Status, FieldExtractor::Key]);
    }

    #[test]
    fn config_default_fields_are_used() {
        let columns = resolve_columns(&args(None), &ctx()).unwrap();
        assert_eq!(columns, FieldExtractor::ALL.to_vec());
    }

    #[test]
    fn empty_field_list_is_rejected() {
        assert!(resolve_columns(&args(Some(" , ")), &ctx()).is_err());
    }

    #[test]
    fn unknown_field_is_a_typed_error() {
        let err = resolve_columns(&args(Some("key,sprint")), &ctx()).unwrap_err();
        assert!(
            err.downcast_ref::<agelog_core::error::AgelogError>()
                .is_some()
        );
    }
}
