use std::cell::Cell;
use std::io::{self, Write};
use std::path::PathBuf;

use agelog_core::RawIssue;
use agelog_core::error::AgelogError;
use agelog_core::source::write_snapshot;
use anyhow::{Context as _, Result};
use clap::Args;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::{Context, open_output};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Jira base URL, e.g. `https://jira.example.com`. Falls back to `jira.site`
    /// in agelog.toml, then `jira_site` in the user config.
    #[arg(long, value_name = "URL")]
    pub site: Option<String>,

    /// JQL query selecting the issues to download.
    #[arg(long, value_name = "QUERY")]
    pub jql: String,

    /// Issues per request. Defaults to `jira.page_size`.
    #[arg(long, value_name = "N")]
    pub page_size: Option<u32>,

    /// Write JSONL here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// API token (optional). Falls back to the JIRA_TOKEN env var.
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct FetchReport {
    site: String,
    jql: String,
    fetched_issues: usize,
    pages: usize,
    api_requests: usize,
}

/// One page of `GET /rest/api/2/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    start_at: u64,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    issues: Vec<JsonValue>,
}

struct JiraClient {
    site: String,
    token: Option<String>,
    page_size: u32,
    requests: Cell<usize>,
}

impl JiraClient {
    fn new(site: &str, token: Option<String>, page_size: u32) -> Self {
        Self {
            site: site.trim_end_matches('/').to_string(),
            token,
            page_size: page_size.max(1),
            requests: Cell::new(0),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn search_url(&self) -> String {
        format!("{}/rest/api/2/search", self.site)
    }

    /// Page through `jql`, handing each page to `sink` as it arrives.
    fn fetch_issues(
        &self,
        jql: &str,
        mut sink: impl FnMut(&[RawIssue]) -> Result<()>,
    ) -> Result<(usize, usize)> {
        let mut start_at = 0_u64;
        let mut fetched = 0_usize;
        let mut pages = 0_usize;

        loop {
            let page: SearchPage = self
                .get_json(&[
                    ("jql", jql.to_string()),
                    ("startAt", start_at.to_string()),
                    ("maxResults", self.page_size.to_string()),
                    ("expand", "changelog".to_string()),
                ])
                .with_context(|| format!("failed to fetch search page at startAt={start_at}"))?;

            let batch: Vec<RawIssue> = page.issues.into_iter().map(RawIssue::new).collect();
            debug!(
                start_at = page.start_at,
                len = batch.len(),
                total = page.total,
                "fetched search page"
            );

            if !batch.is_empty() {
                sink(&batch)?;
                fetched += batch.len();
                pages += 1;
            }

            match next_start(start_at, batch.len(), page.total) {
                Some(next) => start_at = next,
                None => break,
            }
        }

        Ok((fetched, pages))
    }

    fn get_json<T: DeserializeOwned>(&self, query: &[(&str, String)]) -> Result<T> {
        self.requests.set(self.requests.get() + 1);

        let url = self.search_url();
        let mut request = ureq::get(&url)
            .set("Accept", "application/json")
            .set("User-Agent", "agelog-cli");

        for (name, value) in query {
            request = request.query(name, value);
        }

        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request.call().map_err(|err| AgelogError::FetchFailed {
            url: url.clone(),
            reason: err.to_string(),
        })?;

        response
            .into_json::<T>()
            .context("failed to decode Jira search response")
    }
}

/// Offset of the next page, or `None` when paging is done.
///
/// Paging stops on an empty page or once `start_at + page_len` reaches the
/// reported total.
fn next_start(start_at: u64, page_len: usize, total: Option<u64>) -> Option<u64> {
    if page_len == 0 {
        return None;
    }
    let next = start_at + page_len as u64;
    match total {
        Some(total) if next >= total => None,
        _ => Some(next),
    }
}

pub fn run_fetch(args: &FetchArgs, ctx: &Context) -> Result<()> {
    let Some(site) = args.site.as_deref().or_else(|| ctx.config.jira_site()) else {
        anyhow::bail!("missing Jira site: pass --site <url> or set jira.site in agelog.toml");
    };

    let token = args
        .token
        .clone()
        .or_else(|| std::env::var("JIRA_TOKEN").ok());
    let page_size = args.page_size.unwrap_or(ctx.config.project.jira.page_size);

    let client = JiraClient::new(site, token, page_size);
    info!(site = %client.site, jql = %args.jql, page_size = client.page_size, "fetching issues");

    let mut out = open_output(args.output.as_deref())?;
    let (fetched, pages) = client.fetch_issues(&args.jql, |batch| {
        write_snapshot(&mut out, batch).map(|_| ())
    })?;
    out.flush().context("failed to flush fetched issues")?;

    let report = FetchReport {
        site: client.site.clone(),
        jql: args.jql.clone(),
        fetched_issues: fetched,
        pages,
        api_requests: client.request_count(),
    };
    info!(fetched, pages, "fetch complete");

    if !ctx.quiet {
        let stderr = io::stderr();
        let mut err_out = stderr.lock();
        if ctx.output.is_json() {
            serde_json::to_writer_pretty(&mut err_out, &report)?;
            writeln!(err_out)?;
        } else {
            print_report(&mut err_out, &report)?;
        }
    }

    Ok(())
}

fn print_report(w: &mut dyn Write, report: &FetchReport) -> io::Result<()> {
    writeln!(w, "agelog fetch --site {}", report.site)?;
    writeln!(w, "  jql:            {}", report.jql)?;
    writeln!(w, "  fetched issues: {}", report.fetched_issues)?;
    writeln!(w, "  pages:          {}", report.pages)?;
    writeln!(w, "  API requests:   {}", report.api_requests)
}
