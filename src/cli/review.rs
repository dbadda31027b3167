use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::commands::ClientArgs;
use super::http_client::ApiClient;
use crate::diff::summarize;
use crate::types::{HistoryEntry, StagedChange};

#[derive(Serialize)]
struct ContentRequest {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentResponse {
    committed: bool,
    change_id: Option<String>,
    message: String,
    version: Option<u64>,
}

#[derive(Serialize)]
struct ReviewRequest {
    approve: bool,
    feedback: Option<String>,
}

#[derive(Deserialize)]
struct ReviewResponse {
    change: StagedChange,
    message: String,
}

fn client(args: &ClientArgs) -> anyhow::Result<ApiClient> {
    ApiClient::new(&args.server, &args.token)
}

pub fn run_propose(args: &ClientArgs, project: &str, file: &Path) -> anyhow::Result<()> {
    let content = fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", file.display()))?;

    let resp: ContentResponse =
        client(args)?.post(&format!("/projects/{project}/content"), &ContentRequest { content })?;

    println!("{}", resp.message);
    if resp.committed {
        if let Some(version) = resp.version {
            println!("Project is now at version {version}");
        }
    } else if let Some(change_id) = resp.change_id {
        println!("Change id: {change_id}");
    }

    Ok(())
}

pub fn run_changes(args: &ClientArgs, project: &str) -> anyhow::Result<()> {
    let changes: Vec<StagedChange> =
        client(args)?.get(&format!("/projects/{project}/staged-changes"))?;

    if changes.is_empty() {
        println!("No pending changes");
        return Ok(());
    }

    for change in &changes {
        let (added, removed) = summarize(&change.diff);
        println!(
            "{}  {:<20} +{added} -{removed}  {}",
            change.id,
            change.proposer_name,
            change.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

pub fn run_review(
    args: &ClientArgs,
    change_id: &str,
    approve: bool,
    feedback: Option<String>,
) -> anyhow::Result<()> {
    let resp: ReviewResponse = client(args)?.put(
        &format!("/staged-changes/{change_id}"),
        &ReviewRequest { approve, feedback },
    )?;

    println!("{}", resp.message);
    println!("Proposed by {}", resp.change.proposer_name);

    Ok(())
}

pub fn run_history(
    args: &ClientArgs,
    project: &str,
    edits_only: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let endpoint = if edits_only { "edit-history" } else { "history" };
    let mut path = format!("/projects/{project}/{endpoint}");
    if let Some(limit) = limit {
        path.push_str(&format!("?limit={limit}"));
    }

    let entries: Vec<HistoryEntry> = client(args)?.get(&path)?;
    if entries.is_empty() {
        println!("No history");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{}  {:<9} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.kind.as_str(),
            entry.message
        );
    }

    Ok(())
}
