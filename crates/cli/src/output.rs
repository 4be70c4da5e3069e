//! Output formatting utilities
//!
//! Every cluster's result is rendered into one block and written to stdout
//! with a single locked write, so concurrent clusters never interleave.

use agent_lib::ClusterOutcome;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One block per cluster (default)
    #[default]
    Table,
    /// One JSON object per cluster, one per line
    Json,
}

/// A per-cluster result the CLI knows how to print
pub trait Render: Serialize {
    /// Detail lines shown under the cluster header, without indentation
    fn render(&self) -> String;
}

/// Rows printed as a table
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct Rows<T>(pub Vec<T>);

impl<T: Tabled + Serialize> Render for Rows<T> {
    fn render(&self) -> String {
        if self.0.is_empty() {
            return "No items found".yellow().to_string();
        }
        Table::new(&self.0).with(Style::blank()).to_string()
    }
}

pub fn print_header(title: &str, format: OutputFormat) {
    if format == OutputFormat::Table {
        write_block(&format!("{}\n", title.bold()));
    }
}

/// Render one cluster's outcome
pub fn render_outcome<T: Render>(outcome: &ClusterOutcome<T>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_block(outcome),
        OutputFormat::Json => {
            let mut line = serde_json::to_string(&json_outcome(outcome))
                .unwrap_or_else(|e| format!("{{\"error\":\"failed to encode output: {e}\"}}"));
            line.push('\n');
            line
        }
    }
}

fn render_block<T: Render>(outcome: &ClusterOutcome<T>) -> String {
    let mut block = format!("Cluster: {}", outcome.cluster).cyan().bold().to_string();
    block.push('\n');
    let detail = match &outcome.result {
        Ok(value) => value.render(),
        Err(err) => format!("Error: {}", err).red().to_string(),
    };
    block.push_str(&indent(&detail));
    block.push('\n');
    block
}

#[derive(Serialize)]
struct JsonOutcome<'a, T> {
    cluster: &'a str,
    host: &'a str,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn json_outcome<T: Render>(outcome: &ClusterOutcome<T>) -> JsonOutcome<'_, T> {
    let (result, error) = match &outcome.result {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err.to_string())),
    };
    JsonOutcome {
        cluster: &outcome.cluster.name,
        host: &outcome.cluster.host,
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        result,
        error,
    }
}

/// Indent every line by two spaces
pub fn indent(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for line in text.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Write a rendered block to stdout in one go
pub fn write_block(block: &str) {
    if let Err(e) = write_block_to(&mut io::stdout().lock(), block) {
        // A closed pipe (e.g. `| head`) is not worth failing the command for.
        debug!(error = %e, "Failed to write output");
    }
}

/// Write the whole block with one call. Callers hold the writer's lock for
/// the duration so blocks from different clusters never interleave.
pub fn write_block_to<W: Write>(out: &mut W, block: &str) -> io::Result<()> {
    out.write_all(block.as_bytes())?;
    out.flush()
}
