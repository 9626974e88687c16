//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use debridfs_namespace::{Entry, RefreshSummary, RuleWarning};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_entries(entries: &[Entry], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(entries);
    }
    let mut text = format!("{:<6} {:>10} {:<16} NAME\n", "KIND", "SIZE", "MODIFIED");
    for entry in entries {
        let line = match entry {
            Entry::Folder(folder) => format!("{:<6} {:>10} {:<16} {}/", "dir", "-", "-", folder.name),
            Entry::File(file) => {
                let size = if file.size == 0 {
                    "?".to_string()
                } else {
                    format_bytes(file.size)
                };
                let modified = file.modified.map_or_else(
                    || "-".to_string(),
                    |time| time.format("%Y-%m-%d %H:%M").to_string(),
                );
                format!("{:<6} {size:>10} {modified:<16} {}", "file", file.name)
            }
        };
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

pub(crate) fn render_refresh(summary: &RefreshSummary, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(summary);
    }
    let mut text = String::new();
    let _ = writeln!(text, "jobs: {}", summary.jobs);
    let _ = writeln!(text, "files: {}", summary.files);
    let _ = writeln!(text, "folders: {}", summary.folders);
    let _ = writeln!(text, "mapping changes: {}", summary.mapping_changes);
    let _ = writeln!(
        text,
        "inventory: {}",
        if summary.refetched { "refetched" } else { "cached" }
    );
    if !summary.recovered.is_empty() {
        let _ = writeln!(text, "recovered: {}", summary.recovered.join(", "));
    }
    Ok(text)
}

pub(crate) fn render_warnings(warnings: &[RuleWarning], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(warnings);
    }
    if warnings.is_empty() {
        return Ok("rule file ok\n".to_string());
    }
    let mut text = String::new();
    for warning in warnings {
        let _ = writeln!(
            text,
            "line {}: {} ({})",
            warning.line, warning.pattern, warning.message
        );
    }
    Ok(text)
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes_to_f64(bytes) / 1024.0;
    let mut unit = UNITS[0];
    for next in UNITS.iter().skip(1).copied() {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

const fn bytes_to_f64(value: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "sizes are only displayed with two decimals"
    )]
    {
        value as f64
    }
}
