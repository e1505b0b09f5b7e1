// Rendering helpers for the CLI: plain tables, pretty JSON and coloured
// status lines.

use crate::models::{Chapter, CreativeTonie, Household};
use crate::presets::{ActionOutput, ActionReport, ActionStatus};
use crossterm::style::Stylize;
use serde::Serialize;

/// Left-aligned columns separated by two spaces, with a dashed rule.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "No data.".to_string();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![
        line(headers.iter().map(|h| h.to_string()).collect()),
        line(widths.iter().map(|w| "-".repeat(*w)).collect()),
    ];
    out.extend(rows.iter().map(|r| line(r.clone())));
    out.join("\n")
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{}", message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow());
}

pub fn household_row(h: &Household) -> Vec<String> {
    let access = serde_json::to_value(h.access)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    vec![h.id.clone(), h.name.clone(), h.owner_name.clone(), access]
}

pub fn tonie_row(t: &CreativeTonie) -> Vec<String> {
    vec![
        t.id.clone(),
        t.name.clone(),
        t.chapters_present.to_string(),
        format!("{:.0}s", t.seconds_present),
        format!("{:.0}s", t.seconds_remaining),
    ]
}

pub fn chapter_row(index: usize, c: &Chapter) -> Vec<String> {
    vec![
        (index + 1).to_string(),
        c.id.clone(),
        c.title.clone(),
        format!("{:.0}s", c.seconds),
    ]
}

pub fn report_row(r: &ActionReport) -> Vec<String> {
    let (status, detail) = match &r.status {
        ActionStatus::Success { result } => {
            let (verb, names) = match result {
                ActionOutput::Shuffled(n) => ("shuffled", n),
                ActionOutput::Cleared(n) => ("cleared", n),
                ActionOutput::Uploaded(n) => ("uploaded", n),
            };
            ("ok", format!("{verb}: {}", names.join(", ")))
        }
        ActionStatus::Error { error } => ("error", error.clone()),
    };
    vec![
        r.action.clone(),
        r.target.clone().unwrap_or_default(),
        status.to_string(),
        detail,
    ]
}
