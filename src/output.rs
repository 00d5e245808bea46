//! Rendering of query results for the command-line runner.

use crate::db::{QueryResult, RowSet, Value};

/// How the runner prints a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned plain-text table.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Renders a result in the given format.
pub fn render(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(result),
        OutputFormat::Json => render_json(result),
    }
}

/// Renders a result as pretty JSON.
pub fn render_json(result: &QueryResult) -> String {
    serde_json::to_string_pretty(&result.to_json()).unwrap_or_else(|_| "null".to_string())
}

/// Renders a result as plain text.
pub fn render_text(result: &QueryResult) -> String {
    match result {
        QueryResult::Rows(rows) => render_table(rows),
        QueryResult::Row(None) | QueryResult::Scalar(None) => "(no rows)".to_string(),
        QueryResult::Row(Some(record)) => {
            let width = record.columns.iter().map(|c| c.len()).max().unwrap_or(0);
            record
                .iter()
                .map(|(name, value)| format!("{name:<width$} | {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        QueryResult::Column(values) => values
            .iter()
            .map(Value::to_display_string)
            .collect::<Vec<_>>()
            .join("\n"),
        QueryResult::Scalar(Some(value)) => value.to_display_string(),
        QueryResult::Affected(n) => {
            let noun = if *n == 1 { "row" } else { "rows" };
            format!("{n} {noun} affected")
        }
    }
}

fn render_table(rows: &RowSet) -> String {
    let headers = rows.column_names();
    let cells: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_display_string).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let format_line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![
        format_line(headers.as_slice()),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    lines.extend(cells.iter().map(|row| format_line(row.as_slice())));

    let noun = if rows.len() == 1 { "row" } else { "rows" };
    lines.push(format!("({} {noun})", rows.len()));
    lines.join("\n")
}
