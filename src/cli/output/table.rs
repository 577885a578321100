//! Table output formatting for CLI commands
//!
//! Renders queue statistics and execution results with comfy-table.
//! Respects `NO_COLOR` and dumb terminals.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{ExecutionResult, QueueStats};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Final counters of a hive run.
    pub fn format_queue_stats(&self, stats: &QueueStats) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("State").add_attribute(Attribute::Bold),
            Cell::new("Items").add_attribute(Attribute::Bold),
        ]);

        let rows = [
            ("queued", stats.queued, Color::Yellow),
            ("processing", stats.processing, Color::Cyan),
            ("completed", stats.completed, Color::Green),
            ("failed", stats.failed, Color::Red),
        ];
        for (label, count, color) in rows {
            table.add_row(vec![self.colored(label, color), Cell::new(count)]);
        }
        if !stats.processing_items.is_empty() {
            let items = stats
                .processing_items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            table.add_row(vec![Cell::new("in flight"), Cell::new(items)]);
        }
        table.to_string()
    }

    /// Summary of a single solve.
    pub fn format_execution_result(&self, result: &ExecutionResult) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        let outcome = if result.success {
            self.colored("✓ success", Color::Green)
        } else {
            self.colored("✗ failed", Color::Red)
        };
        table.add_row(vec![Cell::new("Outcome"), outcome]);
        table.add_row(vec![
            Cell::new("Session"),
            Cell::new(result.session_id.as_deref().unwrap_or("-")),
        ]);
        if let Some(class) = result.failure_class {
            table.add_row(vec![Cell::new("Failure"), self.colored(class.as_str(), Color::Red)]);
        }
        if result.limit_reached {
            let reset = result.limit_reset_time.as_deref().unwrap_or("unknown");
            table.add_row(vec![
                Cell::new("Usage limit"),
                self.colored(format!("resets {reset}"), Color::Yellow),
            ]);
        }
        table.add_row(vec![Cell::new("Attempts"), Cell::new(result.attempts.len())]);
        table.add_row(vec![Cell::new("Messages"), Cell::new(result.message_count)]);
        table.add_row(vec![Cell::new("Tool uses"), Cell::new(result.tool_use_count)]);
        if let Some(cost) = result.cost_estimate_usd {
            table.add_row(vec![Cell::new("Cost"), Cell::new(format!("${cost:.4}"))]);
        }
        if let Some(text) = result.result_text.as_deref() {
            table.add_row(vec![Cell::new("Result"), Cell::new(truncate_text(text, 200))]);
        }
        table.to_string()
    }

    fn colored(&self, text: impl ToString, color: Color) -> Cell {
        let cell = Cell::new(text.to_string());
        if self.use_colors {
            cell.fg(color)
        } else {
            cell
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

/// Truncate on a char boundary, appending an ellipsis.
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}
