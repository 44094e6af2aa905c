//! Output formatting helpers for CLI commands
//!
//! Grounded in the teacher's `cli::output` (`comfy_table` + `colored` table
//! rendering alongside a `serde_json::to_string_pretty` JSON path); the
//! teacher's per-backend `avg_latency_ms`/`status` columns have no
//! counterpart here since there is one backend process, not a pool.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for one catalog entry, as returned by `GET /api/v1/models`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelRow {
    pub id: String,
    pub recipe: String,
    pub checkpoint: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub downloaded: bool,
}

pub fn format_models_table(models: &[ModelRow]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Model", "Recipe", "Checkpoint", "Labels", "Downloaded"]);

    for m in models {
        let downloaded = if m.downloaded {
            "yes".green().to_string()
        } else {
            "no".yellow().to_string()
        };
        table.add_row(vec![
            Cell::new(&m.id),
            Cell::new(&m.recipe),
            Cell::new(&m.checkpoint),
            Cell::new(m.labels.join(", ")),
            Cell::new(downloaded),
        ]);
    }

    table.to_string()
}

pub fn format_models_json(models: &[ModelRow]) -> String {
    serde_json::to_string_pretty(&json!({ "models": models })).unwrap()
}

pub fn status_icon(running: bool) -> &'static str {
    if running {
        "✓"
    } else {
        "✗"
    }
}
