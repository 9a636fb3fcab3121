//! CLI presentation: text and json formatters per command.

use crate::error::ApiError;
use crate::queue::RunSummary;
use crate::store::Tile;
use crate::tree::{NodeRole, NodeStatus, ResultTree, WeightIssue};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct NodeStatusRow {
    id: String,
    role: &'static str,
    status: &'static str,
    weight: f64,
    result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_file: Option<String>,
}

fn status_rows(tree: &ResultTree) -> Vec<(usize, NodeStatusRow)> {
    tree.preorder()
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            let depth = match node.role {
                NodeRole::Analysis => 0,
                _ => tree.path_to_root(id).len(),
            };
            let row = NodeStatusRow {
                id: node.id(),
                role: node.role.as_str(),
                status: tree.status(id).as_str(),
                weight: tree.weight(id),
                result: node.result_text().to_string(),
                result_file: node.result_file().map(str::to_string),
            };
            (depth, row)
        })
        .collect()
}

fn colored_glyph(status: NodeStatus) -> String {
    let glyph = status.glyph();
    match status {
        NodeStatus::Completed => glyph.green().to_string(),
        NodeStatus::Error => glyph.red().to_string(),
        NodeStatus::Canceled => glyph.yellow().to_string(),
        NodeStatus::Queued | NodeStatus::Running => glyph.cyan().to_string(),
        NodeStatus::Excluded => glyph.dimmed().to_string(),
        NodeStatus::NotRun => glyph.to_string(),
    }
}

pub fn format_status_text(tree: &ResultTree) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Node", "Role", "Weight", "Result"]);
    for (id, (depth, row)) in tree.preorder().into_iter().zip(status_rows(tree)) {
        table.add_row(vec![
            colored_glyph(tree.status(id)),
            format!("{}{}", "  ".repeat(depth), row.id),
            row.role.to_string(),
            format!("{:.3}", row.weight),
            row.result,
        ]);
    }
    format!("{}", table)
}

pub fn format_status_json(tree: &ResultTree) -> Result<String, ApiError> {
    let rows: Vec<NodeStatusRow> = status_rows(tree).into_iter().map(|(_, row)| row).collect();
    serde_json::to_string_pretty(&rows)
        .map_err(|e| ApiError::ConfigError(format!("Failed to encode status: {}", e)))
}

pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Phase", "Queued", "Completed", "Failed", "Canceled", "Skipped"]);
    for phase in &summary.phases {
        table.add_row(vec![
            phase.phase.to_string(),
            phase.queued.to_string(),
            phase.completed.to_string(),
            phase.failed.to_string(),
            phase.canceled.to_string(),
            phase.skipped.to_string(),
        ]);
    }
    let mut out = format!("{}\n", table);
    if summary.canceled {
        out.push_str(&format!("{}\n", "Run canceled".yellow()));
    } else if summary.failed() > 0 {
        out.push_str(&format!("{} workflow(s) failed\n", summary.failed().red()));
    } else {
        out.push_str(&format!("{}\n", "Run completed".green()));
    }
    out
}

pub fn format_tiles_text(tiles: &[Tile]) -> String {
    if tiles.is_empty() {
        return "No tiles. Run geest prepare to build the study area.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Index", "Name", "Cells", "Bounds", "Progress"]);
    for tile in tiles {
        let bbox = tile.bbox.to_bbox();
        table.add_row(vec![
            tile.index.to_string(),
            tile.name.clone(),
            format!("{}x{}", tile.bbox.width(), tile.bbox.height()),
            format!(
                "({}, {}) - ({}, {})",
                bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
            ),
            format!("{:.1}%", tile.progress),
        ]);
    }
    format!("{}", table)
}

pub fn format_validation_text(issues: &[WeightIssue], unsupported: &[String]) -> String {
    if issues.is_empty() && unsupported.is_empty() {
        return format!("{} Model is valid", "✔".green());
    }
    let mut out = String::new();
    for issue in issues {
        out.push_str(&format!("{} {}\n", "!".yellow(), issue));
    }
    for message in unsupported {
        out.push_str(&format!("{} {}\n", "!".red(), message));
    }
    out.trim_end().to_string()
}
