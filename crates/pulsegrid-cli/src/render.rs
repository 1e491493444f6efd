//! Plain-text rendering of the grid and the catalog.

use std::fmt::Write;

use pulsegrid_core::{Animation, Catalog, DisplayState, Grid, Shape, COLUMNS, ROWS};

const CELL_WIDTH: usize = 8;

fn cell_label(grid: &Grid, catalog: Option<&Catalog>, row: usize, column: usize) -> String {
    match grid.read(row, column) {
        None => ".".to_string(),
        Some(id) => {
            let label = catalog
                .and_then(|c| c.get(id))
                .map(|d| d.label.as_str())
                .unwrap_or(id.as_str());
            label.chars().take(CELL_WIDTH - 2).collect()
        }
    }
}

/// Render the grid, marking the playhead column and flashing cells.
pub fn render_grid(grid: &Grid, display: &DisplayState, catalog: Option<&Catalog>) -> String {
    let mut out = String::new();

    out.push_str("    ");
    for column in 0..COLUMNS {
        let marker = if display.playhead == Some(column) { "v" } else { " " };
        let _ = write!(out, "{:^width$}", format!("{marker}{}", column + 1), width = CELL_WIDTH);
    }
    out.push('\n');

    for row in 0..ROWS {
        let _ = write!(out, " {}  ", row + 1);
        for column in 0..COLUMNS {
            let label = cell_label(grid, catalog, row, column);
            let cell = if display.is_flashing(row, column) {
                format!("*{label}*")
            } else {
                label
            };
            let _ = write!(out, "{:^width$}", cell, width = CELL_WIDTH);
        }
        out.push('\n');
    }
    out
}

fn shape_glyph(shape: Shape) -> char {
    match shape {
        Shape::Circle => 'o',
        Shape::Square => '#',
        Shape::Triangle => '^',
        Shape::Diamond => '<',
    }
}

fn animation_name(animation: Animation) -> &'static str {
    match animation {
        Animation::Pulse => "pulse",
        Animation::Bounce => "bounce",
        Animation::Spin => "spin",
    }
}

/// Render the catalog grouped by category, in first-seen order.
pub fn render_catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    for category in catalog.categories() {
        let _ = writeln!(out, "{category}:");
        for entry in catalog.in_category(category) {
            let p = entry.presentation;
            let _ = writeln!(
                out,
                "  {} {:<16} {:<24} hue {:>3}  {:<6} {:+.0}deg x{:.2}",
                shape_glyph(p.shape),
                entry.descriptor.id.as_str(),
                entry.descriptor.label,
                p.hue,
                animation_name(p.animation),
                p.rotation,
                p.scale
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsegrid_core::SoundDescriptor;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            SoundDescriptor::new("kick", "Kick", "drums", "kick.wav"),
            SoundDescriptor::new("pad", "Warm Pad Long", "synth", "pad.wav"),
            SoundDescriptor::new("snare", "Snare", "drums", "snare.wav"),
        ])
        .unwrap()
    }

    #[test]
    fn test_render_grid_marks_playhead_and_flashes() {
        let catalog = catalog();
        let grid = Grid::template(&catalog);
        let mut display = DisplayState::default();
        display.playhead = Some(0);
        display.flashing[0][0] = true;

        let text = render_grid(&grid, &display, Some(&catalog));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), ROWS + 1);
        assert!(lines[0].contains("v1"));
        assert!(lines[1].contains("*Kick*"));
        // Labels are cut to fit the cell.
        assert!(lines[2].contains("Warm P"));
        assert!(!lines[2].contains("Warm Pad"));
        assert!(lines[4].contains('.'));
    }

    #[test]
    fn test_render_catalog_groups_by_category() {
        let text = render_catalog(&catalog());
        let drums = text.find("drums:").unwrap();
        let synth = text.find("synth:").unwrap();
        let snare = text.find("snare").unwrap();
        assert!(drums < snare && snare < synth);
    }
}
