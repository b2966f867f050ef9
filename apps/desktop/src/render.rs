use std::io::{self, Write};

use anyhow::Result;
use client_core::{SeatRenderer, SeatTile, SeatView};

const COLUMNS: usize = 4;
const CELL_WIDTH: usize = 20;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Redraws the whole grid on every view.
pub struct TerminalRenderer<W> {
    out: W,
    clear: bool,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), true)
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W, clear: bool) -> Self {
        Self { out, clear }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SeatRenderer for TerminalRenderer<W> {
    fn render(&mut self, view: &SeatView) -> Result<()> {
        if self.clear {
            write!(self.out, "{CLEAR_SCREEN}")?;
        }
        write!(self.out, "{}", render_to_string(view))?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn render_to_string(view: &SeatView) -> String {
    let mut out = format!(
        "Seats {}  occupied {} / {}  available {}\n",
        view.now.format("%H:%M:%S"),
        view.occupied,
        view.total,
        view.available
    );

    let tabs: Vec<String> = view
        .tabs
        .iter()
        .map(|tab| {
            let text = format!("{} {}/{}", tab.zone, tab.occupied, tab.total);
            if tab.active {
                format!("[{text}]")
            } else {
                format!(" {text} ")
            }
        })
        .collect();
    out.push_str(&tabs.join(" "));
    out.push('\n');

    for row in view.tiles.chunks(COLUMNS) {
        let cells: Vec<String> = row.iter().map(tile_cell).collect();
        out.push_str(cells.join("").trim_end());
        out.push('\n');
    }
    out
}

fn tile_cell(tile: &SeatTile) -> String {
    let mut cell = format!("{} {}", tile.label, tile.status_text());
    if let Some(elapsed) = &tile.elapsed {
        cell.push(' ');
        cell.push_str(elapsed);
    }
    let width = cell.chars().count();
    if width < CELL_WIDTH {
        cell.push_str(&" ".repeat(CELL_WIDTH - width));
    } else {
        cell.push(' ');
    }
    cell
}
