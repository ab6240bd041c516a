//! Drawing surface for the render loop.

use std::io::{self, Write};

use skytrack_core::ScreenPoint;

const ARROWS: [char; 8] = ['↑', '↗', '→', '↘', '↓', '↙', '←', '↖'];
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub trait Canvas {
    /// Drawable area in canvas units.
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn caption(&mut self, text: &str);
    /// Marker at `at` pointing along `heading_deg`, labelled with `label`.
    fn draw_marker(&mut self, at: ScreenPoint, heading_deg: f64, label: &str);
    fn present(&mut self) -> io::Result<()>;
}

/// Arrow glyph for a compass heading, nearest of eight.
pub fn heading_glyph(heading_deg: f64) -> char {
    let sector = ((heading_deg.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    ARROWS[sector]
}

/// Character-cell canvas; one cell per canvas unit.
pub struct TextCanvas {
    width: usize,
    height: usize,
    cells: Vec<Vec<char>>,
    caption: String,
    out: Box<dyn Write + Send>,
    clear_screen: bool,
}

impl TextCanvas {
    pub fn new(width: usize, height: usize, out: Box<dyn Write + Send>) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![vec![' '; width]; height],
            caption: String::new(),
            out,
            clear_screen: false,
        }
    }

    /// Terminal canvas that repaints in place.
    pub fn stdout(width: usize, height: usize) -> Self {
        let mut canvas = Self::new(width, height, Box::new(io::stdout()));
        canvas.clear_screen = true;
        canvas
    }

    pub fn render_to_string(&self) -> String {
        let border = format!("+{}+", "-".repeat(self.width));
        let mut text = String::new();
        text.push_str(&self.caption);
        text.push('\n');
        text.push_str(&border);
        text.push('\n');
        for row in &self.cells {
            text.push('|');
            text.extend(row.iter());
            text.push_str("|\n");
        }
        text.push_str(&border);
        text.push('\n');
        text
    }

    fn cell(&self, coordinate: f64, extent: usize) -> usize {
        (coordinate.floor().max(0.0) as usize).min(extent - 1)
    }
}

impl Canvas for TextCanvas {
    fn size(&self) -> (f64, f64) {
        (self.width as f64, self.height as f64)
    }

    fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(' ');
        }
    }

    fn caption(&mut self, text: &str) {
        self.caption = text.to_string();
    }

    fn draw_marker(&mut self, at: ScreenPoint, heading_deg: f64, label: &str) {
        if !at.x.is_finite() || !at.y.is_finite() {
            return;
        }
        let col = self.cell(at.x, self.width);
        let row = self.cell(at.y, self.height);
        self.cells[row][col] = heading_glyph(heading_deg);

        // Label follows a one-cell gap, clipped at the right edge.
        for (offset, ch) in label.chars().enumerate() {
            let c = col + 2 + offset;
            if c >= self.width {
                break;
            }
            self.cells[row][c] = ch;
        }
    }

    fn present(&mut self) -> io::Result<()> {
        let frame = self.render_to_string();
        if self.clear_screen {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}
