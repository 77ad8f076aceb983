//! The pixel-drawing collaborator.
//!
//! Effects draw through the [`Canvas`] trait with coordinates and colours
//! they have already computed.  The only canvas the program uses is
//! [`DisplayList`], which records one frame of commands; [`MatrixWidget`]
//! then rasterises that frame into the terminal.
//!
//! ## For contributors
//!
//! * Coordinates are matrix pixels with the origin at the top-left.  Drawing
//!   outside the matrix is allowed and clipped by the widget.
//! * Text uses a fixed 5x7 glyph cell ([`GLYPH_WIDTH`] x [`GLYPH_HEIGHT`])
//!   with one pixel of spacing, so effects can right-align or centre labels
//!   without asking the canvas for metrics.
//! * A new primitive needs a [`Canvas`] method, a [`DrawCmd`] variant and a
//!   match arm in `widget.rs`.

mod widget;

pub use widget::MatrixWidget;

pub const GLYPH_WIDTH: i32 = 5;
pub const GLYPH_HEIGHT: i32 = 7;

/// Horizontal advance of one character.
pub const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

/// Pixel width of `text` when drawn with [`Canvas::draw_text`].
pub fn text_width(text: &str) -> i32 {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        0
    } else {
        chars * GLYPH_ADVANCE - 1
    }
}

/// An opaque 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const LIGHT_GREEN: Rgb = Rgb::new(144, 238, 144);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const GREY: Rgb = Rgb::new(128, 128, 128);
    pub const LIGHT_GREY: Rgb = Rgb::new(211, 211, 211);
    pub const NAVY: Rgb = Rgb::new(0, 0, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.r, c.g, c.b)
    }
}

/// Drawing primitives available to effects.
pub trait Canvas {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    fn fill_screen(&mut self, color: Rgb);
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb);
    /// Outline of the rectangle spanning the two corners, inclusive.
    fn draw_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb);
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb);
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: f32, color: Rgb);
    /// Draw `text` with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgb);
    /// Draw the image at `path` with its top-left corner at `(x, y)`.
    fn draw_image(&mut self, x: i32, y: i32, path: &str);
}

// ---------------------------------------------------------------------------
// DisplayList
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    FillScreen(Rgb),
    FillRect { x: i32, y: i32, w: i32, h: i32, color: Rgb },
    Rect { x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb },
    Line { x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb },
    Circle { cx: i32, cy: i32, radius: f32, color: Rgb },
    Text { x: i32, y: i32, text: String, color: Rgb },
    Image { x: i32, y: i32, path: String },
}

/// A canvas that records the commands of one frame.
#[derive(Debug, Clone)]
pub struct DisplayList {
    width: i32,
    height: i32,
    commands: Vec<DrawCmd>,
}

impl DisplayList {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width: i32::from(width),
            height: i32::from(height),
            commands: Vec::new(),
        }
    }

    /// Start a new frame, keeping the allocation.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Change the matrix size; clears the list.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = i32::from(width);
        self.height = i32::from(height);
        self.commands.clear();
    }

    pub fn commands(&self) -> &[DrawCmd] {
        &self.commands
    }

    /// All text drawn this frame, in order.
    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCmd::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Canvas for DisplayList {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn fill_screen(&mut self, color: Rgb) {
        self.commands.push(DrawCmd::FillScreen(color));
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb) {
        self.commands.push(DrawCmd::FillRect { x, y, w, h, color });
    }

    fn draw_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        self.commands.push(DrawCmd::Rect { x0, y0, x1, y1, color });
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        self.commands.push(DrawCmd::Line { x0, y0, x1, y1, color });
    }

    fn draw_circle(&mut self, cx: i32, cy: i32, radius: f32, color: Rgb) {
        self.commands.push(DrawCmd::Circle { cx, cy, radius, color });
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgb) {
        self.commands.push(DrawCmd::Text {
            x,
            y,
            text: text.to_string(),
            color,
        });
    }

    fn draw_image(&mut self, x: i32, y: i32, path: &str) {
        self.commands.push(DrawCmd::Image {
            x,
            y,
            path: path.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_width_counts_spacing_between_glyphs() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("A"), 5);
        assert_eq!(text_width("AAPL"), 23);
    }

    #[test]
    fn display_list_records_in_order_and_clears() {
        let mut list = DisplayList::new(64, 32);
        list.fill_screen(Rgb::BLACK);
        list.draw_text(1, 2, "HI", Rgb::WHITE);
        list.draw_line(0, 0, 63, 31, Rgb::RED);

        assert_eq!(list.commands().len(), 3);
        assert_eq!(list.commands()[0], DrawCmd::FillScreen(Rgb::BLACK));
        assert_eq!(list.texts().collect::<Vec<_>>(), ["HI"]);

        list.clear();
        assert!(list.commands().is_empty());
        assert_eq!((list.width(), list.height()), (64, 32));
    }

    #[test]
    fn rgb_converts_to_terminal_colour() {
        let color: ratatui::style::Color = Rgb::NAVY.into();
        assert_eq!(color, ratatui::style::Color::Rgb(0, 0, 128));
    }
}
