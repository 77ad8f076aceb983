use ratatui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

use super::{Canvas, DisplayList, DrawCmd, Rgb, GLYPH_HEIGHT};

/// Upper half block: the foreground paints the top pixel, the background
/// the bottom one, so one terminal cell shows two matrix rows.
const HALF_BLOCK: &str = "\u{2580}";

const IMAGE_SIZE: i32 = 16;

/// Renders one recorded frame as a grid of half-block cells.
///
/// Shapes are rasterised into a pixel buffer first.  Text is laid over the
/// result as terminal characters, one cell per glyph, on the cell row that
/// holds the glyph's middle line.
pub struct MatrixWidget<'a> {
    frame: &'a DisplayList,
}

impl<'a> MatrixWidget<'a> {
    pub fn new(frame: &'a DisplayList) -> Self {
        Self { frame }
    }

    /// Terminal cells needed to show the whole matrix.
    pub fn size(frame: &DisplayList) -> (u16, u16) {
        let w = frame.width().max(0) as u16;
        let h = frame.height().max(0) as u16;
        (w, h.div_ceil(2))
    }
}

impl Widget for MatrixWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (pixels, labels) = rasterize(self.frame);

        for row in 0..area.height {
            let top_y = i32::from(row) * 2;
            if top_y >= pixels.height {
                break;
            }
            for col in 0..area.width.min(pixels.width as u16) {
                let x = i32::from(col);
                let top = pixels.get(x, top_y);
                let bottom = pixels.get(x, top_y + 1);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(HALF_BLOCK)
                        .set_fg(Color::from(top))
                        .set_bg(Color::from(bottom));
                }
            }
        }

        for label in &labels {
            let row = (label.y + GLYPH_HEIGHT / 2).div_euclid(2);
            if row < 0 || row >= i32::from(area.height) || label.y + GLYPH_HEIGHT / 2 >= pixels.height {
                continue;
            }
            for (i, ch) in label.text.chars().enumerate() {
                let col = label.x + i as i32;
                if col < 0 || col >= i32::from(area.width) || col >= pixels.width {
                    continue;
                }
                let bg = pixels.get(col, row * 2 + 1);
                if let Some(cell) = buf.cell_mut((area.x + col as u16, area.y + row as u16)) {
                    cell.set_char(ch)
                        .set_fg(Color::from(label.color))
                        .set_bg(Color::from(bg));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rasterising
// ---------------------------------------------------------------------------

struct Label {
    x: i32,
    y: i32,
    text: String,
    color: Rgb,
}

struct Pixels {
    width: i32,
    height: i32,
    data: Vec<Rgb>,
}

impl Pixels {
    fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            data: vec![Rgb::BLACK; (width * height) as usize],
        }
    }

    fn get(&self, x: i32, y: i32) -> Rgb {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return Rgb::BLACK;
        }
        self.data[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        self.data[(y * self.width + x) as usize] = color;
    }

    fn fill(&mut self, color: Rgb) {
        self.data.fill(color);
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(self.width);
        let y1 = y.saturating_add(h).min(self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.set(px, py, color);
            }
        }
    }

    /// Bresenham.
    fn line(&mut self, mut x0: i32, mut y0: i32, x1: i32, y1: i32, color: Rgb) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        self.line(x0, y0, x1, y0, color);
        self.line(x1, y0, x1, y1, color);
        self.line(x1, y1, x0, y1, color);
        self.line(x0, y1, x0, y0, color);
    }

    fn circle(&mut self, cx: i32, cy: i32, radius: f32, color: Rgb) {
        if radius <= 0.0 {
            self.set(cx, cy, color);
            return;
        }
        let steps = ((radius * std::f32::consts::TAU).ceil() as i32 * 2).max(8);
        for i in 0..steps {
            let angle = i as f32 / steps as f32 * std::f32::consts::TAU;
            let x = cx as f32 + radius * angle.cos();
            let y = cy as f32 + radius * angle.sin();
            self.set(x.round() as i32, y.round() as i32, color);
        }
    }
}

fn rasterize(frame: &DisplayList) -> (Pixels, Vec<Label>) {
    let mut pixels = Pixels::new(frame.width(), frame.height());
    let mut labels = Vec::new();

    for cmd in frame.commands() {
        match cmd {
            DrawCmd::FillScreen(color) => {
                pixels.fill(*color);
                labels.clear();
            }
            DrawCmd::FillRect { x, y, w, h, color } => pixels.fill_rect(*x, *y, *w, *h, *color),
            DrawCmd::Rect { x0, y0, x1, y1, color } => pixels.rect(*x0, *y0, *x1, *y1, *color),
            DrawCmd::Line { x0, y0, x1, y1, color } => pixels.line(*x0, *y0, *x1, *y1, *color),
            DrawCmd::Circle { cx, cy, radius, color } => pixels.circle(*cx, *cy, *radius, *color),
            DrawCmd::Text { x, y, text, color } => labels.push(Label {
                x: *x,
                y: *y,
                text: text.clone(),
                color: *color,
            }),
            DrawCmd::Image { x, y, path } => {
                // No decoder on a terminal; show the frame and the file stem.
                pixels.rect(*x, *y, x + IMAGE_SIZE - 1, y + IMAGE_SIZE - 1, Rgb::LIGHT_GREY);
                let stem = path
                    .rsplit('/')
                    .next()
                    .and_then(|name| name.split('.').next())
                    .unwrap_or(path.as_str());
                labels.push(Label {
                    x: x + 1,
                    y: y + IMAGE_SIZE / 2 - GLYPH_HEIGHT / 2,
                    text: stem.to_string(),
                    color: Rgb::LIGHT_GREY,
                });
            }
        }
    }
    (pixels, labels)
}
