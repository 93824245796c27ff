// Drawing backend wrapper that renders text with a built-in 5x7 pixel font.
// Raster targets built without a system font feature would otherwise drop
// labels silently, and font loading can panic on hosts without fonts.

use std::panic;

use plotters_backend::{
    text_anchor, BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend,
    DrawingErrorKind,
};

pub struct GlyphTextBackend<DB> {
    inner: DB,
    always: bool,
}

impl<DB> GlyphTextBackend<DB> {
    /// Use the pixel font for every label.
    pub fn new(inner: DB) -> Self {
        Self {
            inner,
            always: true,
        }
    }

    /// Use the inner backend's text path, falling back to the pixel font
    /// only if it panics.
    pub fn fallback_only(inner: DB) -> Self {
        Self {
            inner,
            always: false,
        }
    }
}

impl<DB: DrawingBackend> DrawingBackend for GlyphTextBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        if self.always {
            return self.draw_glyph_text(text, style, pos);
        }
        match panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.inner.draw_text(text, style, pos)
        })) {
            Ok(result) => result,
            Err(_) => self.draw_glyph_text(text, style, pos),
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        if !self.always {
            return self.inner.estimate_text_size(text, style);
        }
        let scale = glyph_scale(style.size());
        let height = if text.is_empty() { 0 } else { GLYPH_HEIGHT as i32 * scale };
        Ok(((text_width(text) * scale) as u32, height as u32))
    }
}

impl<DB: DrawingBackend> GlyphTextBackend<DB> {
    fn draw_glyph_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 || text.trim().is_empty() {
            return Ok(());
        }

        let scale = glyph_scale(style.size());
        let width = text_width(text) * scale;
        let height = GLYPH_HEIGHT as i32 * scale;
        let dx = match style.anchor().h_pos {
            text_anchor::HPos::Left => 0,
            text_anchor::HPos::Right => -width,
            text_anchor::HPos::Center => -width / 2,
        };
        let dy = match style.anchor().v_pos {
            text_anchor::VPos::Top => 0,
            text_anchor::VPos::Center => -(height / 2),
            text_anchor::VPos::Bottom => -height,
        };

        let mut cursor_x = pos.0 + dx;
        let top = pos.1 + dy;
        for ch in text.chars() {
            match glyph(ch) {
                Some(g) => {
                    for (row, pattern) in g.rows.iter().copied().enumerate() {
                        for col in 0..g.width {
                            if (pattern >> (g.width - 1 - col)) & 1 != 0 {
                                self.fill_block(
                                    cursor_x + col as i32 * scale,
                                    top + row as i32 * scale,
                                    scale,
                                    color.clone(),
                                )?;
                            }
                        }
                    }
                    cursor_x += scale * (g.width as i32 + 1);
                }
                None => cursor_x += scale * SPACE_WIDTH,
            }
        }
        Ok(())
    }

    fn fill_block(
        &mut self,
        x: i32,
        y: i32,
        scale: i32,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        for dx in 0..scale {
            for dy in 0..scale {
                self.inner.draw_pixel((x + dx, y + dy), color.clone())?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct Glyph {
    width: u8,
    rows: [u8; GLYPH_HEIGHT],
}

const GLYPH_HEIGHT: usize = 7;
const SPACE_WIDTH: i32 = 3;

/// Integer pixel scale so a glyph is roughly as tall as the requested font.
fn glyph_scale(font_px: f64) -> i32 {
    (font_px / GLYPH_HEIGHT as f64).round().max(1.0) as i32
}

fn text_width(text: &str) -> i32 {
    let total: i32 = text
        .chars()
        .map(|ch| match glyph(ch) {
            Some(g) => g.width as i32 + 1,
            None => SPACE_WIDTH,
        })
        .sum();
    // no spacing column after the last glyph
    (total - 1).max(0)
}

fn glyph(ch: char) -> Option<Glyph> {
    let rows = |width: u8, rows: [u8; GLYPH_HEIGHT]| Some(Glyph { width, rows });
    match ch.to_ascii_uppercase() {
        '0' => rows(5, [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => rows(5, [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => rows(5, [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => rows(5, [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110]),
        '4' => rows(5, [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => rows(5, [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => rows(5, [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => rows(5, [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => rows(5, [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => rows(5, [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        'K' => rows(5, [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'M' => rows(5, [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
        '.' => rows(1, [0b0, 0b0, 0b0, 0b0, 0b0, 0b0, 0b1]),
        '-' => rows(3, [0b000, 0b000, 0b000, 0b111, 0b000, 0b000, 0b000]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_characters_have_glyphs() {
        for ch in "0123456789.-km".chars() {
            assert!(glyph(ch).is_some(), "missing glyph for {:?}", ch);
        }
        assert!(glyph(' ').is_none());
    }

    #[test]
    fn glyph_rows_fit_declared_width() {
        for ch in "0123456789.-KM".chars() {
            let g = glyph(ch).unwrap();
            for row in g.rows {
                assert!(u32::from(row) < (1u32 << g.width), "{:?}", ch);
            }
        }
    }

    #[test]
    fn text_width_counts_spacing() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("1"), 5);
        assert_eq!(text_width("12"), 11);
        assert_eq!(text_width("6 km"), 6 + 3 + 6 + 5);
    }

    #[test]
    fn text_size_matches_pixel_font() {
        use plotters::prelude::*;
        use plotters::style::{FontDesc, FontFamily, FontStyle};

        let mut buf = vec![0u8; 10 * 10 * 3];
        let backend = GlyphTextBackend::new(BitMapBackend::with_buffer(&mut buf, (10, 10)));
        let style = TextStyle::from(FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal));
        assert_eq!(backend.get_size(), (10, 10));
        assert_eq!(backend.estimate_text_size("6 km", &style).unwrap(), (40, 14));
        assert_eq!(backend.estimate_text_size("", &style).unwrap(), (0, 0));
    }

    #[test]
    fn scale_tracks_font_size() {
        assert_eq!(glyph_scale(14.0), 2);
        assert_eq!(glyph_scale(3.0), 1);
        assert_eq!(glyph_scale(28.0), 4);
    }
}
