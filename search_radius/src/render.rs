//! Radius map rendering.
//!
//! The search circle is scaled linearly so it never exceeds 40% of the
//! shorter surface dimension. Radii below 1 km are drawn at the 1 km scale,
//! which keeps tiny radii visible and avoids dividing by zero.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::text_anchor::{HPos, Pos, VPos};
use plotters_backend::DrawingBackend;
use tracing::debug;

use crate::RadiusError;

pub const SEARCH_RED: RGBColor = RGBColor(211, 47, 47);
const LABEL_GREY: RGBColor = RGBColor(0x33, 0x33, 0x33);
const FILL_ALPHA: f64 = 0.2;
const STROKE_WIDTH: u32 = 2;
const MARKER_RADIUS_PX: i32 = 6;
const LABEL_FONT_PX: f64 = 14.0;
const LABEL_OFFSET_PX: f64 = 20.0;
const FIT_FRACTION: f64 = 0.4;
const MIN_SCALE_RADIUS_KM: f64 = 1.0;

/// Pixel geometry of one radius map.
#[derive(Clone, Debug, PartialEq)]
pub struct RadiusLayout {
    /// Shorter surface dimension; the map occupies the `size x size` square
    /// anchored at the top-left corner.
    pub size: u32,
    pub center: (f64, f64),
    /// Pixels per km.
    pub scale: f64,
    pub circle_px: f64,
    pub label: String,
    /// Horizontal center and baseline of the label.
    pub label_anchor: (f64, f64),
}

impl RadiusLayout {
    /// `None` for a surface with no area.
    pub fn compute(width: u32, height: u32, radius_km: f64) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let radius = if radius_km.is_finite() {
            radius_km.max(0.0)
        } else {
            0.0
        };
        let size = width.min(height);
        let half = size as f64 / 2.0;
        let scale = size as f64 * FIT_FRACTION / radius.max(MIN_SCALE_RADIUS_KM);
        let circle_px = radius * scale;
        Some(Self {
            size,
            center: (half, half),
            scale,
            circle_px,
            label: format!("{} km", radius),
            label_anchor: (half, half + circle_px + LABEL_OFFSET_PX),
        })
    }
}

fn to_px(value: f64) -> i32 {
    value.round() as i32
}

fn render_err<E>(err: DrawingAreaErrorKind<E>) -> RadiusError
where
    E: std::error::Error + Send + Sync,
{
    RadiusError::Render(err.to_string())
}

/// Repaint `area` with the search circle for `radius_km`.
///
/// A zero-sized area is reported as [`RadiusError::RenderTargetUnavailable`]
/// and left untouched.
pub fn draw_radius<DB>(
    area: &DrawingArea<DB, Shift>,
    radius_km: f64,
) -> Result<RadiusLayout, RadiusError>
where
    DB: DrawingBackend,
{
    let (width, height) = area.dim_in_pixel();
    let layout = RadiusLayout::compute(width, height, radius_km)
        .ok_or(RadiusError::RenderTargetUnavailable { width, height })?;

    let center = (to_px(layout.center.0), to_px(layout.center.1));
    let circle_px = to_px(layout.circle_px);

    area.fill(&WHITE).map_err(render_err)?;
    area.draw(&Circle::new(
        center,
        circle_px,
        SEARCH_RED.mix(FILL_ALPHA).filled(),
    ))
    .map_err(render_err)?;
    area.draw(&Circle::new(
        center,
        circle_px,
        SEARCH_RED.stroke_width(STROKE_WIDTH),
    ))
    .map_err(render_err)?;
    area.draw(&Circle::new(center, MARKER_RADIUS_PX, SEARCH_RED.filled()))
        .map_err(render_err)?;

    let label_style = FontDesc::new(FontFamily::SansSerif, LABEL_FONT_PX, FontStyle::Normal)
        .color(&LABEL_GREY)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    area.draw(&Text::new(
        layout.label.clone(),
        (to_px(layout.label_anchor.0), to_px(layout.label_anchor.1)),
        label_style,
    ))
    .map_err(render_err)?;

    area.present().map_err(render_err)?;
    debug!(
        width,
        height,
        scale = layout.scale,
        circle_px = layout.circle_px,
        "drew radius map: {}",
        layout.label
    );
    Ok(layout)
}
