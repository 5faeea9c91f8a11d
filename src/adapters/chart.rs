//! PNG chart renderer.
//!
//! Draws the series with `embedded-graphics` primitives onto an in-memory
//! RGB raster and encodes it as PNG.  The x axis spans exactly `hours`
//! hours ending at the newest reading; the y axis covers 10..70 °C and
//! widens to fit readings outside that band, up to -100..200 °C.  Missing values break the
//! line instead of being interpolated.

use core::convert::Infallible;
use std::io::Cursor;

use chrono::{DateTime, Local, TimeDelta, Utc};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_1::FONT_6X10;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Text};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::app::ports::ChartRenderer;
use crate::error::RenderError;
use crate::store::TimeSeries;

pub const DEFAULT_WIDTH_PX: u32 = 800;
pub const DEFAULT_HEIGHT_PX: u32 = 400;

const MARGIN_LEFT_PX: i32 = 44;
const MARGIN_RIGHT_PX: i32 = 16;
const MARGIN_TOP_PX: i32 = 24;
const MARGIN_BOTTOM_PX: i32 = 28;

const Y_MIN_CELSIUS: f64 = 10.0;
const Y_MAX_CELSIUS: f64 = 70.0;
const Y_STEP_CELSIUS: f64 = 10.0;
/// Hard limits on the widened y axis; values beyond are pinned to the edge.
const Y_FLOOR_CELSIUS: f64 = -100.0;
const Y_CEIL_CELSIUS: f64 = 200.0;

const BACKGROUND: Rgb888 = Rgb888::WHITE;
const AXIS_COLOR: Rgb888 = Rgb888::BLACK;
const GRID_COLOR: Rgb888 = Rgb888::new(220, 220, 220);
const SERIES_COLOR: Rgb888 = Rgb888::new(200, 40, 40);
const SERIES_WIDTH_PX: u32 = 2;

/// `embedded-graphics` draw target backed by an `image` RGB buffer.
struct Canvas(RgbImage);

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.0.dimensions();
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) {
                if x < w && y < h {
                    self.0.put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
                }
            }
        }
        Ok(())
    }
}

/// Maps series coordinates into the plot rectangle.
struct Viewport {
    plot: Rectangle,
    start: DateTime<Utc>,
    span_secs: f64,
    y_min: f64,
    y_max: f64,
}

impl Viewport {
    fn x(&self, ts: DateTime<Utc>) -> i32 {
        let offset = ts.signed_duration_since(self.start).num_milliseconds() as f64 / 1000.0;
        let frac = (offset / self.span_secs).clamp(0.0, 1.0);
        self.plot.top_left.x + (frac * f64::from(self.plot.size.width - 1)).round() as i32
    }

    fn y(&self, celsius: f64) -> i32 {
        let frac = ((celsius - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        let bottom = self.plot.top_left.y + self.plot.size.height as i32 - 1;
        bottom - (frac * f64::from(self.plot.size.height - 1)).round() as i32
    }
}

/// Renders [`TimeSeries`] windows as PNG line charts.
#[derive(Debug, Clone, Copy)]
pub struct PngChartRenderer {
    width: u32,
    height: u32,
}

impl Default for PngChartRenderer {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH_PX,
            height: DEFAULT_HEIGHT_PX,
        }
    }
}

impl PngChartRenderer {
    pub fn with_size(width: u32, height: u32) -> Result<Self, RenderError> {
        let min_w = (MARGIN_LEFT_PX + MARGIN_RIGHT_PX) as u32 + 2;
        let min_h = (MARGIN_TOP_PX + MARGIN_BOTTOM_PX) as u32 + 2;
        if width < min_w || height < min_h {
            return Err(RenderError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    fn viewport(&self, window: &TimeSeries, hours: u32) -> Viewport {
        let plot = Rectangle::new(
            Point::new(MARGIN_LEFT_PX, MARGIN_TOP_PX),
            Size::new(
                self.width - (MARGIN_LEFT_PX + MARGIN_RIGHT_PX) as u32,
                self.height - (MARGIN_TOP_PX + MARGIN_BOTTOM_PX) as u32,
            ),
        );
        let span = TimeDelta::hours(i64::from(hours.max(1)));
        let end = window.readings().last().map_or(DateTime::UNIX_EPOCH, |r| r.timestamp);

        let (lo, hi) = window
            .iter()
            .filter_map(|r| r.value_celsius)
            .fold((Y_MIN_CELSIUS, Y_MAX_CELSIUS), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let (lo, hi) = (lo.max(Y_FLOOR_CELSIUS), hi.min(Y_CEIL_CELSIUS));
        Viewport {
            plot,
            start: end - span,
            span_secs: span.num_seconds() as f64,
            y_min: (lo / Y_STEP_CELSIUS).floor() * Y_STEP_CELSIUS,
            y_max: (hi / Y_STEP_CELSIUS).ceil() * Y_STEP_CELSIUS,
        }
    }

    fn draw(&self, canvas: &mut Canvas, window: &TimeSeries, hours: u32) -> Result<(), Infallible> {
        let vp = self.viewport(window, hours);
        let text = MonoTextStyle::new(&FONT_6X10, AXIS_COLOR);
        canvas.clear(BACKGROUND)?;

        // Horizontal grid + y labels
        let mut celsius = vp.y_min;
        while celsius <= vp.y_max {
            let y = vp.y(celsius);
            let right = vp.plot.top_left.x + vp.plot.size.width as i32 - 1;
            Line::new(Point::new(vp.plot.top_left.x, y), Point::new(right, y))
                .into_styled(PrimitiveStyle::with_stroke(GRID_COLOR, 1))
                .draw(canvas)?;
            Text::with_alignment(
                &format!("{celsius:.0}\u{00b0}C"),
                Point::new(vp.plot.top_left.x - 4, y + 3),
                text,
                Alignment::Right,
            )
            .draw(canvas)?;
            celsius += Y_STEP_CELSIUS;
        }

        // Axes
        let origin = Point::new(vp.plot.top_left.x, vp.plot.top_left.y + vp.plot.size.height as i32 - 1);
        let x_end = Point::new(origin.x + vp.plot.size.width as i32 - 1, origin.y);
        let axis = PrimitiveStyle::with_stroke(AXIS_COLOR, 1);
        Line::new(vp.plot.top_left, origin).into_styled(axis).draw(canvas)?;
        Line::new(origin, x_end).into_styled(axis).draw(canvas)?;

        // Time labels at both ends of the x axis; an empty window has no end.
        if !window.is_empty() {
            let end = vp.start + TimeDelta::hours(i64::from(hours.max(1)));
            let label_y = origin.y + 14;
            Text::new(&local_hhmm(vp.start), Point::new(origin.x, label_y), text).draw(canvas)?;
            Text::with_alignment(&local_hhmm(end), Point::new(x_end.x, label_y), text, Alignment::Right)
                .draw(canvas)?;
        }

        Text::new(
            &format!("Temperature, last {hours} h"),
            Point::new(MARGIN_LEFT_PX, MARGIN_TOP_PX - 8),
            text,
        )
        .draw(canvas)?;

        if window.iter().all(|r| r.value_celsius.is_none()) {
            let centre = vp.plot.center();
            Text::with_alignment("no data", centre, text, Alignment::Center).draw(canvas)?;
            return Ok(());
        }

        // Series: consecutive present values are joined, gaps break the line.
        let stroke = PrimitiveStyle::with_stroke(SERIES_COLOR, SERIES_WIDTH_PX);
        let mut previous: Option<Point> = None;
        for reading in window {
            let Some(value) = reading.value_celsius else {
                previous = None;
                continue;
            };
            let point = Point::new(vp.x(reading.timestamp), vp.y(value));
            match previous {
                Some(from) => Line::new(from, point).into_styled(stroke).draw(canvas)?,
                None => Line::new(point, point).into_styled(stroke).draw(canvas)?,
            }
            previous = Some(point);
        }
        Ok(())
    }
}

impl ChartRenderer for PngChartRenderer {
    fn render(&self, window: &TimeSeries, hours: u32) -> Result<Vec<u8>, RenderError> {
        let mut canvas = Canvas(RgbImage::new(self.width, self.height));
        self.draw(&mut canvas, window, hours)
            .unwrap_or_else(|never| match never {});

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(canvas.0)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(png)
    }
}

fn local_hhmm(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}
