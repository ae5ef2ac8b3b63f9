//! SVG serialization: path data, path elements and the viewbox.

use crate::{Bounds, LineStyle, Point};
use std::fmt::Write as _;

/// Accumulates SVG path data (`d` attribute) at a fixed precision and tracks the bounds of
/// every coordinate it writes, control points included.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    d: String,
    precision: usize,
    bounds: Option<Bounds>,
    segments: usize,
}

impl PathBuilder {
    #[must_use]
    pub fn new(precision: usize) -> Self {
        Self {
            d: String::new(),
            precision,
            bounds: None,
            segments: 0,
        }
    }

    pub fn move_to(&mut self, p: Point) {
        self.d.push('M');
        self.coord(p);
    }

    pub fn line_to(&mut self, p: Point) {
        self.d.push('L');
        self.coord(p);
        self.segments += 1;
    }

    pub fn quad_to(&mut self, control: Point, p: Point) {
        self.d.push('Q');
        self.coord(control);
        self.d.push(',');
        self.coord(p);
        self.segments += 1;
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.d.push('C');
        self.coord(c1);
        self.d.push(',');
        self.coord(c2);
        self.d.push(',');
        self.coord(p);
        self.segments += 1;
    }

    fn coord(&mut self, p: Point) {
        let precision = self.precision;
        // Writing to a String cannot fail.
        let _ = write!(self.d, "{:.precision$},{:.precision$}", p.x, p.y);
        self.bounds = Bounds::merge(self.bounds, Some(Bounds::point(p)));
    }

    #[must_use]
    pub fn segments(&self) -> usize {
        self.segments
    }

    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    #[must_use]
    pub fn data(&self) -> &str {
        &self.d
    }

    /// Wrap the path data in a `<path>` element, or return an empty string when no segment
    /// was drawn.
    #[must_use]
    pub fn into_element(self, style: LineStyle, stroke_width: f64) -> String {
        if self.segments == 0 {
            return String::new();
        }
        path_element(&self.d, style, stroke_width)
    }
}

/// A single `<path>` element, newline terminated.
#[must_use]
pub fn path_element(d: &str, style: LineStyle, stroke_width: f64) -> String {
    format!(
        "<path class=\"{}\" d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{stroke_width}\" />\n",
        style.as_str(),
        style.stroke()
    )
}

/// Outward-rounded viewbox `"min-x min-y width height"` at `precision` decimals.
///
/// Values are snapped to whole units of `10^-precision`: minima round down and maxima
/// round up, so every coordinate written at the same precision falls inside the box.
#[must_use]
pub fn viewbox(bounds: &Bounds, precision: usize) -> String {
    let scale = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    #[allow(clippy::cast_possible_truncation)]
    let snap_down = |v: f64| (v * scale).floor() as i64;
    #[allow(clippy::cast_possible_truncation)]
    let snap_up = |v: f64| (v * scale).ceil() as i64;

    let min_x = snap_down(bounds.min_x);
    let min_y = snap_down(bounds.min_y);
    let max_x = snap_up(bounds.max_x);
    let max_y = snap_up(bounds.max_y);

    format!(
        "{} {} {} {}",
        fixed_point(min_x, precision),
        fixed_point(min_y, precision),
        fixed_point(max_x - min_x, precision),
        fixed_point(max_y - min_y, precision)
    )
}

/// Viewbox text right-padded with spaces to exactly `width` characters, or `None` if it
/// does not fit.
#[must_use]
pub fn padded_viewbox(bounds: &Bounds, precision: usize, width: usize) -> Option<String> {
    let text = viewbox(bounds, precision);
    (text.len() <= width).then(|| format!("{text:<width$}"))
}

/// Parse a viewbox string back into bounds. Trailing padding is ignored.
#[must_use]
pub fn parse_viewbox(text: &str) -> Option<Bounds> {
    let mut parts = text.split_whitespace().map(str::parse::<f64>);
    let min_x = parts.next()?.ok()?;
    let min_y = parts.next()?.ok()?;
    let width = parts.next()?.ok()?;
    let height = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Bounds {
        min_x,
        min_y,
        max_x: min_x + width,
        max_y: min_y + height,
    })
}

fn fixed_point(units: i64, precision: usize) -> String {
    if precision == 0 {
        return units.to_string();
    }
    let sign = if units < 0 { "-" } else { "" };
    let magnitude = units.unsigned_abs();
    let scale = 10u64.pow(u32::try_from(precision).unwrap_or(0));
    format!(
        "{sign}{}.{:0precision$}",
        magnitude / scale,
        magnitude % scale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_writes_fixed_precision() {
        let mut b = PathBuilder::new(5);
        b.move_to(Point::new(-122.441642, 37.754688));
        b.line_to(Point::new(-122.4, 37.7));
        assert_eq!(b.data(), "M-122.44164,37.75469L-122.40000,37.70000");
        assert_eq!(b.segments(), 1);
    }

    #[test]
    fn builder_bounds_include_control_points() {
        let mut b = PathBuilder::new(5);
        b.move_to(Point::new(0.0, 0.0));
        b.quad_to(Point::new(0.5, 2.0), Point::new(1.0, 0.0));
        assert_eq!(
            b.bounds(),
            Some(Bounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 1.0,
                max_y: 2.0
            })
        );
    }

    #[test]
    fn move_only_path_yields_no_element() {
        let mut b = PathBuilder::new(5);
        b.move_to(Point::new(1.0, 1.0));
        assert_eq!(b.into_element(LineStyle::Raw, 0.00005), "");
    }

    #[test]
    fn element_carries_style() {
        let el = path_element("M0,0L1,1", LineStyle::Raw, 0.00005);
        assert_eq!(
            el,
            "<path class=\"raw\" d=\"M0,0L1,1\" fill=\"none\" stroke=\"red\" stroke-width=\"0.00005\" />\n"
        );
    }

    #[test]
    fn viewbox_rounds_outward() {
        let bounds = Bounds {
            min_x: -122.441642,
            min_y: 37.754688,
            max_x: -122.400001,
            max_y: 37.760004,
        };
        assert_eq!(viewbox(&bounds, 5), "-122.44165 37.75468 0.04165 0.00533");
    }

    #[test]
    fn padded_viewbox_parses_back() {
        let bounds = Bounds {
            min_x: 1.5,
            min_y: -0.25,
            max_x: 2.0,
            max_y: 0.25,
        };
        let padded = padded_viewbox(&bounds, 5, 64).unwrap();
        assert_eq!(padded.len(), 64);
        let parsed = parse_viewbox(&padded).unwrap();
        assert!((parsed.min_x - 1.5).abs() < 1e-9);
        assert!((parsed.max_y - 0.25).abs() < 1e-9);
        assert!(padded_viewbox(&bounds, 5, 8).is_none());
    }
}
