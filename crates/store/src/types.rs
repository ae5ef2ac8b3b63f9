use geotrail_geometry::LineStyle;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a persisted anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub i64);

/// Render a coordinate triple the way the `locations.coordinates` column stores it.
#[must_use]
pub fn pointz(lon: f64, lat: f64, alt: f64) -> String {
    format!("POINTZ({lon} {lat} {alt})")
}

/// Parse a `POINTZ(lon lat alt)` column value.
#[must_use]
pub fn parse_pointz(text: &str) -> Option<(f64, f64, f64)> {
    let inner = text.strip_prefix("POINTZ(")?.strip_suffix(')')?;
    let mut parts = inner.split_whitespace().map(str::parse::<f64>);
    let lon = parts.next()?.ok()?;
    let lat = parts.next()?.ok()?;
    let alt = parts.next()?.ok()?;
    parts.next().is_none().then_some((lon, lat, alt))
}

/// One anchor ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRow {
    /// RFC 3339 timestamp.
    pub time: String,
    /// `POINTZ(lon lat alt)`.
    pub coordinates: String,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

/// Links one flush's anchors for one (target, style) to the file they were drawn into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRefRow {
    pub filename: String,
    pub target: String,
    pub locations: Vec<LocationId>,
    pub line_style: LineStyle,
}

/// A persisted [`PathRefRow`] with its row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRef {
    pub id: i64,
    #[serde(flatten)]
    pub row: PathRefRow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointz_round_trips() {
        let text = pointz(-122.441642, 37.754688, -999.0);
        assert_eq!(text, "POINTZ(-122.441642 37.754688 -999)");
        assert_eq!(parse_pointz(&text), Some((-122.441642, 37.754688, -999.0)));
        assert_eq!(parse_pointz("POINT(1 2)"), None);
        assert_eq!(parse_pointz("POINTZ(1 2)"), None);
    }
}
