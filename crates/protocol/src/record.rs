use crate::{ProtocolError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Altitude written to the store when a ping only carries longitude and latitude.
pub const MISSING_ALTITUDE: f64 = -999.0;

/// Longest accepted target id, in bytes. Ids double as directory names.
pub const MAX_TARGET_ID_LEN: usize = 64;

/// `[lon, lat]` or `[lon, lat, alt]` in degrees / metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<f64>", try_from = "Vec<f64>")]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
    pub alt: Option<f64>,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            alt: None,
        }
    }

    #[must_use]
    pub const fn with_alt(lon: f64, lat: f64, alt: f64) -> Self {
        Self {
            lon,
            lat,
            alt: Some(alt),
        }
    }

    #[must_use]
    pub const fn is_3d(&self) -> bool {
        self.alt.is_some()
    }

    /// Altitude with the store sentinel applied.
    #[must_use]
    pub fn alt_or_sentinel(&self) -> f64 {
        self.alt.unwrap_or(MISSING_ALTITUDE)
    }
}

impl From<Coordinates> for Vec<f64> {
    fn from(c: Coordinates) -> Self {
        match c.alt {
            Some(alt) => vec![c.lon, c.lat, alt],
            None => vec![c.lon, c.lat],
        }
    }
}

impl TryFrom<Vec<f64>> for Coordinates {
    type Error = ProtocolError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        let coords = match values.as_slice() {
            [lon, lat] => Self::new(*lon, *lat),
            [lon, lat, alt] => Self::with_alt(*lon, *lat, *alt),
            other => {
                return Err(ProtocolError::InvalidCoordinates(format!(
                    "expected 2 or 3 components, got {}",
                    other.len()
                )))
            }
        };
        if !values.iter().all(|v| v.is_finite()) {
            return Err(ProtocolError::InvalidCoordinates(
                "components must be finite".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&coords.lon) || !(-90.0..=90.0).contains(&coords.lat) {
            return Err(ProtocolError::InvalidCoordinates(format!(
                "({}, {}) is outside lon/lat range",
                coords.lon, coords.lat
            )));
        }
        Ok(coords)
    }
}

/// One location ping. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl Location {
    #[must_use]
    pub const fn new(coordinates: Coordinates, time: DateTime<Utc>) -> Self {
        Self {
            coordinates,
            time,
            heading: None,
            speed: None,
            accuracy: None,
        }
    }

    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.coordinates.lon
    }

    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.coordinates.lat
    }
}

/// Payload carried on the location channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    pub target_id: String,
    pub location: Location,
}

#[derive(Deserialize)]
struct RawLocation {
    coordinates: Vec<f64>,
    time: String,
    #[serde(default)]
    heading: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    accuracy: Option<f64>,
}

/// Validate a channel payload into a [`WireRecord`].
///
/// The target id is checked before the location so a record without a usable id is always
/// reported as [`ProtocolError::MissingTargetId`], whatever else is wrong with it.
pub fn parse_record(payload: &str) -> Result<WireRecord> {
    let value: Value = serde_json::from_str(payload)?;
    let target_id = value
        .get("targetId")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingTargetId)?;
    validate_target_id(target_id)?;

    let location = value
        .get("location")
        .ok_or_else(|| ProtocolError::InvalidCoordinates("missing location".to_string()))?;
    let raw = RawLocation::deserialize(location)?;

    let coordinates = Coordinates::try_from(raw.coordinates)?;
    let time = DateTime::parse_from_rfc3339(&raw.time)
        .map_err(|e| ProtocolError::InvalidTime(format!("{:?}: {e}", raw.time)))?
        .with_timezone(&Utc);

    Ok(WireRecord {
        target_id: target_id.to_string(),
        location: Location {
            coordinates,
            time,
            heading: raw.heading,
            speed: raw.speed,
            accuracy: raw.accuracy,
        },
    })
}

/// Target ids become directory names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_target_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ProtocolError::InvalidTargetId("empty".to_string()));
    }
    if id.len() > MAX_TARGET_ID_LEN {
        return Err(ProtocolError::InvalidTargetId(format!(
            "{} bytes exceeds {MAX_TARGET_ID_LEN}",
            id.len()
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(ProtocolError::InvalidTargetId(format!(
            "unexpected character {bad:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_two_dimensional_record() {
        let record = parse_record(
            r#"{"targetId":"abc123","location":{"coordinates":[-122.4,37.7],"time":"2016-03-01T10:00:00.000Z","speed":4.5}}"#,
        )
        .unwrap();
        assert_eq!(record.target_id, "abc123");
        assert_eq!(record.location.coordinates, Coordinates::new(-122.4, 37.7));
        assert!(!record.location.coordinates.is_3d());
        assert_eq!(record.location.speed, Some(4.5));
        assert_eq!(record.location.heading, None);
    }

    #[test]
    fn parses_altitude_and_offsets() {
        let record = parse_record(
            r#"{"targetId":"t","location":{"coordinates":[1.0,2.0,30.5],"time":"2016-03-01T12:00:00+02:00"}}"#,
        )
        .unwrap();
        assert_eq!(record.location.coordinates.alt, Some(30.5));
        assert_eq!(record.location.time.to_rfc3339(), "2016-03-01T10:00:00+00:00");
    }

    #[test]
    fn missing_or_non_string_target_is_tagged() {
        for payload in [
            r#"{"location":{"coordinates":[1,2],"time":"2016-03-01T10:00:00Z"}}"#,
            r#"{"targetId":7,"location":{"coordinates":[1,2],"time":"2016-03-01T10:00:00Z"}}"#,
            r#"{"targetId":null}"#,
        ] {
            assert!(matches!(
                parse_record(payload),
                Err(ProtocolError::MissingTargetId)
            ));
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_record("STATUSCHECK"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            parse_record(r#"{"targetId":"t","location":{"coordinates":[1],"time":"2016-03-01T10:00:00Z"}}"#),
            Err(ProtocolError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            parse_record(r#"{"targetId":"t","location":{"coordinates":[1,2],"time":"yesterday"}}"#),
            Err(ProtocolError::InvalidTime(_))
        ));
        assert!(matches!(
            parse_record(r#"{"targetId":"t","location":{"coordinates":[200,2],"time":"2016-03-01T10:00:00Z"}}"#),
            Err(ProtocolError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn target_ids_cannot_escape_the_output_dir() {
        assert!(validate_target_id("../etc").is_err());
        assert!(validate_target_id("a/b").is_err());
        assert!(validate_target_id("").is_err());
        assert!(validate_target_id(&"x".repeat(65)).is_err());
        assert!(validate_target_id("0123456789abcdefABCDEF_-").is_ok());
    }

    #[test]
    fn serialized_record_parses_back() {
        let record = parse_record(
            r#"{"targetId":"t1","location":{"coordinates":[3.5,-4.25],"time":"2016-03-01T10:00:00Z","accuracy":12.0}}"#,
        )
        .unwrap();
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(parse_record(&text).unwrap(), record);
    }
}
