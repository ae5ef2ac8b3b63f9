use crate::{curve, raw, simplify, Bounds, Point, ReductionConfig};
use serde::{Deserialize, Serialize};

/// Rendering strategy for one path element per flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    /// Every point, joined by straight segments.
    Raw,
    /// Max-deviation simplification; collapsed runs become cubic curves.
    Simplified,
    /// Cumulative-angle anchoring with curved segments between anchors.
    CumulativeAngle,
}

impl LineStyle {
    pub const ALL: [Self; 3] = [Self::Raw, Self::Simplified, Self::CumulativeAngle];

    /// Stable name used in the SVG class attribute and in the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Simplified => "simplified",
            Self::CumulativeAngle => "cumulative_angle",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    #[must_use]
    pub const fn stroke(self) -> &'static str {
        match self {
            Self::Raw => "red",
            Self::Simplified => "blue",
            Self::CumulativeAngle => "black",
        }
    }

    /// Reduce `points` to anchors plus an SVG fragment.
    ///
    /// The first and last points are always anchors. Runs of fewer than two points never
    /// produce a fragment.
    #[must_use]
    pub fn reduce(self, points: &[Point], config: &ReductionConfig) -> Reduction {
        match points {
            [] => Reduction::default(),
            [only] => Reduction {
                anchors: vec![0],
                bounds: Some(Bounds::point(*only)),
                fragment: String::new(),
            },
            _ => match self {
                Self::Raw => raw::reduce(points, config),
                Self::Simplified => simplify::reduce(points, config),
                Self::CumulativeAngle => curve::reduce(points, config),
            },
        }
    }
}

impl std::fmt::Display for LineStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one reducer over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    /// Indices into the input run, ascending.
    pub anchors: Vec<usize>,
    /// Bounds of everything written, control points included.
    pub bounds: Option<Bounds>,
    /// A single `<path>` element, or empty.
    pub fragment: String,
}

impl Reduction {
    #[must_use]
    pub fn anchor_points(&self, points: &[Point]) -> Vec<Point> {
        self.anchors.iter().filter_map(|&i| points.get(i).copied()).collect()
    }
}

/// Alternates between rounding a split up and down so repeated splits do not drift to
/// one side. Starts with rounding up.
#[derive(Debug, Clone)]
pub(crate) struct SpliceBias {
    round_up: bool,
}

impl SpliceBias {
    pub(crate) const fn new() -> Self {
        Self { round_up: true }
    }

    /// Half of `len`, rounded per the current bias. Flips the bias.
    pub(crate) fn half(&mut self, len: usize) -> usize {
        let half = if self.round_up {
            len.div_ceil(2)
        } else {
            len / 2
        };
        self.round_up = !self.round_up;
        half
    }
}
