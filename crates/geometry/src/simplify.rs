//! Max-deviation (Douglas-Peucker style) simplification.
//!
//! A run is split at its point of greatest deviation from the chord until every piece is
//! within tolerance. Pieces that swallowed interior points are drawn as one cubic whose
//! handles lean toward the swallowed points, so the curve keeps the run's shape.

use crate::point::{centroid, sq_dist};
use crate::style::SpliceBias;
use crate::{LineStyle, PathBuilder, Point, Reduction, ReductionConfig};

const HANDLE_PULL: f64 = 4.0 / 3.0;

struct Piece {
    end: usize,
    handles: Option<(Point, Point)>,
}

pub(crate) fn reduce(points: &[Point], config: &ReductionConfig) -> Reduction {
    let last = points.len() - 1;
    let mut pieces = Vec::new();
    let mut bias = SpliceBias::new();
    split(points, 0, last, config.tolerance, &mut bias, &mut pieces);

    let mut builder = PathBuilder::new(config.precision);
    builder.move_to(points[0]);
    let mut anchors = Vec::with_capacity(pieces.len() + 1);
    anchors.push(0);
    for piece in &pieces {
        let end = points[piece.end];
        match piece.handles {
            Some((h1, h2)) => builder.cubic_to(h1, h2, end),
            None => builder.line_to(end),
        }
        anchors.push(piece.end);
    }

    let bounds = builder.bounds();
    Reduction {
        anchors,
        bounds,
        fragment: builder.into_element(LineStyle::Simplified, config.stroke_width()),
    }
}

fn split(
    points: &[Point],
    lo: usize,
    hi: usize,
    tolerance: f64,
    bias: &mut SpliceBias,
    out: &mut Vec<Piece>,
) {
    if hi - lo < 2 {
        out.push(Piece {
            end: hi,
            handles: None,
        });
        return;
    }

    let (at, worst) = farthest(points, lo, hi, bias);
    if worst > tolerance {
        split(points, lo, at, tolerance, bias, out);
        split(points, at, hi, tolerance, bias, out);
    } else {
        out.push(Piece {
            end: hi,
            handles: fit_handles(points[lo], points[hi], &points[lo + 1..hi]),
        });
    }
}

/// Interior index of greatest deviation. Ties resolve to the middle candidate.
fn farthest(points: &[Point], lo: usize, hi: usize, bias: &mut SpliceBias) -> (usize, f64) {
    let (a, b) = (points[lo], points[hi]);
    let mut worst = f64::NEG_INFINITY;
    let mut candidates: Vec<usize> = Vec::new();
    for (i, p) in points.iter().enumerate().take(hi).skip(lo + 1) {
        let d = deviation(*p, a, b);
        if d > worst {
            worst = d;
            candidates.clear();
            candidates.push(i);
        } else if d == worst {
            candidates.push(i);
        }
    }
    let pick = match candidates.len() {
        0 => lo + 1,
        1 => candidates[0],
        n => candidates[bias.half(n - 1)],
    };
    (pick, worst)
}

/// Distance from `p` to the chord `a`-`b`, never more than the distance to either end.
fn deviation(p: Point, a: Point, b: Point) -> f64 {
    let to_a = sq_dist(p, a).sqrt();
    let to_b = sq_dist(p, b).sqrt();
    let chord = b.sub(a);
    let len = chord.norm();
    let perpendicular = if len > 0.0 {
        chord.cross(p.sub(a)).abs() / len
    } else {
        to_a
    };
    perpendicular.min(to_a).min(to_b)
}

/// Cubic handles for a collapsed piece, or `None` when nothing was collapsed.
///
/// Handles sit a fraction of the chord in from each end, shifted toward the centroid of the
/// collapsed points. The fraction grows from 1/3 toward 1/2 as the collapsed points spread
/// across the chord relative to their spread along it.
fn fit_handles(a: Point, b: Point, interior: &[Point]) -> Option<(Point, Point)> {
    let center = centroid(interior)?;
    let chord = b.sub(a);
    let theta = chord.y.atan2(chord.x);
    let along_axis = Point::new(theta.cos(), theta.sin());
    let across_axis = Point::new(-theta.sin(), theta.cos());

    let (mut along_min, mut along_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut across_min, mut across_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for q in interior {
        let rel = q.sub(a);
        let along = rel.dot(along_axis);
        let across = rel.dot(across_axis);
        along_min = along_min.min(along);
        along_max = along_max.max(along);
        across_min = across_min.min(across);
        across_max = across_max.max(across);
    }
    let along_extent = along_max - along_min;
    let across_extent = across_max - across_min;
    let ratio = if along_extent > 0.0 {
        (across_extent / along_extent).min(1.0)
    } else if across_extent > 0.0 {
        1.0
    } else {
        0.0
    };

    let fraction = (1.0 + ratio / 2.0) / 3.0;
    let lean = center.sub(a.midpoint(b)).scale(HANDLE_PULL);
    let h1 = a.add(chord.scale(fraction)).add(lean);
    let h2 = b.sub(chord.scale(fraction)).add(lean);
    Some((h1, h2))
}
