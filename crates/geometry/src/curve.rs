//! Cumulative-angle curve fitting.
//!
//! Walks the run once, summing squared segment lengths since the last anchor. Once that sum
//! passes the near field, turn accumulates too, and a point becomes an anchor when the
//! accumulated turn beats a threshold that relaxes from the near bound to the far bound as
//! the sum grows. Skipped points
//! between anchors shape a quadratic (one skipped point) or a cubic (several).

use crate::point::{centroid, sq_dist};
use crate::style::SpliceBias;
use crate::{LineStyle, PathBuilder, Point, Reduction, ReductionConfig};

pub(crate) fn reduce(points: &[Point], config: &ReductionConfig) -> Reduction {
    let last = points.len() - 1;
    let near_sq = config.near_field_sq();
    let mut builder = PathBuilder::new(config.precision);
    builder.move_to(points[0]);

    let mut bias = SpliceBias::new();
    let mut anchors = vec![0];
    let mut anchor = 0;
    let mut travelled = 0.0;
    let mut turn = 0.0;

    for i in 1..=last {
        let is_anchor = if i == last {
            true
        } else {
            travelled += sq_dist(points[i - 1], points[i]);
            if travelled > near_sq {
                turn += turn_angle(points[i - 1], points[i], points[i + 1]);
            }
            travelled > near_sq && turn > config.turn_threshold(travelled)
        };
        if is_anchor {
            connect(
                &mut builder,
                points[anchor],
                points[i],
                &points[anchor + 1..i],
                &mut bias,
            );
            anchors.push(i);
            anchor = i;
            travelled = 0.0;
            turn = 0.0;
        }
    }

    let bounds = builder.bounds();
    Reduction {
        anchors,
        bounds,
        fragment: builder.into_element(LineStyle::CumulativeAngle, config.stroke_width()),
    }
}

/// Unsigned turn at `at`, in radians. Zero when either segment is degenerate.
fn turn_angle(prev: Point, at: Point, next: Point) -> f64 {
    let incoming = at.sub(prev);
    let outgoing = next.sub(at);
    if incoming.norm() == 0.0 || outgoing.norm() == 0.0 {
        return 0.0;
    }
    incoming.cross(outgoing).abs().atan2(incoming.dot(outgoing))
}

fn connect(builder: &mut PathBuilder, a: Point, b: Point, skipped: &[Point], bias: &mut SpliceBias) {
    match skipped {
        [] => builder.line_to(b),
        [only] => {
            // Quadratic through the skipped point at t = 0.5.
            let control = only.scale(2.0).sub(a.midpoint(b));
            builder.quad_to(control, b);
        }
        _ => {
            let cut = bias.half(skipped.len());
            let reach = sq_dist(a, b).sqrt() / 2.0;
            let h1 = group_handle(&skipped[..cut], a, b, reach);
            let h2 = group_handle(&skipped[cut..], a, b, reach);
            builder.cubic_to(h1, h2, b);
        }
    }
}

/// Handle for one half of the skipped points: the group centre pushed away from the chord
/// by half the group's spread across it, capped at `reach`.
fn group_handle(group: &[Point], a: Point, b: Point, reach: f64) -> Point {
    let Some(center) = centroid(group) else {
        return a.midpoint(b);
    };
    let chord = b.sub(a);
    let theta = chord.y.atan2(chord.x);
    let normal = Point::new(-theta.sin(), theta.cos());

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for q in group {
        let across = q.sub(a).dot(normal);
        lo = lo.min(across);
        hi = hi.max(across);
    }
    let side = center.sub(a).dot(normal);
    let push = ((hi - lo) / 2.0).min(reach);
    if side == 0.0 || push == 0.0 {
        return center;
    }
    center.add(normal.scale(push * side.signum()))
}
