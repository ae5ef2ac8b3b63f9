use crate::{LineStyle, PathBuilder, Point, Reduction, ReductionConfig};

/// Keep every point; straight segments between consecutive points.
pub(crate) fn reduce(points: &[Point], config: &ReductionConfig) -> Reduction {
    let mut builder = PathBuilder::new(config.precision);
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        builder.move_to(*first);
    }
    for p in iter {
        builder.line_to(*p);
    }
    let bounds = builder.bounds();
    Reduction {
        anchors: (0..points.len()).collect(),
        bounds,
        fragment: builder.into_element(LineStyle::Raw, config.stroke_width()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn two_points_make_one_segment() {
        let points = [Point::new(0.0, 0.0), Point::new(0.001, 0.002)];
        let out = LineStyle::Raw.reduce(&points, &ReductionConfig::default());
        assert_eq!(out.anchors, vec![0, 1]);
        assert!(out.fragment.contains("d=\"M0.00000,0.00000L0.00100,0.00200\""));
        assert!(out.fragment.contains("stroke=\"red\""));
    }
}
