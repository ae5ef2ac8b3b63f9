use geotrail_geometry::{parse_viewbox, viewbox, Bounds, LineStyle, Point, ReductionConfig};
use proptest::prelude::*;

fn run() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec((-0.05f64..0.05, -0.05f64..0.05), 2..60).prop_map(|coords| {
        coords
            .into_iter()
            .map(|(dx, dy)| Point::new(-122.4 + dx, 37.7 + dy))
            .collect()
    })
}

fn coordinates(fragment: &str) -> Vec<(f64, f64)> {
    let Some(start) = fragment.find("d=\"") else {
        return Vec::new();
    };
    let rest = &fragment[start + 3..];
    let d = &rest[..rest.find('"').unwrap_or(rest.len())];
    let numbers: Vec<f64> = d
        .split(|c: char| c == ',' || c.is_ascii_alphabetic())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap())
        .collect();
    numbers.chunks(2).map(|pair| (pair[0], pair[1])).collect()
}

proptest! {
    #[test]
    fn endpoints_are_always_anchors(points in run()) {
        let config = ReductionConfig::default();
        for style in LineStyle::ALL {
            let out = style.reduce(&points, &config);
            prop_assert_eq!(out.anchors.first().copied(), Some(0));
            prop_assert_eq!(out.anchors.last().copied(), Some(points.len() - 1));
            prop_assert!(out.anchors.len() <= points.len());
            prop_assert!(out.anchors.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(!out.fragment.is_empty());
        }
    }

    #[test]
    fn viewbox_covers_written_coordinates(points in run()) {
        let config = ReductionConfig::default();
        let mut bounds: Option<Bounds> = None;
        let mut fragments = String::new();
        for style in LineStyle::ALL {
            let out = style.reduce(&points, &config);
            bounds = Bounds::merge(bounds, out.bounds);
            fragments.push_str(&out.fragment);
        }
        let bounds = bounds.unwrap();
        let view = parse_viewbox(&viewbox(&bounds, config.precision)).unwrap();
        let slack = 1e-9;
        for fragment in fragments.lines() {
            for (x, y) in coordinates(fragment) {
                prop_assert!(x >= view.min_x - slack && x <= view.max_x + slack, "x {} outside {:?}", x, view);
                prop_assert!(y >= view.min_y - slack && y <= view.max_y + slack, "y {} outside {:?}", y, view);
            }
        }
    }

    #[test]
    fn raw_keeps_every_point(points in run()) {
        let out = LineStyle::Raw.reduce(&points, &ReductionConfig::default());
        prop_assert_eq!(out.anchors, (0..points.len()).collect::<Vec<_>>());
    }
}
