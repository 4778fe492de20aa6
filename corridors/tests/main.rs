use corridors::{
    nudge_paths, ConeSpanner, Groups, ObstacleIdx, Obstacles, Path, Point, Port, Rect,
    RoutingSettings, VisibilityGraph,
};
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn rects(rs: &[Rect]) -> Obstacles {
    Obstacles::from_rings(rs.iter().map(|r| r.corners())).unwrap()
}

/// Two tall obstacles with a corridor 10 wide between them, around x = 0.
fn corridor() -> Obstacles {
    rects(&[
        Rect::from_corners(p(-15.0, 0.0), p(-5.0, 20.0)),
        Rect::from_corners(p(5.0, 0.0), p(15.0, 20.0)),
    ])
}

fn settings(corner_fit_radius: f64) -> RoutingSettings {
    RoutingSettings {
        corner_fit_radius,
        ..RoutingSettings::default()
    }
}

fn path(points: Vec<Point>) -> Path {
    let (s, t) = (points[0], points[points.len() - 1]);
    Path::new(points, s, t)
}

/// Up the corridor from the bottom left, and out to the top right. Bigger
/// `i` means further out.
fn through_corridor(i: f64, flip: bool) -> Path {
    let (y0, y1) = (-5.0 - 3.0 * i, 25.0 + 3.0 * i);
    let x = if flip { 20.0 } else { -20.0 };
    path(vec![p(x, y0), p(0.0, y0), p(0.0, y1), p(-x, y1)])
}

fn segments(path: &Path) -> impl Iterator<Item = (Point, Point)> + '_ {
    path.points.windows(2).map(|w| (w[0], w[1]))
}

/// The x coordinate where the path crosses the horizontal line at `y`.
fn vertical_at(path: &Path, y: f64) -> Option<f64> {
    segments(path)
        .find(|(a, b)| a.x == b.x && a.y.min(b.y) < y && y < a.y.max(b.y))
        .map(|(a, _)| a.x)
}

fn assert_rectilinear(paths: &[Path]) {
    for path in paths {
        for (a, b) in segments(path) {
            assert!(a.x == b.x || a.y == b.y, "{a:?} -> {b:?} in {:?}", path.points);
        }
    }
}

/// Parallel segments of different paths that overlap are at least `sep` apart.
fn assert_separated(paths: &[Path], sep: f64) {
    for (i, a) in paths.iter().enumerate() {
        for b in &paths[i + 1..] {
            for (a0, a1) in segments(a) {
                for (b0, b1) in segments(b) {
                    let (across, lo_a, hi_a, lo_b, hi_b) = if a0.x == a1.x && b0.x == b1.x {
                        (a0.x - b0.x, a0.y.min(a1.y), a0.y.max(a1.y), b0.y.min(b1.y), b0.y.max(b1.y))
                    } else if a0.y == a1.y && b0.y == b1.y {
                        (a0.y - b0.y, a0.x.min(a1.x), a0.x.max(a1.x), b0.x.min(b1.x), b0.x.max(b1.x))
                    } else {
                        continue;
                    };
                    if lo_a.max(lo_b) + 1e-6 < hi_a.min(hi_b) {
                        assert!(
                            across.abs() >= sep - 1e-6,
                            "{a0:?} -> {a1:?} and {b0:?} -> {b1:?} are too close"
                        );
                    }
                }
            }
        }
    }
}

/// No segment passes through the inside of an obstacle.
fn assert_clear(paths: &[Path], obstacles: &Obstacles) {
    assert_clear_of(paths, obstacles, obstacles.indices());
}

fn assert_clear_of(
    paths: &[Path],
    obstacles: &Obstacles,
    which: impl IntoIterator<Item = ObstacleIdx>,
) {
    let which: Vec<ObstacleIdx> = which.into_iter().collect();
    for path in paths {
        for (a, b) in segments(path) {
            for k in 0..=64 {
                let q = a + (b - a) * (k as f64 / 64.0);
                for &o in &which {
                    assert!(!obstacles.strictly_contains(o, q), "{q:?} is inside {o:?}");
                }
            }
        }
    }
}

fn assert_close_paths(a: &[Path], b: &[Path]) {
    assert_eq!(a.len(), b.len());
    for (a, b) in a.iter().zip(b) {
        assert_eq!(a.points.len(), b.points.len(), "{:?} vs {:?}", a.points, b.points);
        for (p, q) in a.points.iter().zip(&b.points) {
            assert!(p.close_to(*q), "{:?} vs {:?}", a.points, b.points);
        }
    }
}

#[test]
fn two_paths_in_a_corridor() {
    let obstacles = corridor();
    let mut paths = vec![through_corridor(0.0, false), through_corridor(0.0, true)];
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings(1.0)).unwrap();

    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    assert!((xs[0] - xs[1]).abs() >= 2.0 - 1e-6, "{xs:?}");
    for x in xs {
        assert!((-5.0..=5.0).contains(&x), "{x}");
    }
    assert_rectilinear(&paths);
    assert_clear(&paths, &obstacles);
}

#[test]
fn nested_paths_in_a_corridor() {
    let obstacles = corridor();
    let mut paths: Vec<Path> = (0..3).map(|i| through_corridor(i as f64, false)).collect();
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings(1.0)).unwrap();

    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    // The outer paths stay outside, so nothing crosses.
    assert!(xs[2] < xs[1] && xs[1] < xs[0], "{xs:?}");
    assert_rectilinear(&paths);
    assert_separated(&paths, 2.0);
    assert_clear(&paths, &obstacles);
}

#[test]
fn paths_stay_in_their_group() {
    let mut groups = Groups::new();
    let g = groups.add(Rect::from_corners(p(-2.0, -20.0), p(30.0, 40.0)), None);
    let port = |x: f64, y: f64| {
        Port::on_shape(p(x, y), Rect::from_corners(p(x - 5.0, y - 5.0), p(x + 5.0, y + 5.0))).in_group(g)
    };
    let mut paths = vec![
        Path::new(
            vec![p(-20.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(20.0, 25.0)],
            port(-20.0, -5.0),
            port(20.0, 25.0),
        ),
        Path::new(
            vec![p(20.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(-20.0, 25.0)],
            port(20.0, -5.0),
            port(-20.0, 25.0),
        ),
    ];
    nudge_paths(&mut paths, &Obstacles::new(), &groups, &RoutingSettings::default()).unwrap();

    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    assert!(xs.iter().all(|&x| x >= -2.0 - 1e-6), "{xs:?}");
    assert!((xs[0] - xs[1]).abs() >= 6.0 - 1e-6, "{xs:?}");
    assert_rectilinear(&paths);
}

#[test]
fn arrowheads_need_room() {
    let mut paths = vec![
        through_corridor(0.0, false).with_arrowheads(None, Some(4.0)),
        through_corridor(0.0, true),
    ];
    nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &settings(1.0)).unwrap();
    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    // The arrowhead widens the last segment of the first path, but not the
    // vertical one.
    assert!((xs[0] - xs[1]).abs() >= 2.0 - 1e-6, "{xs:?}");
}

fn to_petgraph(g: &VisibilityGraph) -> UnGraph<Point, f64> {
    let mut ret = UnGraph::new_undirected();
    for v in g.vertices() {
        ret.add_node(g.point(v));
    }
    for e in g.edges() {
        let edge = g.edge(e);
        let len = (g.point(edge.source) - g.point(edge.target)).length();
        ret.add_edge(NodeIndex::new(edge.source.0), NodeIndex::new(edge.target.0), len);
    }
    ret
}

#[test]
fn shortest_path_goes_around_a_square() {
    let obstacles = rects(&[Rect::from_corners(p(0.0, 0.0), p(10.0, 10.0))]);
    let (s, t) = (p(-5.0, 4.0), p(15.0, 6.0));
    let g = ConeSpanner::new(&obstacles, &RoutingSettings::default())
        .with_ports([s, t])
        .build();
    let pg = to_petgraph(&g);
    let (s_idx, t_idx) = (g.find_vertex(s).unwrap(), g.find_vertex(t).unwrap());
    let (len, route) = petgraph::algo::astar(
        &pg,
        NodeIndex::new(s_idx.0),
        |n| n.index() == t_idx.0,
        |e| *e.weight(),
        |_| 0.0,
    )
    .unwrap();

    let points: Vec<Point> = route.iter().map(|&n| pg[n]).collect();
    let route = vec![Path::new(points, s, t)];
    assert_clear(&route, &obstacles);
    // Going over or under the square, through its corners, is the best there is.
    let best = (p(-5.0, 4.0) - p(0.0, 0.0)).length() + 10.0 + (p(10.0, 0.0) - p(15.0, 6.0)).length();
    assert!(len >= best - 1e-6, "{len} < {best}");
}

#[test]
fn staircases_become_corners() {
    let mut paths = vec![path(vec![
        p(0.0, 0.0),
        p(2.0, 0.0),
        p(2.0, 2.0),
        p(4.0, 2.0),
        p(4.0, 4.0),
    ])];
    nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &RoutingSettings::default()).unwrap();
    insta::assert_debug_snapshot!(paths[0].points, @r"
    [
        (0.0, 0.0),
        (4.0, 0.0),
        (4.0, 4.0),
    ]
    ");
}

#[test]
fn staircases_can_stay() {
    let mut paths = vec![path(vec![
        p(0.0, 0.0),
        p(2.0, 0.0),
        p(2.0, 2.0),
        p(4.0, 2.0),
        p(4.0, 4.0),
    ])];
    let settings = RoutingSettings {
        remove_staircases: false,
        ..RoutingSettings::default()
    };
    nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &settings).unwrap();
    assert_eq!(paths[0].points.len(), 5);
}

#[test]
fn degenerate_paths_become_straight() {
    let mut paths = vec![
        Path::new(Vec::new(), p(0.0, 0.0), p(5.0, 5.0)),
        Path::new(vec![p(3.0, 3.0)], p(0.0, 0.0), p(3.0, 3.0)),
        path(vec![p(10.0, 0.0), p(10.0, 10.0)]),
    ];
    nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &RoutingSettings::default()).unwrap();
    assert_eq!(paths[0].points, vec![p(0.0, 0.0), p(5.0, 5.0)]);
    assert_eq!(paths[1].points, vec![p(0.0, 0.0), p(3.0, 3.0)]);
    assert_eq!(paths[2].points, vec![p(10.0, 0.0), p(10.0, 10.0)]);
}

#[test]
fn nearly_overlapping_paths() {
    // The verticals are a hair apart, and one port is a hair off its segment.
    let fixture = r#"[
        {
            "points": [{"x": -20.0, "y": -5.0}, {"x": 1e-9, "y": -5.0}, {"x": 1e-9, "y": 25.0}, {"x": 20.0, "y": 25.0}],
            "source": {"location": {"x": -20.0, "y": -5.0}, "shape": null},
            "target": {"location": {"x": 20.0, "y": 25.0}, "shape": null}
        },
        {
            "points": [{"x": 20.0, "y": -5.0000000001}, {"x": 0.0, "y": -5.0}, {"x": 0.0, "y": 25.0}, {"x": -20.0, "y": 25.0}],
            "source": {"location": {"x": 20.0, "y": -5.0000000001}, "shape": null},
            "target": {"location": {"x": -20.0, "y": 25.0}, "shape": null}
        }
    ]"#;
    let mut paths: Vec<Path> = serde_json::from_str(fixture).unwrap();
    nudge_paths(&mut paths, &Obstacles::new(), &Groups::new(), &RoutingSettings::default()).unwrap();

    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    assert!((xs[0] - xs[1]).abs() >= 6.0 - 1e-6, "{xs:?}");
    assert_rectilinear(&paths);
}

#[test]
fn nudging_is_deterministic() {
    let run = || {
        let mut paths: Vec<Path> = (0..3)
            .map(|i| through_corridor(i as f64, i % 2 == 1))
            .collect();
        nudge_paths(&mut paths, &corridor(), &Groups::new(), &settings(1.0)).unwrap();
        paths
    };
    assert_eq!(run(), run());
}

#[test]
fn nudging_twice_changes_nothing() {
    let obstacles = corridor();
    let mut paths = vec![through_corridor(0.0, false), through_corridor(0.0, true)];
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings(1.0)).unwrap();
    let once = paths.clone();
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings(1.0)).unwrap();
    assert_close_paths(&once, &paths);

    let mut staircase = vec![path(vec![
        p(0.0, 0.0),
        p(2.0, 0.0),
        p(2.0, 2.0),
        p(4.0, 2.0),
        p(4.0, 4.0),
    ])];
    let settings = RoutingSettings::default();
    nudge_paths(&mut staircase, &Obstacles::new(), &Groups::new(), &settings).unwrap();
    let once = staircase.clone();
    nudge_paths(&mut staircase, &Obstacles::new(), &Groups::new(), &settings).unwrap();
    assert_close_paths(&once, &staircase);
    assert_eq!(staircase[0].points, vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0)]);
}

#[test]
fn paths_leave_their_shapes_through_a_corridor() {
    let shapes = [
        Rect::from_corners(p(-25.0, -9.0), p(-17.0, -1.0)),
        Rect::from_corners(p(17.0, 21.0), p(25.0, 29.0)),
        Rect::from_corners(p(17.0, -9.0), p(25.0, -1.0)),
        Rect::from_corners(p(-25.0, 21.0), p(-17.0, 29.0)),
    ];
    let mut rings = vec![
        Rect::from_corners(p(-15.0, 0.0), p(-5.0, 20.0)),
        Rect::from_corners(p(5.0, 0.0), p(15.0, 20.0)),
    ];
    rings.extend(shapes);
    let obstacles = rects(&rings);

    let port = |i: usize| {
        let r = shapes[i];
        Port::on_shape(r.left_bottom().mid(r.right_top()), r)
    };
    let mut paths = vec![
        Path::new(
            vec![p(-21.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(21.0, 25.0)],
            port(0),
            port(1),
        ),
        Path::new(
            vec![p(21.0, -5.0), p(0.0, -5.0), p(0.0, 25.0), p(-21.0, 25.0)],
            port(2),
            port(3),
        ),
    ];
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings(1.0)).unwrap();

    let xs: Vec<f64> = paths.iter().map(|path| vertical_at(path, 10.0).unwrap()).collect();
    assert!((xs[0] - xs[1]).abs() >= 2.0 - 1e-6, "{xs:?}");
    for x in xs {
        assert!((-5.0..=5.0).contains(&x), "{x}");
    }
    // Ends may slide, but only within the shapes they're attached to.
    for (path, (s, t)) in paths.iter().zip([(0, 1), (2, 3)]) {
        assert!(shapes[s].contains(path.points[0]), "{:?}", path.points);
        assert!(shapes[t].contains(path.points[path.points.len() - 1]), "{:?}", path.points);
    }
    assert_rectilinear(&paths);
    // The shapes the paths start and end in are theirs to cross.
    assert_clear_of(&paths, &obstacles, obstacles.indices().take(2));
}
