use std::path::PathBuf;

use clap::Parser;
use corridors::{nudge_paths, ConeSpanner, Groups, Obstacles, Path, Point, RoutingSettings};
use kurbo::DEFAULT_ACCURACY;

/// Reads closed paths from an svg as obstacles and open paths as routes,
/// nudges the routes and draws the result.
#[derive(Parser)]
struct Args {
    input: PathBuf,
    output: PathBuf,

    #[arg(long)]
    corner_fit_radius: Option<f64>,

    /// Also draw the visibility graph between obstacles and route ends.
    #[arg(long)]
    spanner: bool,

    #[arg(long)]
    keep_staircases: bool,
}

#[derive(Default)]
struct Drawing {
    rings: Vec<Vec<Point>>,
    routes: Vec<Vec<Point>>,
}

impl Drawing {
    fn finish(&mut self, points: &mut Vec<Point>, closed: bool) {
        if closed {
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            if points.len() > 2 {
                self.rings.push(std::mem::take(points));
            }
        } else if points.len() > 1 {
            self.routes.push(std::mem::take(points));
        }
        points.clear();
    }
}

fn svg_to_drawing(tree: &usvg::Tree) -> Drawing {
    let mut ret = Drawing::default();

    fn pt(p: usvg::tiny_skia_path::Point) -> kurbo::Point {
        kurbo::Point::new(p.x as f64, p.y as f64)
    }

    fn add_group(group: &usvg::Group, ret: &mut Drawing) {
        for child in group.children() {
            match child {
                usvg::Node::Group(group) => add_group(group, ret),
                usvg::Node::Path(path) => {
                    let kurbo_els = path.data().segments().map(|seg| match seg {
                        usvg::tiny_skia_path::PathSegment::MoveTo(p) => {
                            kurbo::PathEl::MoveTo(pt(p))
                        }
                        usvg::tiny_skia_path::PathSegment::LineTo(p) => {
                            kurbo::PathEl::LineTo(pt(p))
                        }
                        usvg::tiny_skia_path::PathSegment::QuadTo(p0, p1) => {
                            kurbo::PathEl::QuadTo(pt(p0), pt(p1))
                        }
                        usvg::tiny_skia_path::PathSegment::CubicTo(p0, p1, p2) => {
                            kurbo::PathEl::CurveTo(pt(p0), pt(p1), pt(p2))
                        }
                        usvg::tiny_skia_path::PathSegment::Close => kurbo::PathEl::ClosePath,
                    });

                    let mut points = Vec::<Point>::new();
                    kurbo::flatten(kurbo_els, DEFAULT_ACCURACY, |el| match el {
                        kurbo::PathEl::MoveTo(p) => {
                            ret.finish(&mut points, false);
                            points.push(Point::new(p.x, p.y));
                        }
                        kurbo::PathEl::LineTo(p) => points.push(Point::new(p.x, p.y)),
                        kurbo::PathEl::ClosePath => ret.finish(&mut points, true),
                        kurbo::PathEl::QuadTo(..) | kurbo::PathEl::CurveTo(..) => unreachable!(),
                    });
                    ret.finish(&mut points, false);
                }
                _ => {}
            }
        }
    }

    add_group(tree.root(), &mut ret);
    ret
}

fn polyline(points: &[Point], stroke: &str, stroke_width: f64) -> svg::node::element::Path {
    let mut data = svg::node::element::path::Data::new();
    for (i, p) in points.iter().enumerate() {
        data = if i == 0 {
            data.move_to((p.x, p.y))
        } else {
            data.line_to((p.x, p.y))
        };
    }
    svg::node::element::Path::new()
        .set("fill", "none")
        .set("stroke", stroke)
        .set("stroke-width", stroke_width)
        .set("d", data)
}

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let input = std::fs::read_to_string(&args.input)?;
    let tree = usvg::Tree::from_str(&input, &usvg::Options::default())?;
    let drawing = svg_to_drawing(&tree);

    let mut settings = RoutingSettings {
        remove_staircases: !args.keep_staircases,
        ..RoutingSettings::default()
    };
    if let Some(r) = args.corner_fit_radius {
        settings.corner_fit_radius = r;
    }

    let obstacles = Obstacles::from_rings(drawing.rings.iter().cloned())?;
    let mut paths: Vec<Path> = drawing
        .routes
        .iter()
        .map(|ps| Path::new(ps.clone(), ps[0], ps[ps.len() - 1]))
        .collect();
    nudge_paths(&mut paths, &obstacles, &Groups::new(), &settings)?;

    let bbox = drawing
        .rings
        .iter()
        .chain(&drawing.routes)
        .flatten()
        .fold(corridors::Rect::empty(), |mut r, &p| {
            r.add(p);
            r
        });
    if bbox.is_empty() {
        anyhow::bail!("nothing to draw in {}", args.input.display());
    }
    let (min, max) = (bbox.left_bottom(), bbox.right_top());
    let pad = settings.edge_separation();
    let stroke_width = (max.y - min.y).max(max.x - min.x) / 512.0;
    let mut document = svg::Document::new().set(
        "viewBox",
        (
            min.x - pad,
            min.y - pad,
            max.x - min.x + 2.0 * pad,
            max.y - min.y + 2.0 * pad,
        ),
    );

    for ring in &drawing.rings {
        let mut closed = ring.clone();
        closed.push(ring[0]);
        document = document.add(polyline(&closed, "black", stroke_width).set("fill", "lightgray"));
    }

    if args.spanner {
        let ports = paths
            .iter()
            .flat_map(|p| [p.source.location, p.target.location]);
        let graph = ConeSpanner::new(&obstacles, &settings)
            .with_ports(ports)
            .build();
        for e in graph.edges() {
            let line = [graph.source_point(e), graph.target_point(e)];
            document = document
                .add(polyline(&line, "black", stroke_width / 4.0).set("stroke-opacity", "0.2"));
        }
    }

    for path in &paths {
        document = document.add(polyline(&path.points, "blue", stroke_width));
        for end in [path.source.location, path.target.location] {
            let c = svg::node::element::Circle::new()
                .set("r", stroke_width * 2.0)
                .set("cx", end.x)
                .set("cy", end.y)
                .set("fill", "blue");
            document = document.add(c);
        }
    }

    svg::save(&args.output, &document)?;

    Ok(())
}
