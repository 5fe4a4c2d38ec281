//! Geographic projections and SVG path output.

use crate::config::ProjectionKind;
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Polygon};
use std::f64::consts::PI;
use std::fmt::Write;

pub trait Projection: Send + Sync {
    /// Screen coordinates for a point, or `None` when it falls outside the
    /// projection's domain.
    fn project(&self, point: Coord<f64>) -> Option<Coord<f64>>;
}

pub fn from_kind(kind: ProjectionKind) -> Box<dyn Projection> {
    match kind {
        ProjectionKind::Identity => Box::new(Identity),
        ProjectionKind::AlbersUsa => Box::new(AlbersUsa::default()),
    }
}

/// For topologies whose coordinates are already in screen space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Projection for Identity {
    fn project(&self, point: Coord<f64>) -> Option<Coord<f64>> {
        Some(point)
    }
}

/// Albers conic equal-area, parameterised as in d3-geo.
#[derive(Debug, Clone, Copy)]
pub struct ConicEqualArea {
    n: f64,
    c: f64,
    r0: f64,
    k: f64,
    rotate: f64,
    dx: f64,
    dy: f64,
}

impl ConicEqualArea {
    /// Angles in degrees. `center` is given in the rotated frame.
    pub fn new(parallels: [f64; 2], rotate: f64, center: [f64; 2], scale: f64, translate: [f64; 2]) -> Self {
        let sy0 = parallels[0].to_radians().sin();
        let n = (sy0 + parallels[1].to_radians().sin()) / 2.0;
        let c = 1.0 + sy0 * (2.0 * n - sy0);
        let r0 = c.sqrt() / n;
        let mut projection = Self {
            n,
            c,
            r0,
            k: scale,
            rotate: rotate.to_radians(),
            dx: 0.0,
            dy: 0.0,
        };
        let (cx, cy) = projection.raw(center[0].to_radians(), center[1].to_radians());
        projection.dx = translate[0] - scale * cx;
        projection.dy = translate[1] + scale * cy;
        projection
    }

    fn raw(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let r = (self.c - 2.0 * self.n * phi.sin()).max(0.0).sqrt() / self.n;
        let angle = lambda * self.n;
        (r * angle.sin(), self.r0 - r * angle.cos())
    }

    fn forward(&self, point: Coord<f64>) -> Coord<f64> {
        let mut lambda = point.x.to_radians() + self.rotate;
        if lambda > PI {
            lambda -= 2.0 * PI;
        } else if lambda < -PI {
            lambda += 2.0 * PI;
        }
        let (x, y) = self.raw(lambda, point.y.to_radians());
        Coord {
            x: self.dx + self.k * x,
            y: self.dy - self.k * y,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    min: Coord<f64>,
    max: Coord<f64>,
}

impl Extent {
    fn contains(&self, p: Coord<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Lower 48 states plus Alaska and Hawaii insets. A point goes to the first
/// part whose clip extent contains its projection.
#[derive(Debug, Clone)]
pub struct AlbersUsa {
    parts: [(ConicEqualArea, Extent); 3],
}

impl AlbersUsa {
    pub fn new(scale: f64, translate: [f64; 2]) -> Self {
        let k = scale;
        let [x, y] = translate;
        let extent = |x0: f64, y0: f64, x1: f64, y1: f64| Extent {
            min: Coord { x: x + x0 * k, y: y + y0 * k },
            max: Coord { x: x + x1 * k, y: y + y1 * k },
        };

        let lower48 = ConicEqualArea::new([29.5, 45.5], 96.0, [-0.6, 38.7], k, [x, y]);
        let alaska = ConicEqualArea::new(
            [55.0, 65.0],
            154.0,
            [-2.0, 58.5],
            k * 0.35,
            [x - 0.307 * k, y + 0.201 * k],
        );
        let hawaii = ConicEqualArea::new(
            [8.0, 18.0],
            157.0,
            [-3.0, 19.9],
            k,
            [x - 0.205 * k, y + 0.212 * k],
        );

        Self {
            parts: [
                (lower48, extent(-0.455, -0.238, 0.455, 0.238)),
                (alaska, extent(-0.425, 0.120, -0.214, 0.234)),
                (hawaii, extent(-0.214, 0.166, -0.115, 0.234)),
            ],
        }
    }
}

impl Default for AlbersUsa {
    fn default() -> Self {
        Self::new(1070.0, [480.0, 250.0])
    }
}

impl Projection for AlbersUsa {
    fn project(&self, point: Coord<f64>) -> Option<Coord<f64>> {
        self.parts.iter().find_map(|(projection, extent)| {
            let projected = projection.forward(point);
            extent.contains(projected).then_some(projected)
        })
    }
}

fn project_ring(projection: &dyn Projection, ring: &LineString<f64>) -> LineString<f64> {
    ring.coords().filter_map(|c| projection.project(*c)).collect()
}

pub fn project_multipolygon(projection: &dyn Projection, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry
        .iter()
        .map(|polygon| {
            let exterior = project_ring(projection, polygon.exterior());
            let interiors = polygon.interiors().iter().map(|r| project_ring(projection, r)).collect();
            Polygon::new(exterior, interiors)
        })
        .filter(|polygon| polygon.exterior().0.len() > 3)
        .collect()
}

pub fn project_lines(projection: &dyn Projection, lines: &MultiLineString<f64>) -> MultiLineString<f64> {
    lines
        .iter()
        .map(|line| project_ring(projection, line))
        .filter(|line| line.0.len() > 1)
        .collect()
}

fn push_points(d: &mut String, points: &[Coord<f64>]) {
    for (i, p) in points.iter().enumerate() {
        let command = if i == 0 { 'M' } else { 'L' };
        let _ = write!(d, "{}{:.1},{:.1}", command, p.x, p.y);
    }
}

/// SVG path data for already projected polygons, one closed subpath per ring.
pub fn polygon_path(geometry: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in geometry {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            // Rings are stored closed; `Z` replaces the repeated point.
            let points = &ring.0[..ring.0.len().saturating_sub(1)];
            if points.len() < 2 {
                continue;
            }
            push_points(&mut d, points);
            d.push('Z');
        }
    }
    d
}

pub fn line_path(lines: &MultiLineString<f64>) -> String {
    let mut d = String::new();
    for line in lines {
        push_points(&mut d, &line.0);
    }
    d
}
