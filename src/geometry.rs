//! Planar geometry primitives shared by the tile store, the backend and the workflows.
//!
//! All coordinates are in the study area's projected coordinate system.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// True when the boxes share any area or boundary.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// Box grown by `distance` on every side.
    pub fn expand(&self, distance: f64) -> BBox {
        BBox {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }
}

/// Simple polygon with an exterior ring and optional holes.
///
/// Rings may be open or closed; the closing edge is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    pub fn rectangle(bbox: &BBox) -> Self {
        Self::new(vec![
            Point::new(bbox.min_x, bbox.min_y),
            Point::new(bbox.max_x, bbox.min_y),
            Point::new(bbox.max_x, bbox.max_y),
            Point::new(bbox.min_x, bbox.max_y),
        ])
    }

    pub fn bbox(&self) -> Option<BBox> {
        ring_bbox(&self.exterior)
    }

    /// Even-odd containment test; holes are subtracted.
    pub fn contains(&self, point: &Point) -> bool {
        if !ring_contains(&self.exterior, point) {
            return false;
        }
        !self.holes.iter().any(|hole| ring_contains(hole, point))
    }

    /// True when the polygon shares interior area with the open rectangle `cell`.
    ///
    /// Edges lying exactly on the rectangle's boundary do not count, so a polygon
    /// never claims a neighbouring cell it only touches.
    pub fn overlaps_cell(&self, cell: &BBox) -> bool {
        let center = Point::new(
            (cell.min_x + cell.max_x) / 2.0,
            (cell.min_y + cell.max_y) / 2.0,
        );
        if self.contains(&center) {
            return true;
        }
        std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .flat_map(|ring| ring_edges(ring))
            .any(|(a, b)| segment_enters_open_box(a, b, cell))
    }
}

/// Collection of polygons treated as one geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub polygons: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }

    pub fn bbox(&self) -> Option<BBox> {
        self.polygons
            .iter()
            .filter_map(Polygon::bbox)
            .reduce(|a, b| a.union(&b))
    }
}

fn ring_bbox(ring: &[Point]) -> Option<BBox> {
    let first = ring.first()?;
    let mut bbox = BBox::new(first.x, first.y, first.x, first.y);
    for p in &ring[1..] {
        bbox.min_x = bbox.min_x.min(p.x);
        bbox.min_y = bbox.min_y.min(p.y);
        bbox.max_x = bbox.max_x.max(p.x);
        bbox.max_y = bbox.max_y.max(p.y);
    }
    Some(bbox)
}

fn ring_edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

fn ring_contains(ring: &[Point], point: &Point) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// Liang-Barsky clip of segment `a`-`b` against `cell`; the clipped chord must reach the
/// open interior.
fn segment_enters_open_box(a: Point, b: Point, cell: &BBox) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let checks = [
        (-dx, a.x - cell.min_x),
        (dx, cell.max_x - a.x),
        (-dy, a.y - cell.min_y),
        (dy, cell.max_y - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return false;
    }
    let mid_t = (t0 + t1) / 2.0;
    let mid = Point::new(a.x + mid_t * dx, a.y + mid_t * dy);
    let eps = 1e-9 * (cell.width().abs() + cell.height().abs()).max(1.0);
    mid.x > cell.min_x + eps
        && mid.x < cell.max_x - eps
        && mid.y > cell.min_y + eps
        && mid.y < cell.max_y - eps
}
