// Screen-space geometry used by the collision engine. Everything here works in
// pixels with y growing downward.

use crate::figure::{ElementId, SurfaceId};
use serde::Serialize;

pub type Point = (f64, f64);

const SEGMENT_EPS: f64 = 1e-9;

/// Axis-aligned box in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box from any two corners; the corners are normalized.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for p in &points[1..] {
            bbox.x0 = bbox.x0.min(p.0);
            bbox.y0 = bbox.y0.min(p.1);
            bbox.x1 = bbox.x1.max(p.0);
            bbox.y1 = bbox.y1.max(p.1);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn center(&self) -> Point {
        ((self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x0: self.x0 + dx,
            y0: self.y0 + dy,
            x1: self.x1 + dx,
            y1: self.y1 + dy,
        }
    }

    /// True when `self` lies entirely inside `outer` (edges may touch).
    pub fn within(&self, outer: &BBox) -> bool {
        self.x0 >= outer.x0 && self.x1 <= outer.x1 && self.y0 >= outer.y0 && self.y1 <= outer.y1
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.0 >= self.x0 && p.0 <= self.x1 && p.1 >= self.y0 && p.1 <= self.y1
    }
}

/// Grow `bbox` by `padding_px` on every side. Zero-width or zero-height boxes
/// (reference lines, empty text) are grown by the same absolute amount.
pub fn pad(bbox: &BBox, padding_px: f64) -> BBox {
    if padding_px == 0.0 || !padding_px.is_finite() {
        return *bbox;
    }
    BBox {
        x0: bbox.x0 - padding_px,
        y0: bbox.y0 - padding_px,
        x1: bbox.x1 + padding_px,
        y1: bbox.y1 + padding_px,
    }
}

/// Strict overlap: boxes that only share an edge do not overlap.
pub fn overlaps(a: &BBox, b: &BBox) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

pub fn distance(a: Point, b: Point) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt()
}

pub fn point_segment_distance(point: Point, a: Point, b: Point) -> f64 {
    let vx = b.0 - a.0;
    let vy = b.1 - a.1;
    let len2 = vx * vx + vy * vy;
    if len2 <= SEGMENT_EPS {
        return distance(point, a);
    }
    let t = (((point.0 - a.0) * vx + (point.1 - a.1) * vy) / len2).clamp(0.0, 1.0);
    distance(point, (a.0 + vx * t, a.1 + vy * t))
}

pub fn point_polyline_distance(point: Point, points: &[Point]) -> f64 {
    match points.len() {
        0 => f64::INFINITY,
        1 => distance(point, points[0]),
        _ => points
            .windows(2)
            .map(|seg| point_segment_distance(point, seg[0], seg[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn point_on_segment(point: Point, a: Point, b: Point) -> bool {
    point.0 >= a.0.min(b.0) - SEGMENT_EPS
        && point.0 <= a.0.max(b.0) + SEGMENT_EPS
        && point.1 >= a.1.min(b.1) - SEGMENT_EPS
        && point.1 <= a.1.max(b.1) + SEGMENT_EPS
}

fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    let crosses = ((o1 > SEGMENT_EPS && o2 < -SEGMENT_EPS) || (o1 < -SEGMENT_EPS && o2 > SEGMENT_EPS))
        && ((o3 > SEGMENT_EPS && o4 < -SEGMENT_EPS) || (o3 < -SEGMENT_EPS && o4 > SEGMENT_EPS));
    if crosses {
        return true;
    }
    (o1.abs() <= SEGMENT_EPS && point_on_segment(c, a, b))
        || (o2.abs() <= SEGMENT_EPS && point_on_segment(d, a, b))
        || (o3.abs() <= SEGMENT_EPS && point_on_segment(a, c, d))
        || (o4.abs() <= SEGMENT_EPS && point_on_segment(b, c, d))
}

/// Segment vs. box interior. A segment that only runs along an edge of the box
/// counts as a hit, matching the conservative behavior of the box test.
pub fn segment_intersects_bbox(a: Point, b: Point, bbox: &BBox) -> bool {
    if bbox.contains_point(a) || bbox.contains_point(b) {
        return true;
    }
    let corners = [
        (bbox.x0, bbox.y0),
        (bbox.x1, bbox.y0),
        (bbox.x1, bbox.y1),
        (bbox.x0, bbox.y1),
    ];
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

pub fn polyline_intersects_bbox(points: &[Point], bbox: &BBox) -> bool {
    match points.len() {
        0 => false,
        1 => bbox.contains_point(points[0]),
        _ => points
            .windows(2)
            .any(|seg| segment_intersects_bbox(seg[0], seg[1], bbox)),
    }
}

/// A plotted line treated as a continuous obstacle. The pixel path is computed
/// once per resolution pass and is only valid until the figure changes.
#[derive(Debug, Clone)]
pub struct CurveObstacle {
    pub element: ElementId,
    pub surface: SurfaceId,
    pub pixels: Vec<Point>,
    pub extents: Option<BBox>,
}

impl CurveObstacle {
    pub fn new(element: ElementId, surface: SurfaceId, pixels: Vec<Point>) -> Self {
        let extents = BBox::from_points(&pixels);
        Self {
            element,
            surface,
            pixels,
            extents,
        }
    }
}

/// Exact path-vs-box test, after a cheap rejection on the curve extents.
pub fn curve_intersects(curve: &CurveObstacle, bbox: &BBox) -> bool {
    let Some(extents) = curve.extents else {
        return false;
    };
    // Extents of a horizontal or vertical line are degenerate, so compare
    // inclusively here; the exact test below decides.
    if extents.x0 > bbox.x1 || extents.x1 < bbox.x0 || extents.y0 > bbox.y1 || extents.y1 < bbox.y0
    {
        return false;
    }
    polyline_intersects_bbox(&curve.pixels, bbox)
}

/// Bounding box of the part of the curve that falls within the label's
/// x-range widened by `margin`. Segments crossing the window edges contribute
/// their interpolated crossing points so sparse paths still produce a box.
pub fn local_bbox_near(curve: &CurveObstacle, label_bbox: &BBox, margin: f64) -> Option<BBox> {
    let lo = label_bbox.x0 - margin;
    let hi = label_bbox.x1 + margin;
    let mut near: Vec<Point> = curve
        .pixels
        .iter()
        .copied()
        .filter(|p| p.0 >= lo && p.0 <= hi)
        .collect();
    for seg in curve.pixels.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let dx = b.0 - a.0;
        if dx.abs() <= SEGMENT_EPS {
            continue;
        }
        for edge in [lo, hi] {
            let t = (edge - a.0) / dx;
            if (0.0..=1.0).contains(&t) {
                near.push((edge, a.1 + (b.1 - a.1) * t));
            }
        }
    }
    BBox::from_points(&near)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: Vec<Point>) -> CurveObstacle {
        CurveObstacle::new(ElementId(0), SurfaceId(0), points)
    }

    #[test]
    fn pad_expands_every_side() {
        let b = pad(&BBox::new(10.0, 10.0, 20.0, 30.0), 5.0);
        assert_eq!(b, BBox::new(5.0, 5.0, 25.0, 35.0));
    }

    #[test]
    fn pad_degenerate_box_uses_absolute_pixels() {
        let line = BBox::new(0.0, 50.0, 100.0, 50.0);
        let padded = pad(&line, 3.0);
        assert_eq!(padded.height(), 6.0);
        assert_eq!(padded.width(), 106.0);
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!overlaps(&a, &b));
        assert!(overlaps(&a, &BBox::new(9.9, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn curve_hits_box_it_passes_through() {
        let c = curve(vec![(0.0, 20.0), (40.0, 20.0)]);
        assert!(curve_intersects(&c, &BBox::new(10.0, 10.0, 30.0, 30.0)));
    }

    #[test]
    fn curve_misses_box_inside_its_extents() {
        // V-shaped path whose extents cover the box but whose segments do not.
        let c = curve(vec![(0.0, 0.0), (50.0, 100.0), (100.0, 0.0)]);
        let bbox = BBox::new(40.0, 5.0, 60.0, 20.0);
        assert!(overlaps(&c.extents.unwrap(), &bbox));
        assert!(!curve_intersects(&c, &bbox));
    }

    #[test]
    fn local_bbox_is_limited_to_label_span() {
        let c = curve(vec![(0.0, 100.0), (100.0, 0.0), (200.0, 100.0)]);
        let local = local_bbox_near(&c, &BBox::new(140.0, 10.0, 160.0, 20.0), 0.0).unwrap();
        assert!((local.x0 - 140.0).abs() < 1e-9);
        assert!((local.x1 - 160.0).abs() < 1e-9);
        assert!((local.y0 - 40.0).abs() < 1e-9);
        assert!((local.y1 - 60.0).abs() < 1e-9);
    }

    #[test]
    fn local_bbox_none_when_curve_is_elsewhere() {
        let c = curve(vec![(0.0, 0.0), (10.0, 10.0)]);
        assert!(local_bbox_near(&c, &BBox::new(100.0, 0.0, 120.0, 10.0), 2.0).is_none());
    }

    #[test]
    fn polyline_distance_to_point() {
        let d = point_polyline_distance((5.0, 3.0), &[(0.0, 0.0), (10.0, 0.0)]);
        assert!((d - 3.0).abs() < 1e-9);
    }
}
