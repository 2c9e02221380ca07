// Visual surfaces and the element arena they draw from.
//
// A `Figure` owns every surface (one coordinate system each) and every drawn
// element. Surfaces created with `twinx` share their x axis and plotting
// rectangle with the surface they were created from.

pub mod transform;

use crate::collision::geometry::{BBox, Point};
use crate::error::ChartError;
use serde::Serialize;
use std::collections::BTreeMap;

pub use transform::{Axis, AxisKind, DataValue, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum HAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum VAlign {
    Top,
    #[default]
    Center,
    /// Text sits above its position.
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum AxisSide {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextElement {
    pub text: String,
    /// Data coordinates of the text anchor point.
    pub position: Point,
    /// Fixed pixel offset applied after the transform.
    pub offset: Point,
    pub font_size: f64,
    pub color: String,
    pub h_align: HAlign,
    pub v_align: VAlign,
    pub background: Option<String>,
}

impl TextElement {
    pub fn new(text: impl Into<String>, position: Point, font_size: f64, color: &str) -> Self {
        Self {
            text: text.into(),
            position,
            offset: (0.0, 0.0),
            font_size,
            color: color.to_string(),
            h_align: HAlign::Center,
            v_align: VAlign::Center,
            background: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PatchRole {
    Bar,
    Band,
    Legend,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PatchGeometry {
    /// Rectangle with both corners in data coordinates.
    Data { x0: f64, y0: f64, x1: f64, y1: f64 },
    /// Full-height span between two x values.
    XSpan { x0: f64, x1: f64 },
    /// Full-width span between two y values.
    YSpan { y0: f64, y1: f64 },
    /// Already in figure pixels (legends, debug overlays).
    Pixels(BBox),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchElement {
    pub geometry: PatchGeometry,
    pub fill: String,
    pub stroke: Option<String>,
    pub role: PatchRole,
    /// Text drawn inside pixel patches (legend entries).
    pub lines: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDash {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LineGeometry {
    Data(Vec<Point>),
    /// Horizontal line across the plotting area at data `y`.
    Horizontal(f64),
    /// Vertical line across the plotting area at data `x`.
    Vertical(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineElement {
    pub geometry: LineGeometry,
    pub color: String,
    pub width: f64,
    pub dash: LineDash,
    pub markers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementKind {
    Text(TextElement),
    Patch(PatchElement),
    Line(LineElement),
}

impl ElementKind {
    fn default_zorder(&self) -> f64 {
        match self {
            ElementKind::Patch(p) if p.role == PatchRole::Band => 0.5,
            ElementKind::Patch(p) if p.role == PatchRole::Legend => 5.0,
            ElementKind::Patch(p) if p.role == PatchRole::Overlay => 10.0,
            ElementKind::Patch(_) => 1.0,
            ElementKind::Line(_) => 2.0,
            ElementKind::Text(_) => 3.0,
        }
    }

    /// Data extent used for autoscaling: `(x_range, y_range)`.
    fn data_extent(&self) -> (Option<(f64, f64)>, Option<(f64, f64)>) {
        match self {
            ElementKind::Patch(patch) => match patch.geometry {
                PatchGeometry::Data { x0, y0, x1, y1 } => (Some((x0, x1)), Some((y0, y1))),
                PatchGeometry::XSpan { x0, x1 } => (Some((x0, x1)), None),
                PatchGeometry::YSpan { y0, y1 } => (None, Some((y0, y1))),
                PatchGeometry::Pixels(_) => (None, None),
            },
            ElementKind::Line(line) => match &line.geometry {
                LineGeometry::Data(points) => (
                    extent(points.iter().map(|p| p.0)),
                    extent(points.iter().map(|p| p.1)),
                ),
                LineGeometry::Horizontal(y) => (None, Some((*y, *y))),
                LineGeometry::Vertical(x) => (Some((*x, *x)), None),
            },
            // Text never drives the view limits.
            ElementKind::Text(_) => (None, None),
        }
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: ElementId,
    pub surface: SurfaceId,
    pub kind: ElementKind,
    pub visible: bool,
    pub zorder: f64,
    pub alpha: f64,
}

impl Element {
    pub fn as_text(&self) -> Option<&TextElement> {
        match &self.kind {
            ElementKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_patch(&self) -> bool {
        matches!(self.kind, ElementKind::Patch(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Surface {
    pub id: SurfaceId,
    pub group: GroupId,
    pub plot_area: BBox,
    pub y_axis: Axis,
    pub side: AxisSide,
    pub y_label: Option<String>,
    elements: Vec<ElementId>,
}

impl Surface {
    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }
}

/// Saved view limits of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewLimits {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub width: f64,
    pub height: f64,
    pub title: Option<String>,
    surfaces: BTreeMap<SurfaceId, Surface>,
    x_axes: BTreeMap<GroupId, Axis>,
    elements: BTreeMap<ElementId, Element>,
    next_surface: u32,
    next_group: u32,
    next_element: u32,
}

impl Figure {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            title: None,
            surfaces: BTreeMap::new(),
            x_axes: BTreeMap::new(),
            elements: BTreeMap::new(),
            next_surface: 0,
            next_group: 0,
            next_element: 0,
        }
    }

    pub fn add_surface(&mut self, plot_area: BBox, x_kind: AxisKind) -> SurfaceId {
        let group = GroupId(self.next_group);
        self.next_group += 1;
        self.x_axes.insert(group, Axis::new(x_kind));
        self.insert_surface(group, plot_area, AxisSide::Left)
    }

    /// New surface sharing the x axis and plotting rectangle of `base`.
    pub fn twinx(&mut self, base: SurfaceId) -> Result<SurfaceId, ChartError> {
        let (group, plot_area) = {
            let surface = self.surface(base).ok_or(ChartError::UnknownSurface(base))?;
            (surface.group, surface.plot_area)
        };
        Ok(self.insert_surface(group, plot_area, AxisSide::Right))
    }

    fn insert_surface(&mut self, group: GroupId, plot_area: BBox, side: AxisSide) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        self.surfaces.insert(
            id,
            Surface {
                id,
                group,
                plot_area,
                y_axis: Axis::new(AxisKind::Linear),
                side,
                y_label: None,
                elements: Vec::new(),
            },
        );
        id
    }

    /// Drop a surface and every element drawn on it.
    pub fn remove_surface(&mut self, id: SurfaceId) -> bool {
        let Some(surface) = self.surfaces.remove(&id) else {
            return false;
        };
        for element in &surface.elements {
            self.elements.remove(element);
        }
        if !self.surfaces.values().any(|s| s.group == surface.group) {
            self.x_axes.remove(&surface.group);
        }
        true
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = &Surface> {
        self.surfaces.values()
    }

    /// Other surfaces sharing `id`'s x axis, in id order.
    pub fn siblings(&self, id: SurfaceId) -> Vec<SurfaceId> {
        let Some(group) = self.surface(id).map(|s| s.group) else {
            return Vec::new();
        };
        self.surfaces
            .values()
            .filter(|s| s.group == group && s.id != id)
            .map(|s| s.id)
            .collect()
    }

    pub fn x_axis(&self, id: SurfaceId) -> Option<&Axis> {
        self.surface(id).and_then(|s| self.x_axes.get(&s.group))
    }

    pub fn x_axis_mut(&mut self, id: SurfaceId) -> Option<&mut Axis> {
        let group = self.surface(id)?.group;
        self.x_axes.get_mut(&group)
    }

    pub fn transform(&self, id: SurfaceId) -> Option<Transform> {
        let surface = self.surface(id)?;
        let x_axis = self.x_axes.get(&surface.group)?;
        Some(Transform::new(surface.plot_area, x_axis, &surface.y_axis))
    }

    pub fn view_limits(&self, id: SurfaceId) -> Option<ViewLimits> {
        Some(ViewLimits {
            x: self.x_axis(id)?.limits(),
            y: self.surface(id)?.y_axis.limits(),
        })
    }

    pub fn restore_view_limits(&mut self, id: SurfaceId, limits: ViewLimits) {
        if let Some(axis) = self.x_axis_mut(id) {
            axis.restore_limits(limits.x);
        }
        if let Some(surface) = self.surface_mut(id) {
            surface.y_axis.restore_limits(limits.y);
        }
    }

    pub fn set_xlim(&mut self, id: SurfaceId, min: f64, max: f64) -> Result<(), ChartError> {
        self.x_axis_mut(id)
            .ok_or(ChartError::UnknownSurface(id))?
            .set_limits(min, max);
        Ok(())
    }

    pub fn set_ylim(&mut self, id: SurfaceId, min: f64, max: f64) -> Result<(), ChartError> {
        self.surface_mut(id)
            .ok_or(ChartError::UnknownSurface(id))?
            .y_axis
            .set_limits(min, max);
        Ok(())
    }

    pub fn add_element(&mut self, surface: SurfaceId, kind: ElementKind) -> Result<ElementId, ChartError> {
        let zorder = kind.default_zorder();
        self.add_element_with_zorder(surface, kind, zorder)
    }

    pub fn add_element_with_zorder(
        &mut self,
        surface: SurfaceId,
        kind: ElementKind,
        zorder: f64,
    ) -> Result<ElementId, ChartError> {
        if !self.surfaces.contains_key(&surface) {
            return Err(ChartError::UnknownSurface(surface));
        }
        let (x_range, y_range) = kind.data_extent();
        if let Some((lo, hi)) = x_range
            && let Some(axis) = self.x_axis_mut(surface)
        {
            axis.include(lo, hi);
        }
        if let Some((lo, hi)) = y_range
            && let Some(s) = self.surface_mut(surface)
        {
            s.y_axis.include(lo, hi);
        }

        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.elements.insert(
            id,
            Element {
                id,
                surface,
                kind,
                visible: true,
                zorder,
                alpha: 1.0,
            },
        );
        if let Some(s) = self.surface_mut(surface) {
            s.elements.push(id);
        }
        Ok(id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn is_visible(&self, id: ElementId) -> bool {
        self.element(id).is_some_and(|e| e.visible)
    }

    /// All elements in paint order (zorder, then creation order).
    pub fn paint_order(&self) -> Vec<&Element> {
        let mut ordered: Vec<&Element> = self.elements.values().collect();
        ordered.sort_by(|a, b| a.zorder.total_cmp(&b.zorder).then(a.id.cmp(&b.id)));
        ordered
    }

    /// Move a text element to a new data position. Returns false for
    /// anything that is not text.
    pub fn set_text_position(&mut self, id: ElementId, position: Point) -> bool {
        match self.elements.get_mut(&id).map(|e| &mut e.kind) {
            Some(ElementKind::Text(text)) => {
                text.position = position;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(x0: f64, x1: f64, y: f64) -> ElementKind {
        ElementKind::Patch(PatchElement {
            geometry: PatchGeometry::Data { x0, y0: 0.0, x1, y1: y },
            fill: "#4e79a7".to_string(),
            stroke: None,
            role: PatchRole::Bar,
            lines: Vec::new(),
        })
    }

    #[test]
    fn twin_surfaces_are_siblings() {
        let mut fig = Figure::new(640.0, 480.0);
        let left = fig.add_surface(BBox::new(60.0, 40.0, 600.0, 420.0), AxisKind::Linear);
        let right = fig.twinx(left).unwrap();
        let other = fig.add_surface(BBox::new(0.0, 0.0, 10.0, 10.0), AxisKind::Linear);
        assert_eq!(fig.siblings(left), vec![right]);
        assert_eq!(fig.siblings(right), vec![left]);
        assert!(fig.siblings(other).is_empty());
        assert_eq!(fig.surface(right).unwrap().plot_area, fig.surface(left).unwrap().plot_area);
    }

    #[test]
    fn twins_share_x_limits() {
        let mut fig = Figure::new(640.0, 480.0);
        let left = fig.add_surface(BBox::new(60.0, 40.0, 600.0, 420.0), AxisKind::Linear);
        let right = fig.twinx(left).unwrap();
        fig.add_element(left, bar(0.0, 1.0, 5.0)).unwrap();
        fig.add_element(right, bar(4.0, 5.0, 500.0)).unwrap();
        assert_eq!(fig.x_axis(left).unwrap().limits(), (0.0, 5.0));
        assert_eq!(fig.view_limits(right).unwrap().x, (0.0, 5.0));
        assert_eq!(fig.view_limits(left).unwrap().y, (0.0, 5.0));
        assert_eq!(fig.view_limits(right).unwrap().y, (0.0, 500.0));
    }

    #[test]
    fn removing_a_surface_drops_its_elements() {
        let mut fig = Figure::new(100.0, 100.0);
        let s = fig.add_surface(BBox::new(0.0, 0.0, 100.0, 100.0), AxisKind::Linear);
        let e = fig.add_element(s, bar(0.0, 1.0, 1.0)).unwrap();
        assert!(fig.remove_surface(s));
        assert!(fig.element(e).is_none());
        assert!(fig.add_element(s, bar(0.0, 1.0, 1.0)).is_err());
    }

    #[test]
    fn text_does_not_autoscale() {
        let mut fig = Figure::new(100.0, 100.0);
        let s = fig.add_surface(BBox::new(0.0, 0.0, 100.0, 100.0), AxisKind::Linear);
        fig.add_element(s, bar(0.0, 2.0, 2.0)).unwrap();
        let text = TextElement::new("far", (50.0, 50.0), 10.0, "#000");
        fig.add_element(s, ElementKind::Text(text)).unwrap();
        assert_eq!(fig.view_limits(s).unwrap().y, (0.0, 2.0));
    }

    #[test]
    fn paint_order_follows_zorder() {
        let mut fig = Figure::new(100.0, 100.0);
        let s = fig.add_surface(BBox::new(0.0, 0.0, 100.0, 100.0), AxisKind::Linear);
        let text = fig
            .add_element(s, ElementKind::Text(TextElement::new("a", (0.0, 0.0), 10.0, "#000")))
            .unwrap();
        let patch = fig.add_element(s, bar(0.0, 1.0, 1.0)).unwrap();
        let order: Vec<ElementId> = fig.paint_order().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![patch, text]);
    }
}
