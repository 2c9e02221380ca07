// Translucent boxes showing what the resolver saw.

use super::geometry::BBox;
use super::registry::Registry;
use crate::figure::{ElementId, ElementKind, Figure, PatchElement, PatchGeometry, PatchRole, SurfaceId};

pub const OVERLAY_ALPHA: f64 = 0.15;
pub const LABEL_OVERLAY_COLOR: &str = "#1f77b4";
pub const OBSTACLE_OVERLAY_COLOR: &str = "#d62728";

/// Add one rectangle per label box (blue) and per obstacle box (red). The
/// rectangles are registered passive so later passes ignore them.
pub fn draw_overlay(
    figure: &mut Figure,
    registry: &mut Registry,
    obstacle_surface: SurfaceId,
    labels: &[(SurfaceId, BBox)],
    obstacles: &[BBox],
) -> Vec<ElementId> {
    let boxes = labels
        .iter()
        .map(|(s, b)| (*s, *b, LABEL_OVERLAY_COLOR))
        .chain(obstacles.iter().map(|b| (obstacle_surface, *b, OBSTACLE_OVERLAY_COLOR)));

    let mut drawn = Vec::new();
    for (surface, bbox, color) in boxes {
        let patch = ElementKind::Patch(PatchElement {
            geometry: PatchGeometry::Pixels(bbox),
            fill: color.to_string(),
            stroke: Some(color.to_string()),
            role: PatchRole::Overlay,
            lines: Vec::new(),
        });
        let Ok(id) = figure.add_element(surface, patch) else {
            continue;
        };
        if let Some(el) = figure.element_mut(id) {
            el.alpha = OVERLAY_ALPHA;
        }
        registry.register_passive(surface, id);
        drawn.push(id);
    }
    drawn
}
