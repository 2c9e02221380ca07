// Guide lines from a displaced label back to where it was anchored.

use super::resolve::LabelOutcome;
use crate::config::ResolutionConfig;
use crate::figure::{ElementId, ElementKind, Figure, LineElement, LineGeometry, SurfaceId, ViewLimits};
use std::collections::BTreeMap;
use tracing::trace;

/// Color used when neither the config nor a theme supplied one.
pub const DEFAULT_CONNECTOR_COLOR: &str = "#B0B8C8";

/// Draw a connector for every label displaced further than the configured
/// threshold. Connectors sit just beneath their label and are never
/// registered as obstacles. View limits of every touched surface are put
/// back afterwards so the new lines cannot rescale the axes.
pub fn draw_connectors(
    figure: &mut Figure,
    labels: &[LabelOutcome],
    cfg: &ResolutionConfig,
) -> Vec<ElementId> {
    let style = &cfg.connector;
    let color = style.color.as_deref().unwrap_or(DEFAULT_CONNECTOR_COLOR);

    let mut saved: BTreeMap<SurfaceId, ViewLimits> = BTreeMap::new();
    let mut drawn = Vec::new();
    for label in labels {
        if label.displacement_px <= cfg.connector_threshold {
            continue;
        }
        let Some(zorder) = figure.element(label.element).map(|e| e.zorder) else {
            continue;
        };
        if !saved.contains_key(&label.surface) {
            let Some(limits) = figure.view_limits(label.surface) else {
                continue;
            };
            saved.insert(label.surface, limits);
        }
        let line = ElementKind::Line(LineElement {
            geometry: LineGeometry::Data(vec![label.anchor_data, label.final_data]),
            color: color.to_string(),
            width: style.width,
            dash: style.dash,
            markers: false,
        });
        if let Ok(id) = figure.add_element_with_zorder(label.surface, line, zorder - 0.5) {
            if let Some(el) = figure.element_mut(id) {
                el.alpha = style.alpha;
            }
            trace!(label = ?label.element, connector = ?id, distance = label.displacement_px, "connector drawn");
            drawn.push(id);
        }
    }

    for (surface, limits) in saved {
        figure.restore_view_limits(surface, limits);
    }
    drawn
}
