// Iterative resolution of movable labels against everything they must avoid.
//
// One pass: trigger a layout, materialize the obstacle set once (rectangles
// padded, curves transformed to pixels), then sweep the labels in
// registration order until a sweep moves nothing or the iteration cap hits.

use super::connector::draw_connectors;
use super::debug::draw_overlay;
use super::geometry::{
    BBox, CurveObstacle, Point, curve_intersects, distance, local_bbox_near, overlaps, pad,
    point_polyline_distance,
};
use super::registry::{ObstacleSource, Registry};
use super::solver::{self, Displacement, Movement};
use crate::config::ResolutionConfig;
use crate::figure::{ElementId, Figure, SurfaceId};
use crate::render::Renderer;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace};

/// A label whose anchor is within this distance of a curve on its own
/// surface is treated as sitting on that curve.
pub const SELF_EXCLUSION_TOLERANCE_PX: f64 = 0.5;

#[derive(Debug, Clone)]
enum Obstacle {
    Rect { id: ElementId, padded: BBox },
    Curve(CurveObstacle),
}

impl Obstacle {
    fn id(&self) -> ElementId {
        match self {
            Obstacle::Rect { id, .. } => *id,
            Obstacle::Curve(curve) => curve.element,
        }
    }

    fn intersects(&self, padded_label: &BBox) -> bool {
        match self {
            Obstacle::Rect { padded, .. } => overlaps(padded_label, padded),
            Obstacle::Curve(curve) => curve_intersects(curve, padded_label),
        }
    }

    /// Box the solver has to clear. For curves only the stretch near the
    /// label counts; the full extents usually span the whole plot.
    fn target(&self, padded_label: &BBox, obstacle_padding: f64) -> Option<BBox> {
        match self {
            Obstacle::Rect { padded, .. } => Some(*padded),
            Obstacle::Curve(curve) => local_bbox_near(curve, padded_label, obstacle_padding)
                .or(curve.extents)
                .map(|b| pad(&b, obstacle_padding)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Hit {
    Obstacle(usize),
    Label(usize),
}

#[derive(Debug, Clone)]
struct LabelState {
    element: ElementId,
    surface: SurfaceId,
    anchor_data: Point,
    anchor_px: Point,
    bbox: BBox,
    /// Indices of curve obstacles this label sits on.
    excluded: HashSet<usize>,
    moves: usize,
}

/// Outcome for one label after a resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelOutcome {
    pub element: ElementId,
    pub surface: SurfaceId,
    pub anchor_data: Point,
    pub final_data: Point,
    pub anchor_px: Point,
    pub final_px: Point,
    pub displacement_px: f64,
    pub moves: usize,
    pub still_colliding: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub iterations: usize,
    pub displacements: usize,
    pub converged: bool,
    pub labels: Vec<LabelOutcome>,
    pub connectors: Vec<ElementId>,
    pub overlays: Vec<ElementId>,
}

impl ResolutionReport {
    fn empty() -> Self {
        Self {
            converged: true,
            ..Self::default()
        }
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &LabelOutcome> {
        self.labels.iter().filter(|l| l.still_colliding)
    }
}

struct Pass<'a> {
    obstacles: Vec<Obstacle>,
    labels: Vec<LabelState>,
    bounds: BBox,
    cfg: &'a ResolutionConfig,
}

impl Pass<'_> {
    /// Everything label `i` collides with when its padded box is `padded`.
    /// Labels only yield to labels registered before them, so a pairwise
    /// conflict moves the later label.
    fn collisions(&self, i: usize, padded: &BBox) -> Vec<Hit> {
        let label = &self.labels[i];
        let mut hits: Vec<Hit> = self
            .obstacles
            .iter()
            .enumerate()
            .filter(|(k, o)| !label.excluded.contains(k) && o.intersects(padded))
            .map(|(k, _)| Hit::Obstacle(k))
            .collect();
        for (j, other) in self.labels[..i].iter().enumerate() {
            if overlaps(padded, &pad(&other.bbox, self.cfg.label_padding)) {
                hits.push(Hit::Label(j));
            }
        }
        hits
    }

    /// Labels registered after `i` that overlap it. They never make `i`
    /// yield, but a move of `i` must not land on a new one.
    fn later_overlaps(&self, i: usize, padded: &BBox) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .skip(i + 1)
            .filter(|(_, other)| overlaps(padded, &pad(&other.bbox, self.cfg.label_padding)))
            .map(|(j, _)| j)
            .collect()
    }

    fn collides_with_any_label(&self, i: usize, padded: &BBox) -> bool {
        self.labels
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && overlaps(padded, &pad(&other.bbox, self.cfg.label_padding)))
    }

    fn target(&self, hit: Hit, padded: &BBox) -> Option<BBox> {
        match hit {
            Hit::Obstacle(k) => self.obstacles[k].target(padded, self.cfg.obstacle_padding),
            Hit::Label(j) => Some(pad(&self.labels[j].bbox, self.cfg.label_padding)),
        }
    }

    /// A move is acceptable when it clears `target` and the label collides
    /// with nothing it did not already collide with, later labels included.
    fn accepts(&self, i: usize, before: &[Hit], later: &[usize], target: Hit, moved: &BBox) -> bool {
        let after = self.collisions(i, moved);
        !after.contains(&target)
            && after.iter().all(|h| before.contains(h))
            && self.later_overlaps(i, moved).iter().all(|j| later.contains(j))
    }

    /// Smallest acceptable move for label `i`, trying its collisions in
    /// order; diagonal moves only once no axis move works.
    fn displacement(&self, i: usize, padded: &BBox, before: &[Hit]) -> Option<Displacement> {
        let movement = self.cfg.movement;
        let later = self.later_overlaps(i, padded);
        for &hit in before {
            let Some(target) = self.target(hit, padded) else {
                continue;
            };
            if let Some(d) = solver::solve_with(padded, &target, movement, &self.bounds, |moved| {
                self.accepts(i, before, &later, hit, moved)
            }) {
                return Some(d);
            }
        }
        if movement != Movement::XY {
            return None;
        }
        for &hit in before {
            let Some(target) = self.target(hit, padded) else {
                continue;
            };
            if let Some(d) = solver::solve_diagonal(padded, &target, movement, &self.bounds, |moved| {
                self.accepts(i, before, &later, hit, moved)
            }) {
                return Some(d);
            }
        }
        None
    }
}

/// Resolve the labels registered on one surface.
pub fn resolve_surface<R: Renderer>(
    figure: &mut Figure,
    registry: &mut Registry,
    renderer: &mut R,
    surface: SurfaceId,
    cfg: &ResolutionConfig,
) -> ResolutionReport {
    resolve_composed(figure, registry, renderer, &[surface], cfg)
}

/// Resolve the labels of several surfaces jointly. The first surface's
/// plotting area bounds every label.
pub fn resolve_composed<R: Renderer>(
    figure: &mut Figure,
    registry: &mut Registry,
    renderer: &mut R,
    surfaces: &[SurfaceId],
    cfg: &ResolutionConfig,
) -> ResolutionReport {
    let Some(first) = surfaces.first().and_then(|s| figure.surface(*s)) else {
        debug!(?surfaces, "no surface to resolve");
        return ResolutionReport::empty();
    };
    let bounds = pad(&first.plot_area, cfg.label_padding);

    let mut movables: Vec<(SurfaceId, ElementId)> = Vec::new();
    let mut seen = HashSet::new();
    for &surface in surfaces {
        for &label in registry.movables(surface) {
            if seen.insert(label) {
                movables.push((surface, label));
            }
        }
    }
    if movables.is_empty() {
        debug!(?surfaces, "no movable labels registered");
        return ResolutionReport::empty();
    }

    renderer.draw(figure);

    let excluded: HashSet<ElementId> = movables.iter().map(|(_, id)| *id).collect();
    let mut sources: Vec<ObstacleSource> = Vec::new();
    let mut seen_sources = HashSet::new();
    for &surface in surfaces {
        for source in registry.collect_obstacles(figure, surface, &excluded) {
            if seen_sources.insert(source) {
                sources.push(source);
            }
        }
    }

    let obstacles: Vec<Obstacle> = sources
        .into_iter()
        .filter_map(|source| match source {
            ObstacleSource::Element(id) => renderer.window_extent(figure, id).map(|b| Obstacle::Rect {
                id,
                padded: pad(&b, cfg.obstacle_padding),
            }),
            ObstacleSource::Curve { element, surface } => {
                let pixels = renderer.path_pixels(figure, element);
                (pixels.len() >= 2).then(|| Obstacle::Curve(CurveObstacle::new(element, surface, pixels)))
            }
        })
        .collect();

    let labels: Vec<LabelState> = movables
        .iter()
        .filter_map(|&(surface, element)| {
            label_state(figure, registry, renderer, surface, element, &obstacles)
        })
        .collect();

    let mut pass = Pass {
        obstacles,
        labels,
        bounds,
        cfg,
    };
    debug!(
        labels = pass.labels.len(),
        obstacles = pass.obstacles.len(),
        "starting label resolution"
    );

    let mut iterations = 0;
    let mut displacements = 0;
    let mut converged = false;
    while iterations < cfg.max_iterations {
        iterations += 1;
        let mut moved = 0;
        for i in 0..pass.labels.len() {
            let element = pass.labels[i].element;
            if let Some(current) = renderer.window_extent(figure, element) {
                pass.labels[i].bbox = current;
            }
            let padded = pad(&pass.labels[i].bbox, cfg.label_padding);
            let before = pass.collisions(i, &padded);
            if before.is_empty() {
                continue;
            }
            let Some(d) = pass.displacement(i, &padded, &before) else {
                trace!(?element, collisions = before.len(), "no acceptable move");
                continue;
            };
            if apply(figure, &pass.labels[i], d) {
                trace!(?element, dx = d.dx, dy = d.dy, "label moved");
                let fallback = pass.labels[i].bbox.translate(d.dx, d.dy);
                let state = &mut pass.labels[i];
                state.bbox = renderer.window_extent(figure, element).unwrap_or(fallback);
                state.moves += 1;
                moved += 1;
            }
        }
        displacements += moved;
        debug!(iteration = iterations, moved, "resolution sweep");
        if moved == 0 {
            converged = true;
            break;
        }
    }

    let mut outcomes = Vec::with_capacity(pass.labels.len());
    for (i, state) in pass.labels.iter().enumerate() {
        let padded = pad(&state.bbox, cfg.label_padding);
        let still_colliding =
            !pass.collisions(i, &padded).is_empty() || pass.collides_with_any_label(i, &padded);
        if still_colliding {
            debug!(element = ?state.element, "label left colliding");
        }
        let final_data = text_position(figure, state.element).unwrap_or(state.anchor_data);
        let final_px = figure
            .transform(state.surface)
            .map(|t| t.to_pixel(final_data))
            .unwrap_or(state.anchor_px);
        outcomes.push(LabelOutcome {
            element: state.element,
            surface: state.surface,
            anchor_data: state.anchor_data,
            final_data,
            anchor_px: state.anchor_px,
            final_px,
            displacement_px: distance(state.anchor_px, final_px),
            moves: state.moves,
            still_colliding,
        });
    }

    let connectors = draw_connectors(figure, &outcomes, cfg);
    let overlays = if cfg.debug_overlay {
        let label_boxes: Vec<(SurfaceId, BBox)> =
            pass.labels.iter().map(|l| (l.surface, l.bbox)).collect();
        let obstacle_boxes: Vec<BBox> = pass
            .obstacles
            .iter()
            .filter_map(|o| match o {
                Obstacle::Rect { padded, .. } => Some(*padded),
                Obstacle::Curve(_) => None,
            })
            .collect();
        draw_overlay(figure, registry, surfaces[0], &label_boxes, &obstacle_boxes)
    } else {
        Vec::new()
    };

    debug!(
        iterations,
        displacements,
        converged,
        connectors = connectors.len(),
        obstacles = ?pass.obstacles.iter().map(Obstacle::id).collect::<Vec<_>>(),
        "label resolution finished"
    );

    ResolutionReport {
        iterations,
        displacements,
        converged,
        labels: outcomes,
        connectors,
        overlays,
    }
}

fn text_position(figure: &Figure, element: ElementId) -> Option<Point> {
    figure.element(element)?.as_text().map(|t| t.position)
}

fn label_state<R: Renderer>(
    figure: &Figure,
    registry: &Registry,
    renderer: &R,
    surface: SurfaceId,
    element: ElementId,
    obstacles: &[Obstacle],
) -> Option<LabelState> {
    let el = figure.element(element)?;
    if !el.visible {
        return None;
    }
    let registered_on = surface;
    // Labels always move in their own surface's coordinates.
    let surface = el.surface;
    let anchor_data = el.as_text()?.position;
    let anchor_px = figure.transform(surface)?.to_pixel(anchor_data);
    let bbox = renderer.window_extent(figure, element)?;
    if bbox.width() <= 0.0 && bbox.height() <= 0.0 {
        return None;
    }
    let source = registry.source_curve(registered_on, element);
    let excluded = obstacles
        .iter()
        .enumerate()
        .filter_map(|(k, o)| match o {
            Obstacle::Curve(curve)
                if Some(curve.element) == source
                    || (curve.surface == surface
                        && point_polyline_distance(anchor_px, &curve.pixels)
                            <= SELF_EXCLUSION_TOLERANCE_PX) =>
            {
                Some(k)
            }
            _ => None,
        })
        .collect();
    Some(LabelState {
        element,
        surface,
        anchor_data,
        anchor_px,
        bbox,
        excluded,
        moves: 0,
    })
}

/// Shift a label by a pixel delta, converting back to its data
/// coordinates.
fn apply(figure: &mut Figure, label: &LabelState, d: Displacement) -> bool {
    let Some(transform) = figure.transform(label.surface) else {
        return false;
    };
    let Some(position) = text_position(figure, label.element) else {
        return false;
    };
    let (px, py) = transform.to_pixel(position);
    let moved = transform.to_data((px + d.dx, py + d.dy));
    figure.set_text_position(label.element, moved)
}
