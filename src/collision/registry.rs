// Per-surface bookkeeping of what may move, what must be avoided and what is
// ignored. Entries are created lazily on first registration and dropped with
// `release` when the surface goes away.

use crate::figure::{ElementId, Figure, SurfaceId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Movable,
    Fixed,
    Passive,
    Curve,
}

#[derive(Debug, Default, Clone)]
struct SurfaceEntries {
    movable: Vec<ElementId>,
    fixed: Vec<ElementId>,
    passive: Vec<ElementId>,
    curves: Vec<ElementId>,
    members: HashSet<(Role, ElementId)>,
    /// Curve a movable label was placed on, for self-exclusion.
    sources: HashMap<ElementId, ElementId>,
}

impl SurfaceEntries {
    fn push(&mut self, role: Role, element: ElementId) -> bool {
        if !self.members.insert((role, element)) {
            return false;
        }
        match role {
            Role::Movable => self.movable.push(element),
            Role::Fixed => self.fixed.push(element),
            Role::Passive => self.passive.push(element),
            Role::Curve => self.curves.push(element),
        }
        true
    }
}

/// Something a label must stay clear of, before its geometry is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObstacleSource {
    /// Use the element's bounding box.
    Element(ElementId),
    /// Use the element's rendered path.
    Curve { element: ElementId, surface: SurfaceId },
}

#[derive(Debug, Default, Clone)]
pub struct Registry {
    surfaces: HashMap<SurfaceId, SurfaceEntries>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&mut self, surface: SurfaceId) -> &mut SurfaceEntries {
        self.surfaces.entry(surface).or_default()
    }

    pub fn register_movable(&mut self, surface: SurfaceId, element: ElementId) -> bool {
        self.entries(surface).push(Role::Movable, element)
    }

    /// Register a label that was placed on `curve`; the label is never pushed
    /// away from its own curve.
    pub fn register_movable_on_curve(
        &mut self,
        surface: SurfaceId,
        element: ElementId,
        curve: ElementId,
    ) -> bool {
        let entries = self.entries(surface);
        entries.sources.insert(element, curve);
        entries.push(Role::Movable, element)
    }

    pub fn register_fixed(&mut self, surface: SurfaceId, element: ElementId) -> bool {
        self.entries(surface).push(Role::Fixed, element)
    }

    pub fn register_passive(&mut self, surface: SurfaceId, element: ElementId) -> bool {
        self.entries(surface).push(Role::Passive, element)
    }

    pub fn register_curve_obstacle(&mut self, surface: SurfaceId, curve: ElementId) -> bool {
        self.entries(surface).push(Role::Curve, curve)
    }

    /// Forget every registration made against `surface`.
    pub fn release(&mut self, surface: SurfaceId) -> bool {
        self.surfaces.remove(&surface).is_some()
    }

    pub fn is_tracked(&self, surface: SurfaceId) -> bool {
        self.surfaces.contains_key(&surface)
    }

    pub fn movables(&self, surface: SurfaceId) -> &[ElementId] {
        self.surfaces
            .get(&surface)
            .map(|e| e.movable.as_slice())
            .unwrap_or(&[])
    }

    pub fn fixed(&self, surface: SurfaceId) -> &[ElementId] {
        self.surfaces
            .get(&surface)
            .map(|e| e.fixed.as_slice())
            .unwrap_or(&[])
    }

    pub fn curves(&self, surface: SurfaceId) -> &[ElementId] {
        self.surfaces
            .get(&surface)
            .map(|e| e.curves.as_slice())
            .unwrap_or(&[])
    }

    pub fn source_curve(&self, surface: SurfaceId, label: ElementId) -> Option<ElementId> {
        self.surfaces.get(&surface)?.sources.get(&label).copied()
    }

    fn is_passive(&self, surface: SurfaceId, element: ElementId) -> bool {
        self.surfaces
            .get(&surface)
            .is_some_and(|e| e.members.contains(&(Role::Passive, element)))
    }

    /// Everything a label on `surface` has to avoid, deduplicated and in a
    /// stable order: explicit fixed obstacles, bar-like patches of the surface
    /// and its siblings, labels of sibling surfaces, then curves.
    /// `excluded` must hold every label being resolved in the current pass.
    pub fn collect_obstacles(
        &self,
        figure: &Figure,
        surface: SurfaceId,
        excluded: &HashSet<ElementId>,
    ) -> Vec<ObstacleSource> {
        let siblings = figure.siblings(surface);
        let mut group = Vec::with_capacity(siblings.len() + 1);
        group.push(surface);
        group.extend(siblings.iter().copied());

        let mut seen: HashSet<ElementId> = HashSet::new();
        let mut out = Vec::new();

        for &element in self.fixed(surface) {
            if figure.is_visible(element) && !excluded.contains(&element) && seen.insert(element) {
                out.push(ObstacleSource::Element(element));
            }
        }

        for &s in &group {
            let Some(owner) = figure.surface(s) else {
                continue;
            };
            for &element in owner.elements() {
                let Some(el) = figure.element(element) else {
                    continue;
                };
                if !el.is_patch() || !el.visible || excluded.contains(&element) {
                    continue;
                }
                if group.iter().any(|&g| self.is_passive(g, element)) {
                    continue;
                }
                if seen.insert(element) {
                    out.push(ObstacleSource::Element(element));
                }
            }
        }

        for &s in &siblings {
            for &label in self.movables(s) {
                if figure.is_visible(label) && !excluded.contains(&label) && seen.insert(label) {
                    out.push(ObstacleSource::Element(label));
                }
            }
        }

        for &s in &group {
            for &curve in self.curves(s) {
                if figure.is_visible(curve) && seen.insert(curve) {
                    out.push(ObstacleSource::Curve {
                        element: curve,
                        surface: s,
                    });
                }
            }
        }

        out
    }
}
