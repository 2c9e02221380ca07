// Minimal displacement that clears one label/obstacle pair.

use super::geometry::BBox;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Extra distance beyond exact edge contact. Keeps the strict overlap test
/// stable after the pixel -> data -> pixel round trip.
pub const CLEARANCE_EPS: f64 = 0.01;

/// Directions a label may be moved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    X,
    #[default]
    Y,
    XY,
}

impl Movement {
    fn allows_x(self) -> bool {
        matches!(self, Movement::X | Movement::XY)
    }

    fn allows_y(self) -> bool {
        matches!(self, Movement::Y | Movement::XY)
    }
}

impl FromStr for Movement {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Movement::X),
            "y" => Ok(Movement::Y),
            "xy" | "yx" | "both" => Ok(Movement::XY),
            other => Err(ConfigError::UnknownMovement(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Right,
    Left,
}

impl Direction {
    fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

/// Pixel translation. `dy < 0` moves up on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    pub fn magnitude(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// The four axis-aligned moves that just clear `obstacle`, in tie-break
/// order: up, down, right, left.
pub fn candidates(label: &BBox, obstacle: &BBox) -> [(Direction, Displacement); 4] {
    [
        (
            Direction::Up,
            Displacement {
                dx: 0.0,
                dy: obstacle.y0 - label.y1 - CLEARANCE_EPS,
            },
        ),
        (
            Direction::Down,
            Displacement {
                dx: 0.0,
                dy: obstacle.y1 - label.y0 + CLEARANCE_EPS,
            },
        ),
        (
            Direction::Right,
            Displacement {
                dx: obstacle.x1 - label.x0 + CLEARANCE_EPS,
                dy: 0.0,
            },
        ),
        (
            Direction::Left,
            Displacement {
                dx: obstacle.x0 - label.x1 - CLEARANCE_EPS,
                dy: 0.0,
            },
        ),
    ]
}

fn in_bounds(label: &BBox, d: &Displacement, bounds: &BBox) -> bool {
    label.translate(d.dx, d.dy).within(bounds)
}

/// Smallest axis move that clears `obstacle` while keeping the label inside
/// `bounds` and satisfying `accept`. Ties go to the earlier candidate.
pub fn solve_with<F>(
    label: &BBox,
    obstacle: &BBox,
    movement: Movement,
    bounds: &BBox,
    mut accept: F,
) -> Option<Displacement>
where
    F: FnMut(&BBox) -> bool,
{
    let mut best: Option<Displacement> = None;
    for (dir, d) in candidates(label, obstacle) {
        let allowed = if dir.is_vertical() {
            movement.allows_y()
        } else {
            movement.allows_x()
        };
        if !allowed || !in_bounds(label, &d, bounds) {
            continue;
        }
        if best.is_some_and(|b| d.magnitude() >= b.magnitude()) {
            continue;
        }
        if accept(&label.translate(d.dx, d.dy)) {
            best = Some(d);
        }
    }
    best
}

/// Plain solver: bounds and movement policy only.
pub fn solve(label: &BBox, obstacle: &BBox, movement: Movement, bounds: &BBox) -> Option<Displacement> {
    solve_with(label, obstacle, movement, bounds, |_| true)
}

/// Diagonal fallback: the smallest in-bounds vertical offset paired with the
/// smallest in-bounds horizontal offset. Only meaningful for `Movement::XY`.
pub fn solve_diagonal<F>(
    label: &BBox,
    obstacle: &BBox,
    movement: Movement,
    bounds: &BBox,
    mut accept: F,
) -> Option<Displacement>
where
    F: FnMut(&BBox) -> bool,
{
    if movement != Movement::XY {
        return None;
    }
    let mut best_dy: Option<f64> = None;
    let mut best_dx: Option<f64> = None;
    for (dir, d) in candidates(label, obstacle) {
        if !in_bounds(label, &d, bounds) {
            continue;
        }
        if dir.is_vertical() {
            if best_dy.is_none_or(|b| d.dy.abs() < b.abs()) {
                best_dy = Some(d.dy);
            }
        } else if best_dx.is_none_or(|b| d.dx.abs() < b.abs()) {
            best_dx = Some(d.dx);
        }
    }
    let d = Displacement {
        dx: best_dx?,
        dy: best_dy?,
    };
    let moved = label.translate(d.dx, d.dy);
    (moved.within(bounds) && accept(&moved)).then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plot() -> BBox {
        BBox::new(0.0, 0.0, 400.0, 300.0)
    }

    #[test]
    fn picks_shortest_vertical_move() {
        // Obstacle sits on the lower part of the label.
        let label = BBox::new(100.0, 100.0, 140.0, 120.0);
        let obstacle = BBox::new(90.0, 115.0, 150.0, 200.0);
        let d = solve(&label, &obstacle, Movement::Y, &plot()).unwrap();
        assert_eq!(d.dx, 0.0);
        assert_relative_eq!(d.dy, -5.0 - CLEARANCE_EPS, epsilon = 1e-9);
    }

    #[test]
    fn y_policy_never_moves_horizontally() {
        let label = BBox::new(100.0, 100.0, 110.0, 200.0);
        let obstacle = BBox::new(105.0, 0.0, 300.0, 300.0);
        assert!(solve(&label, &obstacle, Movement::Y, &plot()).is_none());
        let d = solve(&label, &obstacle, Movement::XY, &plot()).unwrap();
        assert_eq!(d.dy, 0.0);
        assert!(d.dx < 0.0);
    }

    #[test]
    fn candidates_leaving_bounds_are_dropped() {
        let label = BBox::new(100.0, 2.0, 140.0, 20.0);
        let obstacle = BBox::new(90.0, 15.0, 150.0, 40.0);
        let d = solve(&label, &obstacle, Movement::Y, &plot()).unwrap();
        assert!(d.dy > 0.0, "moving up would leave the plot, expected down");
    }

    #[test]
    fn ties_prefer_up_over_down() {
        let label = BBox::new(100.0, 100.0, 120.0, 120.0);
        let obstacle = BBox::new(100.0, 100.0, 120.0, 120.0);
        let d = solve(&label, &obstacle, Movement::XY, &plot()).unwrap();
        assert!(d.dy < 0.0 && d.dx == 0.0);
    }

    #[test]
    fn tiny_plot_has_no_solution() {
        let bounds = BBox::new(0.0, 0.0, 30.0, 30.0);
        let label = BBox::new(5.0, 5.0, 25.0, 25.0);
        let obstacle = BBox::new(0.0, 0.0, 30.0, 30.0);
        assert!(solve(&label, &obstacle, Movement::XY, &bounds).is_none());
        assert!(solve_diagonal(&label, &obstacle, Movement::XY, &bounds, |_| true).is_none());
    }

    #[test]
    fn accept_filter_skips_rejected_candidates() {
        let label = BBox::new(100.0, 100.0, 140.0, 120.0);
        let obstacle = BBox::new(90.0, 115.0, 150.0, 200.0);
        let d = solve_with(&label, &obstacle, Movement::XY, &plot(), |moved| moved.y0 >= 100.0).unwrap();
        assert!(d.dy == 0.0 || d.dy > 0.0);
    }

    #[test]
    fn diagonal_combines_both_axes() {
        let label = BBox::new(100.0, 100.0, 120.0, 120.0);
        let obstacle = BBox::new(110.0, 110.0, 200.0, 200.0);
        let d = solve_diagonal(&label, &obstacle, Movement::XY, &plot(), |_| true).unwrap();
        assert!(d.dx < 0.0 && d.dy < 0.0);
        assert!(solve_diagonal(&label, &obstacle, Movement::Y, &plot(), |_| true).is_none());
    }

    #[test]
    fn movement_parses_from_config_strings() {
        assert_eq!("xy".parse::<Movement>().unwrap(), Movement::XY);
        assert_eq!(" Y ".parse::<Movement>().unwrap(), Movement::Y);
        assert!("z".parse::<Movement>().is_err());
    }
}
