//! Collision-avoiding placement of a movable element inside a container.
//!
//! Positions are reported relative to the container's origin; collision checks
//! run in absolute (document) coordinates, which is what `getBoundingClientRect`
//! hands out for the obstacles.
//!
//! The search is randomized but always terminates: a strict phase at the
//! requested clearance, a relaxed phase at a reduced clearance, then a fixed
//! position towards the upper right of the container.

use rand::Rng;

use crate::config::PlacementConfig;

/// Axis-aligned rectangle in absolute coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    /// Parse `[left, top, right, bottom, ...]` quads. `None` unless the slice
    /// length is a multiple of four.
    pub fn from_flat(values: &[f64]) -> Option<Vec<Rect>> {
        if values.len() % 4 != 0 {
            return None;
        }
        Some(
            values
                .chunks_exact(4)
                .map(|q| Rect::new(q[0], q[1], q[2], q[3]))
                .collect(),
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Offset from the container's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Absolute rectangle covered by an element of `size` placed here.
    pub fn to_absolute(self, container: &Rect, size: Size) -> Rect {
        Rect::from_origin_size(
            container.left + self.x,
            container.top + self.y,
            size.width,
            size.height,
        )
    }
}

/// Which stage of the search produced a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Strict,
    Relaxed,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: Position,
    pub phase: Phase,
}

/// Two rectangles overlap unless a gap strictly wider than `margin` separates
/// them on at least one side.
pub fn rects_overlap(a: &Rect, b: &Rect, margin: f64) -> bool {
    !(a.right + margin < b.left
        || a.left - margin > b.right
        || a.bottom + margin < b.top
        || a.top - margin > b.bottom)
}

/// Centre of the container; where the element sits before it first moves.
pub fn initial_centered_position(container: &Rect, size: Size) -> Position {
    Position::new(
        (container.width() - size.width) / 2.0,
        (container.height() - size.height) / 2.0,
    )
}

#[derive(Clone, Debug, Default)]
pub struct PlacementSolver {
    config: PlacementConfig,
}

impl PlacementSolver {
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn solve<R: Rng + ?Sized>(
        &self,
        container: &Rect,
        size: Size,
        obstacles: &[Rect],
        clearance: f64,
        rng: &mut R,
    ) -> Placement {
        if let Some(position) = self.search(container, size, obstacles, clearance, rng) {
            return Placement {
                position,
                phase: Phase::Strict,
            };
        }

        let relaxed = self.config.relaxed_clearance(clearance);
        if let Some(position) = self.search(container, size, obstacles, relaxed, rng) {
            return Placement {
                position,
                phase: Phase::Relaxed,
            };
        }

        Placement {
            position: self.fallback(container, size),
            phase: Phase::Fallback,
        }
    }

    /// Up to `max_attempts` uniform samples inside the padded container.
    fn search<R: Rng + ?Sized>(
        &self,
        container: &Rect,
        size: Size,
        obstacles: &[Rect],
        clearance: f64,
        rng: &mut R,
    ) -> Option<Position> {
        let padding = self.config.padding;
        let span_x = (container.width() - size.width - 2.0 * padding).max(0.0);
        let span_y = (container.height() - size.height - 2.0 * padding).max(0.0);

        for _ in 0..self.config.max_attempts {
            let candidate = Position::new(
                padding + rng.r#gen::<f64>() * span_x,
                padding + rng.r#gen::<f64>() * span_y,
            );
            let rect = candidate.to_absolute(container, size);
            if obstacles
                .iter()
                .all(|obstacle| !rects_overlap(&rect, obstacle, clearance))
            {
                return Some(candidate);
            }
        }
        None
    }

    /// Deterministic spot in the upper right, kept inside the container.
    pub fn fallback(&self, container: &Rect, size: Size) -> Position {
        let padding = self.config.padding;
        let max_x = container.width() - size.width - padding;
        let max_y = container.height() - size.height - padding;

        let x = (max_x * self.config.fallback_x_ratio).min(max_x - padding);
        let y = padding.max(max_y * self.config.fallback_y_ratio);

        // min/max rather than clamp: a container smaller than the element
        // makes the range empty.
        Position::new(x.min(max_x).max(padding), y.min(max_y).max(padding))
    }
}
