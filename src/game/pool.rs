//! The ammunition pool - picks the next bubble for the turret.
//!
//! The pool splits the grid into groups of matching bubbles and scores
//! each group by how deep it sits in the stack. Groups close to the bottom
//! score high and are preferred, so the turret tends to get ammunition that
//! clears the bubbles closest to overflowing.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{bubble::Bubble, grid::HexGrid, hex::GridPos};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<PoolKind>();
}

/// How a group turns into ammunition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize,
)]
pub enum PoolKind {
    /// Any member of the group is a valid shot.
    #[default]
    Colored,
    /// The shot carries the sum of the group's numbers.
    Numbered,
}

/// One group of connected matching bubbles.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSet {
    kind: PoolKind,
    /// Never empty.
    bubbles: Vec<Bubble>,
    positions: Vec<GridPos>,
    chance_to_pop: f32,
}

impl PoolSet {
    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn positions(&self) -> &[GridPos] {
        &self.positions
    }

    /// Score in percent; higher means the group sits deeper in the stack.
    pub fn chance_to_pop(&self) -> f32 {
        self.chance_to_pop
    }

    /// Make a new bubble that pops this group when it lands next to it.
    ///
    /// # Panics
    ///
    /// When a numbered pool holds colored bubbles.
    pub fn generate_bubble(&self) -> Bubble {
        let first = &self.bubbles[0];
        match self.kind {
            PoolKind::Colored => first.clone(),
            PoolKind::Numbered => {
                let total = self
                    .bubbles
                    .iter()
                    .map(|bubble| {
                        bubble.number().unwrap_or_else(|| {
                            panic!("numbered pool holds a colored bubble: {bubble:?}")
                        })
                    })
                    .sum();
                Bubble::numbered(first.color(), total)
            }
        }
    }
}

/// Groups of the current grid, rebuilt from scratch after every shot.
#[derive(Debug, Clone)]
pub struct BubblePool {
    kind: PoolKind,
    threshold: f32,
    sets: Vec<PoolSet>,
}

impl BubblePool {
    /// `threshold` is the chance to pop, in percent, a group needs to be
    /// preferred when picking.
    pub fn new(kind: PoolKind, threshold: f32) -> Self {
        Self {
            kind,
            threshold,
            sets: Vec::new(),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn sets(&self) -> &[PoolSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Drop all groups and rebuild them from the grid.
    pub fn recompute(&mut self, grid: &HexGrid) {
        self.sets.clear();

        let height = grid.height() as f32;
        let mut visited = HashSet::new();

        for cell in grid.occupied() {
            let pos = cell.position();
            if visited.contains(&pos) {
                continue;
            }
            let Some(bubble) = cell.bubble() else {
                continue;
            };

            let mut positions = vec![pos];
            positions.extend(grid.adjacent_cells_recursively(
                pos,
                |other| other.bubble().is_some_and(|b| bubble.is_match(b)),
                false,
            ));
            visited.extend(positions.iter().copied());

            let deepest = positions.iter().map(|p| p.y).max().unwrap_or(0);
            let bubbles = positions
                .iter()
                .filter_map(|p| grid.bubble(*p).cloned())
                .collect();

            self.sets.push(PoolSet {
                kind: self.kind,
                bubbles,
                positions,
                chance_to_pop: 100.0 / height * deepest as f32,
            });
        }

        debug!("Pool recomputed: {} groups", self.sets.len());
    }

    /// Pick the next bubble to shoot.
    pub fn pick_bubble(&self) -> Option<Bubble> {
        self.pick_bubble_with(&mut rand::rng())
    }

    /// Pick the next bubble to shoot using the given generator.
    ///
    /// A random group reaching the threshold is preferred; if there is none,
    /// any group will do. Returns `None` when the grid held no bubbles.
    pub fn pick_bubble_with(&self, rng: &mut impl Rng) -> Option<Bubble> {
        if self.sets.is_empty() {
            warn!("Tried to pick a bubble from an empty pool");
            return None;
        }

        let valid: Vec<&PoolSet> = self
            .sets
            .iter()
            .filter(|set| set.chance_to_pop >= self.threshold)
            .collect();

        let set = if valid.is_empty() {
            &self.sets[rng.random_range(0..self.sets.len())]
        } else {
            valid[rng.random_range(0..valid.len())]
        };

        Some(set.generate_bubble())
    }
}
