//! Cluster detection - finding and popping connected bubbles.
//!
//! Every group query is a depth-first flood fill over occupied cells with a
//! caller-supplied filter. Popping removes the matching group around a cell
//! and then sweeps away every group that lost its connection to the top row.

use bevy::prelude::*;
use std::collections::HashSet;

use super::{
    bubble::Bubble,
    grid::{HexCell, HexGrid, PoppedBubble},
    hex::GridPos,
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<BubblePopped>();
}

/// Message sent for each bubble removed from the grid.
#[derive(Message, Debug, Clone)]
pub struct BubblePopped(pub PoppedBubble);

impl HexGrid {
    /// Collect every cell reachable from `start` through occupied cells
    /// accepted by `predicate`.
    ///
    /// No cell is returned twice. `start` itself is only part of the result
    /// when `include_self` is set, and is never tested against `predicate`.
    pub fn adjacent_cells_recursively(
        &self,
        start: GridPos,
        mut predicate: impl FnMut(&HexCell) -> bool,
        include_self: bool,
    ) -> Vec<GridPos> {
        let mut found = Vec::new();
        if !self.contains(start) {
            return found;
        }
        if include_self {
            found.push(start);
        }

        let mut visited = HashSet::from([start]);
        let mut stack = vec![start];

        while let Some(pos) = stack.pop() {
            for neighbor in self.adjacent_positions(pos) {
                if !visited.insert(neighbor) {
                    continue;
                }

                let Some(cell) = self.cell(neighbor) else {
                    continue;
                };
                if !cell.is_occupied() || !predicate(cell) {
                    continue;
                }

                found.push(neighbor);
                stack.push(neighbor);
            }
        }

        found
    }

    /// Pop the bubble at `pos`, its matching group, and anything left
    /// floating afterwards.
    ///
    /// Returns the removed bubbles in the order they popped. Popping an
    /// empty cell does nothing.
    pub fn pop(&mut self, pos: GridPos) -> Vec<PoppedBubble> {
        let mut popped = Vec::new();
        if !self.is_occupied(pos) {
            return popped;
        }

        self.pop_group(pos, &mut popped);
        let group_size = popped.len();

        self.pop_floating(&mut popped);

        info!(
            "Popped a group of {} at {}, {} floating",
            group_size,
            pos,
            popped.len() - group_size
        );

        popped
    }

    /// Pop `start` and every bubble connected to it through matching
    /// neighbors. Each popped bubble decides which of its neighbors follow.
    fn pop_group(&mut self, start: GridPos, popped: &mut Vec<PoppedBubble>) {
        let mut stack = vec![start];

        while let Some(pos) = stack.pop() {
            let Some(bubble) = self.pop_single(pos) else {
                continue;
            };

            stack.extend(
                self.adjacent_positions(pos)
                    .filter(|n| self.bubble(*n).is_some_and(|other| bubble.is_match(other))),
            );

            popped.push(PoppedBubble {
                position: pos,
                bubble,
            });
        }
    }

    /// Pop every group with no path to the top row.
    fn pop_floating(&mut self, popped: &mut Vec<PoppedBubble>) {
        let candidates: Vec<GridPos> = self
            .occupied()
            .map(HexCell::position)
            .filter(|pos| pos.y != 0)
            .collect();

        let mut checked = HashSet::new();
        for pos in candidates {
            if checked.contains(&pos) {
                continue;
            }

            let group = self.adjacent_cells_recursively(pos, |_| true, true);
            checked.extend(group.iter().copied());

            if group.iter().any(|p| p.y == 0) {
                continue;
            }

            for p in group {
                if let Some(bubble) = self.pop_single(p) {
                    popped.push(PoppedBubble {
                        position: p,
                        bubble,
                    });
                }
            }
        }
    }

    /// Remove a single bubble without touching its neighbors.
    fn pop_single(&mut self, pos: GridPos) -> Option<Bubble> {
        let index = self.index(pos)?;
        let bubble = self.cells[index].bubble.take()?;
        self.enqueue(pos);
        Some(bubble)
    }
}
