//! The hexagonal grid that holds all bubbles.
//!
//! Uses a flat array of cells, `width * real_height` long, fixed at
//! construction. Cells never move or disappear; only the bubble they hold
//! changes, and only through the grid's own operations. Every change is
//! queued and flushed as a [`GridUpdate`] into an outbox the host drains.

use bevy::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

use super::{
    bubble::Bubble,
    hex::{GridPos, RelativityMode},
};

pub(super) fn plugin(app: &mut App) {
    app.add_message::<GridUpdated>();
    app.add_message::<BubbleAttached>();
}

/// Produces fresh bubbles for new rows.
pub type BubbleGenerator = Box<dyn FnMut() -> Bubble + Send + Sync>;

/// Message sent for every flushed batch of changed cells.
#[derive(Message, Debug, Clone)]
pub struct GridUpdated(pub GridUpdate);

/// Message sent when a bubble attaches to the grid.
#[derive(Message, Debug, Clone)]
pub struct BubbleAttached(pub AttachReport);

/// A single slot of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    position: GridPos,
    pub(super) bubble: Option<Bubble>,
}

impl HexCell {
    fn new(position: GridPos) -> Self {
        Self {
            position,
            bubble: None,
        }
    }

    pub fn position(&self) -> GridPos {
        self.position
    }

    pub fn bubble(&self) -> Option<&Bubble> {
        self.bubble.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.bubble.is_some()
    }
}

/// A batch of cells that changed since the previous flush.
#[derive(Debug, Clone, PartialEq)]
pub struct GridUpdate {
    /// Snapshots of the changed cells, each listed once.
    pub cells: Vec<HexCell>,
    /// The relativity mode at flush time (it flips when rows are added).
    pub mode: RelativityMode,
    /// Whether the consumer should apply the change without animating it.
    pub instant: bool,
}

/// A bubble that was removed from the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PoppedBubble {
    pub position: GridPos,
    pub bubble: Bubble,
}

/// What happened when a bubble attached to the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachReport {
    /// The attached bubble.
    pub bubble: Bubble,
    /// Where it attached.
    pub position: GridPos,
    /// Whether attaching it started a pop.
    pub did_pop: bool,
    /// The matching group around the attached cell, without the cell
    /// itself, plus any floating bubbles that fell. Filled on a miss too.
    pub affected: Vec<GridPos>,
    /// The removed bubbles, in the order they popped.
    pub popped: Vec<PoppedBubble>,
}

/// Rejected grid mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(GridPos),
    #[error("cell {0} already holds a bubble")]
    Occupied(GridPos),
}

/// The grid holding all bubbles.
pub struct HexGrid {
    pub(super) cells: Vec<HexCell>,
    width: usize,
    real_height: usize,
    pub(super) mode: RelativityMode,
    generator: BubbleGenerator,
    /// Cells changed since the last flush, possibly repeated.
    update_queue: Vec<GridPos>,
    /// Flushed updates waiting to be taken by the host.
    updates: Vec<GridUpdate>,
}

impl std::fmt::Debug for HexGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HexGrid")
            .field("width", &self.width)
            .field("real_height", &self.real_height)
            .field("height", &self.height())
            .field("mode", &self.mode)
            .field("occupied", &self.len())
            .finish_non_exhaustive()
    }
}

impl HexGrid {
    /// Create an empty grid.
    ///
    /// `generator` is called for every cell of a populated row.
    pub fn new(
        width: usize,
        real_height: usize,
        mode: RelativityMode,
        generator: impl FnMut() -> Bubble + Send + Sync + 'static,
    ) -> Self {
        let cells = (0..real_height)
            .flat_map(|y| (0..width).map(move |x| HexCell::new(GridPos::new(x as i32, y as i32))))
            .collect();

        Self {
            cells,
            width,
            real_height,
            mode,
            generator: Box::new(generator),
            update_queue: Vec::new(),
            updates: Vec::new(),
        }
    }

    /// Number of cells per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of rows, including empty ones.
    pub fn real_height(&self) -> usize {
        self.real_height
    }

    /// Number of rows down to the lowest occupied one.
    pub fn height(&self) -> usize {
        self.occupied()
            .map(|cell| cell.position.y as usize + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn mode(&self) -> RelativityMode {
        self.mode
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.index(pos).is_some()
    }

    pub(super) fn index(&self, pos: GridPos) -> Option<usize> {
        let in_bounds = pos.x >= 0
            && pos.y >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.real_height;
        in_bounds.then(|| pos.y as usize * self.width + pos.x as usize)
    }

    /// Get the cell at a position, if it is inside the grid.
    pub fn cell(&self, pos: GridPos) -> Option<&HexCell> {
        self.index(pos).map(|i| &self.cells[i])
    }

    /// Get the bubble at a position, if any.
    pub fn bubble(&self, pos: GridPos) -> Option<&Bubble> {
        self.cell(pos).and_then(HexCell::bubble)
    }

    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.bubble(pos).is_some()
    }

    /// Iterate over all cells, row by row.
    pub fn cells(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.iter()
    }

    /// Iterate over all cells holding a bubble.
    pub fn occupied(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.iter().filter(|cell| cell.is_occupied())
    }

    /// Get the number of bubbles in the grid.
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied().next().is_none()
    }

    /// In-bounds neighbor positions of `pos` under the current mode.
    pub fn adjacent_positions(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        self.mode
            .neighbors(pos)
            .into_iter()
            .filter(|n| self.contains(*n))
    }

    /// The in-bounds neighbor cells of `pos`, occupied or not.
    pub fn adjacent_cells(&self, pos: GridPos) -> Vec<&HexCell> {
        self.adjacent_positions(pos)
            .filter_map(|n| self.cell(n))
            .collect()
    }

    /// Whether any neighbor of `pos` holds a bubble.
    ///
    /// Used by shot tracing to find where a moving bubble can dock.
    pub fn touch(&self, pos: GridPos) -> bool {
        self.adjacent_positions(pos).any(|n| self.is_occupied(n))
    }

    /// Attach a bubble to an empty cell and pop whatever it completes.
    ///
    /// The bubble pops when at least two connected neighbors match it and
    /// the neighbors together satisfy its connect rule. Popping removes the
    /// whole matching group and then any bubbles left hanging.
    pub fn attach(&mut self, bubble: Bubble, pos: GridPos) -> Result<AttachReport, GridError> {
        let index = self.index(pos).ok_or(GridError::OutOfBounds(pos))?;
        if self.cells[index].is_occupied() {
            return Err(GridError::Occupied(pos));
        }
        self.cells[index].bubble = Some(bubble.clone());

        let group = self.adjacent_cells_recursively(
            pos,
            |cell| cell.bubble().is_some_and(|other| bubble.is_match(other)),
            false,
        );
        let should_pop = group.len() >= 2
            && bubble.is_connect_match(group.iter().filter_map(|p| self.bubble(*p)));

        debug!(
            "Attached {:?} at {} (group {}, pop {})",
            bubble.color(),
            pos,
            group.len(),
            should_pop
        );

        let (affected, popped) = if should_pop {
            let popped = self.pop(pos);
            let affected = popped
                .iter()
                .map(|p| p.position)
                .filter(|p| *p != pos)
                .collect();
            (affected, popped)
        } else {
            self.enqueue(pos);
            (group, Vec::new())
        };

        let report = AttachReport {
            bubble,
            position: pos,
            did_pop: should_pop,
            affected,
            popped,
        };

        self.notify_update(false);

        Ok(report)
    }

    /// Push every row down by one and fill the top row with new bubbles.
    ///
    /// Returns false, leaving the grid untouched, when the stack would reach
    /// the last row. Row-based grids flip their parity since the top row is
    /// now a different row.
    pub fn add_row(&mut self) -> bool {
        let height = self.height();
        if height + 1 >= self.real_height {
            debug!("Refusing to add a row: height {} of {}", height, self.real_height);
            return false;
        }

        for y in (0..height).rev() {
            for x in 0..self.width {
                let from = y * self.width + x;
                let to = (y + 1) * self.width + x;
                let bubble = self.cells[from].bubble.take();
                self.cells[to].bubble = bubble;
                self.enqueue(self.cells[to].position);
            }
        }

        if self.mode.is_row_based() {
            self.mode = self.mode.opposite();
        }

        self.populate(1);
        self.notify_update(true);

        info!("Added a row, grid height is now {}", self.height());
        true
    }

    /// Fill a row with freshly generated bubbles.
    ///
    /// `row` is 1-based: `populate(1)` fills the top row.
    pub fn populate(&mut self, row: usize) {
        if row == 0 || row > self.real_height {
            warn!("Cannot populate row {} of a grid with {} rows", row, self.real_height);
            return;
        }

        let y = row - 1;
        for x in 0..self.width {
            let bubble = (self.generator)();
            let index = y * self.width + x;
            self.cells[index].bubble = Some(bubble);
            self.enqueue(self.cells[index].position);
        }
    }

    /// Remove every bubble and send a full redraw.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.bubble = None;
        }
        self.force_notify_update();
    }

    pub(super) fn enqueue(&mut self, pos: GridPos) {
        self.update_queue.push(pos);
    }

    /// Flush the queued changes as one update.
    ///
    /// Nothing is sent when nothing changed.
    pub fn notify_update(&mut self, instant: bool) {
        if self.update_queue.is_empty() {
            return;
        }

        let mut seen = HashSet::new();
        let queue = std::mem::take(&mut self.update_queue);
        let cells = queue
            .into_iter()
            .filter(|pos| seen.insert(*pos))
            .filter_map(|pos| self.cell(pos).cloned())
            .collect();

        self.updates.push(GridUpdate {
            cells,
            mode: self.mode,
            instant,
        });
    }

    /// Queue the whole grid and flush it instantly.
    pub fn force_notify_update(&mut self) {
        self.update_queue.clear();
        self.update_queue
            .extend(self.cells.iter().map(|cell| cell.position));
        self.notify_update(true);
    }

    /// Take all flushed updates, oldest first.
    pub fn take_updates(&mut self) -> Vec<GridUpdate> {
        std::mem::take(&mut self.updates)
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::game::bubble::BubbleColor::{self, *};

    /// A generator cycling through the given colors.
    pub(crate) fn cycling(colors: Vec<BubbleColor>) -> impl FnMut() -> Bubble + Send + Sync {
        let mut i = 0;
        move || {
            let bubble = Bubble::colored(colors[i % colors.len()]);
            i += 1;
            bubble
        }
    }

    pub(crate) fn empty_grid(width: usize, height: usize, mode: RelativityMode) -> HexGrid {
        HexGrid::new(width, height, mode, cycling(vec![Red]))
    }

    /// Build a grid from rows of optional colors, top row first.
    pub(crate) fn grid_from(rows: &[&[Option<BubbleColor>]], real_height: usize) -> HexGrid {
        let width = rows.first().map_or(0, |r| r.len());
        let mut grid = empty_grid(width, real_height, RelativityMode::OddR);
        for (y, row) in rows.iter().enumerate() {
            for (x, color) in row.iter().enumerate() {
                if let Some(color) = color {
                    let i = grid.index(GridPos::new(x as i32, y as i32)).unwrap();
                    grid.cells[i].bubble = Some(Bubble::colored(*color));
                }
            }
        }
        grid
    }

    #[test]
    fn test_out_of_bounds_lookup_is_absent() {
        let grid = empty_grid(3, 4, RelativityMode::OddR);
        assert!(grid.cell(GridPos::new(-1, 0)).is_none());
        assert!(grid.cell(GridPos::new(3, 0)).is_none());
        assert!(grid.cell(GridPos::new(0, 4)).is_none());
        assert_eq!(grid.cell(GridPos::new(2, 3)).unwrap().position(), GridPos::new(2, 3));
    }

    #[test]
    fn test_adjacency_is_symmetric_in_bounds() {
        for mode in RelativityMode::ALL {
            let grid = empty_grid(5, 6, mode);
            for cell in grid.cells() {
                let p = cell.position();
                for q in grid.adjacent_positions(p) {
                    assert!(
                        grid.adjacent_positions(q).any(|n| n == p),
                        "{mode}: {q} does not see {p}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_corner_neighbors_are_clipped() {
        let grid = empty_grid(4, 4, RelativityMode::OddR);
        // Row 0 is even: diagonals go left, both out of bounds at x = 0.
        let mut n: Vec<_> = grid.adjacent_positions(GridPos::ORIGIN).collect();
        n.sort();
        assert_eq!(n, vec![GridPos::new(0, 1), GridPos::new(1, 0)]);
        assert_eq!(grid.adjacent_cells(GridPos::ORIGIN).len(), 2);
    }

    #[test]
    fn test_height_tracks_lowest_occupied_row() {
        let grid = grid_from(&[&[Some(Red), None], &[None, None], &[None, Some(Blue)]], 6);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.real_height(), 6);
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_touch() {
        let grid = grid_from(&[&[Some(Red), None, None], &[None, None, None]], 4);
        assert!(grid.touch(GridPos::new(1, 0)));
        assert!(grid.touch(GridPos::new(0, 1)));
        assert!(!grid.touch(GridPos::new(2, 1)));
    }

    #[test]
    fn test_attach_rejects_bad_positions() {
        let mut grid = grid_from(&[&[Some(Red)]], 2);
        assert_eq!(
            grid.attach(Bubble::colored(Red), GridPos::new(5, 0)),
            Err(GridError::OutOfBounds(GridPos::new(5, 0)))
        );
        assert_eq!(
            grid.attach(Bubble::colored(Red), GridPos::ORIGIN),
            Err(GridError::Occupied(GridPos::ORIGIN))
        );
    }

    #[test]
    fn test_attach_without_pop_queues_one_cell() {
        let mut grid = grid_from(&[&[Some(Red), Some(Blue)], &[None, None]], 4);
        let report = grid.attach(Bubble::colored(Red), GridPos::new(0, 1)).unwrap();

        assert!(!report.did_pop);
        assert_eq!(report.affected, vec![GridPos::ORIGIN]);
        assert!(report.popped.is_empty());
        assert_eq!(grid.bubble(GridPos::new(0, 1)), Some(&Bubble::colored(Red)));

        let updates = grid.take_updates();
        assert_eq!(updates.len(), 1);
        assert!(!updates[0].instant);
        assert_eq!(updates[0].cells.len(), 1);
        assert_eq!(updates[0].cells[0].position(), GridPos::new(0, 1));
    }

    #[test]
    fn test_simple_pop_on_one_wide_grid() {
        let mut grid = HexGrid::new(1, 4, RelativityMode::OddQ, cycling(vec![Red]));
        grid.populate(1);
        grid.populate(2);
        grid.take_updates();

        let report = grid.attach(Bubble::colored(Red), GridPos::new(0, 2)).unwrap();

        assert!(report.did_pop);
        assert_eq!(report.popped.len(), 3);
        assert!(grid.is_empty());
        assert_eq!(grid.height(), 0);
    }

    #[test]
    fn test_affected_leaves_out_attached_cell() {
        let mut grid = HexGrid::new(1, 4, RelativityMode::OddQ, cycling(vec![Red]));
        grid.populate(1);
        grid.populate(2);

        let report = grid.attach(Bubble::colored(Red), GridPos::new(0, 2)).unwrap();

        let mut affected = report.affected.clone();
        affected.sort();
        assert_eq!(affected, vec![GridPos::new(0, 0), GridPos::new(0, 1)]);
        assert!(report.popped.iter().any(|p| p.position == GridPos::new(0, 2)));
    }

    #[test]
    fn test_miss_reports_its_matching_group() {
        let mut grid = grid_from(&[&[Some(Blue), Some(Red), Some(Blue)], &[None, None, None]], 4);

        // Odd-r row 1 reaches up-right: (1, 1) touches (1, 0) and (2, 0).
        let report = grid.attach(Bubble::colored(Red), GridPos::new(1, 1)).unwrap();

        assert!(!report.did_pop);
        assert_eq!(report.affected, vec![GridPos::new(1, 0)]);
        assert!(report.popped.is_empty());
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_pair_alone_does_not_pop() {
        let mut grid = grid_from(&[&[Some(Red)], &[None]], 3);
        let report = grid.attach(Bubble::colored(Red), GridPos::new(0, 1)).unwrap();
        assert!(!report.did_pop);
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_numbered_pop_needs_exact_sum() {
        let numbered = |grid: &mut HexGrid, pos: GridPos, n: i32| {
            let i = grid.index(pos).unwrap();
            grid.cells[i].bubble = Some(Bubble::numbered(Green, n));
        };

        let mut grid = empty_grid(1, 4, RelativityMode::OddQ);
        numbered(&mut grid, GridPos::new(0, 0), 2);
        numbered(&mut grid, GridPos::new(0, 1), 3);
        let miss = grid.attach(Bubble::numbered(Green, 4), GridPos::new(0, 2)).unwrap();
        assert!(!miss.did_pop);
        assert_eq!(grid.len(), 3);

        let mut grid = empty_grid(1, 4, RelativityMode::OddQ);
        numbered(&mut grid, GridPos::new(0, 0), 2);
        numbered(&mut grid, GridPos::new(0, 1), 3);
        let hit = grid.attach(Bubble::numbered(Green, 5), GridPos::new(0, 2)).unwrap();
        assert!(hit.did_pop);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_add_row_shifts_and_flips_parity() {
        let mut grid = HexGrid::new(2, 5, RelativityMode::OddR, cycling(vec![Blue]));
        let i = grid.index(GridPos::ORIGIN).unwrap();
        grid.cells[i].bubble = Some(Bubble::colored(Red));

        assert!(grid.add_row());

        assert_eq!(grid.mode(), RelativityMode::EvenR);
        assert_eq!(grid.bubble(GridPos::new(0, 1)), Some(&Bubble::colored(Red)));
        assert_eq!(grid.bubble(GridPos::new(1, 1)), None);
        assert_eq!(grid.bubble(GridPos::new(0, 0)), Some(&Bubble::colored(Blue)));
        assert_eq!(grid.bubble(GridPos::new(1, 0)), Some(&Bubble::colored(Blue)));
        assert_eq!(grid.height(), 2);

        let updates = grid.take_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].instant);
        assert_eq!(updates[0].mode, RelativityMode::EvenR);
    }

    #[test]
    fn test_add_row_keeps_column_mode() {
        let mut grid = HexGrid::new(2, 5, RelativityMode::EvenQ, cycling(vec![Blue]));
        assert!(grid.add_row());
        assert_eq!(grid.mode(), RelativityMode::EvenQ);
    }

    #[test]
    fn test_add_row_refused_at_ceiling() {
        let mut grid = HexGrid::new(2, 4, RelativityMode::OddR, cycling(vec![Blue, Red]));
        grid.populate(1);
        grid.populate(2);
        grid.populate(3);
        grid.take_updates();
        assert_eq!(grid.height(), grid.real_height() - 1);

        let before: Vec<HexCell> = grid.cells().cloned().collect();
        assert!(!grid.add_row());

        let after: Vec<HexCell> = grid.cells().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(grid.mode(), RelativityMode::OddR);
        assert!(grid.take_updates().is_empty());
    }

    #[test]
    fn test_populate_ignores_invalid_rows() {
        let mut grid = empty_grid(3, 2, RelativityMode::OddR);
        grid.populate(0);
        grid.populate(3);
        assert!(grid.is_empty());
        grid.populate(2);
        assert_eq!(grid.len(), 3);
        assert!(grid.occupied().all(|cell| cell.position().y == 1));
    }

    #[test]
    fn test_notify_update_sends_distinct_cells() {
        let mut grid = empty_grid(2, 2, RelativityMode::OddR);
        grid.enqueue(GridPos::ORIGIN);
        grid.enqueue(GridPos::new(1, 0));
        grid.enqueue(GridPos::ORIGIN);
        grid.notify_update(false);

        let updates = grid.take_updates();
        assert_eq!(updates.len(), 1);
        let positions: Vec<_> = updates[0].cells.iter().map(HexCell::position).collect();
        assert_eq!(positions, vec![GridPos::ORIGIN, GridPos::new(1, 0)]);

        grid.notify_update(true);
        assert!(grid.take_updates().is_empty());
    }

    #[test]
    fn test_clear_forces_full_update() {
        let mut grid = HexGrid::new(3, 3, RelativityMode::OddR, cycling(vec![Red]));
        grid.populate(1);
        grid.clear();

        assert!(grid.is_empty());
        let updates = grid.take_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].instant);
        assert_eq!(updates[0].cells.len(), 9);
    }

    #[test]
    fn test_height_never_exceeds_real_height() {
        let mut grid = HexGrid::new(3, 5, RelativityMode::EvenR, cycling(vec![Red, Blue, Green]));
        grid.populate(1);
        for step in 0..20 {
            if step % 3 == 0 {
                grid.add_row();
            }
            let free = grid
                .cells()
                .filter(|cell| !cell.is_occupied() && grid.touch(cell.position()))
                .map(HexCell::position)
                .next();
            if let Some(pos) = free {
                let color = BubbleColor::ALL[step % 3];
                grid.attach(Bubble::colored(color), pos).unwrap();
            }
            if step == 12 {
                grid.clear();
                grid.populate(1);
            }
            assert!(grid.height() <= grid.real_height());
        }
    }
}
