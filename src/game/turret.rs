//! The turret at the bottom of the screen.
//!
//! The turret always holds at most one loaded bubble. Firing hands that
//! bubble to whoever moves it across the screen; it comes back into the
//! game through [`GameSession::land_shot`](super::state::GameSession::land_shot).

use bevy::prelude::*;

use super::bubble::Bubble;

/// Loaded ammunition and shot bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Turret {
    bubble: Option<Bubble>,
    /// Cleared while a shot is in flight or the game is paused.
    pub can_shoot: bool,
    shots: u32,
    /// Shots without a pop since the last added row.
    pub(super) missed_shots: u32,
    total_missed_shots: u32,
}

impl Turret {
    pub fn new() -> Self {
        Self {
            can_shoot: true,
            ..default()
        }
    }

    /// The currently loaded bubble.
    pub fn bubble(&self) -> Option<&Bubble> {
        self.bubble.as_ref()
    }

    pub fn shots(&self) -> u32 {
        self.shots
    }

    pub fn missed_shots(&self) -> u32 {
        self.missed_shots
    }

    pub fn total_missed_shots(&self) -> u32 {
        self.total_missed_shots
    }

    /// Fire the loaded bubble.
    ///
    /// Counts a shot and blocks further shots until the next reload. Returns
    /// `None`, counting nothing, when the turret cannot shoot or is empty.
    pub fn shoot(&mut self) -> Option<Bubble> {
        if !self.can_shoot {
            return None;
        }
        let bubble = self.bubble.take()?;

        self.shots += 1;
        self.can_shoot = false;
        debug!("Turret fired {:?} (shot {})", bubble.color(), self.shots);
        Some(bubble)
    }

    /// Load the next bubble. `None` leaves the turret empty.
    pub fn reload(&mut self, bubble: Option<Bubble>) {
        self.bubble = bubble;
    }

    pub(super) fn record_miss(&mut self) {
        self.missed_shots += 1;
        self.total_missed_shots += 1;
    }
}
