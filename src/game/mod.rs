//! The core rules of the bubble shooter.
//!
//! This module contains all the gameplay logic including:
//! - Offset hexagonal coordinates in four parity conventions
//! - Colored and numbered bubbles
//! - The bubble grid with its row management and change notifications
//! - Cluster detection and popping
//! - The ammunition pool and the turret
//! - Game session management

pub mod bubble;
pub mod cluster;
pub mod config;
pub mod grid;
pub mod hex;
pub mod pool;
pub mod state;
pub mod turret;

use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins((
        hex::plugin,
        bubble::plugin,
        grid::plugin,
        cluster::plugin,
        pool::plugin,
        state::plugin,
    ));
}
