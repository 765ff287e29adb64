//! A hex-grid bubble shooter core, hosted as a bevy plugin.
//!
//! The crate owns the rules: where bubbles sit, what pops, what falls,
//! which bubble the turret gets next and when the game ends. Rendering,
//! input and shot physics stay with the host, which talks to the game
//! through [`SessionCommand`] messages or the [`GameSession`] resource.

pub mod game;

use bevy::prelude::*;

pub use game::{
    bubble::{Bubble, BubbleColor},
    cluster::BubblePopped,
    config::{ColorWeight, ConfigError, GameConfig},
    grid::{AttachReport, BubbleAttached, GridError, GridUpdate, GridUpdated, HexCell, HexGrid},
    hex::{GridPos, RelativityMode},
    pool::{BubblePool, PoolKind, PoolSet},
    state::{
        BubbleFired, GameSession, SessionCommand, SessionError, SessionEvent, SessionFinished,
        SessionResult, SessionState, SessionSystems, ShotReport,
    },
    turret::Turret,
};

/// Adds the bubble shooter session and its messages to an app.
#[derive(Debug, Clone, Default)]
pub struct BubbleShooterPlugin {
    pub config: GameConfig,
}

impl Plugin for BubbleShooterPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(game::plugin);

        let session = GameSession::new(self.config.clone()).unwrap_or_else(|e| {
            error!("Invalid game config, using defaults: {}", e);
            GameSession::default()
        });
        app.insert_resource(session);
    }
}
