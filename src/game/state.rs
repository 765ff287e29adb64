//! Game session management - turn flow, win/lose conditions.
//!
//! Win: Clear all bubbles from the grid.
//! Lose: A miss lands in the last row, or a new row no longer fits.

use bevy::{prelude::*, time::Stopwatch};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::{
    bubble::Bubble,
    cluster::BubblePopped,
    config::{ConfigError, GameConfig},
    grid::{AttachReport, BubbleAttached, GridError, GridUpdate, GridUpdated, HexGrid},
    hex::GridPos,
    pool::BubblePool,
    turret::Turret,
};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<SessionState>();

    app.add_message::<SessionCommand>();
    app.add_message::<BubbleFired>();
    app.add_message::<SessionFinished>();

    app.add_systems(
        Update,
        (
            apply_session_commands,
            tick_session_clock,
            publish_session_output,
        )
            .chain()
            .in_set(SessionSystems),
    );
}

/// System set for the session systems.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionSystems;

/// Points awarded per popped bubble.
const POINTS_PER_BUBBLE: u32 = 10;

/// Extra points per bubble for every pair beyond the first.
const COMBO_BONUS: u32 = 5;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Paused,
    Finished,
}

/// The outcome of a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Seconds played, pauses excluded.
    pub time_taken: f32,
    pub shots_fired: u32,
    /// Shots that popped nothing.
    pub missed_pops: u32,
    pub has_won: bool,
    pub score: u32,
}

/// Things that happened to the session, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    Paused,
    Continued,
    RowAdded,
    Reloaded(Option<Bubble>),
    Finished(SessionResult),
}

/// What a landed shot did.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotReport {
    pub attach: AttachReport,
    /// Whether a new row was pushed in after the shot.
    pub row_added: bool,
    /// Set when the shot ended the game.
    pub finished: Option<SessionResult>,
}

/// Rejected session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no game in progress")]
    NotActive,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Message asking the session to do something.
#[derive(Message, Debug, Clone)]
pub enum SessionCommand {
    Start,
    Restart,
    Pause,
    Resume,
    Stop,
    /// Fire the loaded bubble; answered with [`BubbleFired`].
    Shoot,
    /// A fired bubble docked at `position`.
    LandShot { bubble: Bubble, position: GridPos },
}

/// Message sent when the turret fires; the bubble is now in flight.
#[derive(Message, Debug, Clone)]
pub struct BubbleFired(pub Bubble);

/// Message sent when a game ends.
#[derive(Message, Debug, Clone)]
pub struct SessionFinished(pub SessionResult);

/// One game of bubble shooter: the grid, its ammunition pool and the turret.
#[derive(Resource, Debug)]
pub struct GameSession {
    config: GameConfig,
    state: SessionState,
    grid: HexGrid,
    pool: BubblePool,
    turret: Turret,
    score: u32,
    clock: Stopwatch,
    rng: StdRng,
    events: Vec<SessionEvent>,
}

impl GameSession {
    /// Create an idle session. Nothing is on the grid until [`start`](Self::start).
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, StdRng::from_os_rng()))
    }

    /// Like [`new`](Self::new), but every random choice follows `seed`.
    pub fn with_rng_seed(config: GameConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, StdRng::seed_from_u64(seed)))
    }

    fn build(config: GameConfig, mut rng: StdRng) -> Self {
        let grid = Self::build_grid(&config, &mut rng);
        let pool = BubblePool::new(config.pool_kind(), config.chance_to_pop_threshold);
        let mut clock = Stopwatch::new();
        clock.pause();

        Self {
            config,
            state: SessionState::Idle,
            grid,
            pool,
            turret: Turret::new(),
            score: 0,
            clock,
            rng,
            events: Vec::new(),
        }
    }

    fn build_grid(config: &GameConfig, rng: &mut StdRng) -> HexGrid {
        let generator = config.bubble_generator(StdRng::seed_from_u64(rng.random()));
        HexGrid::new(
            config.grid_width,
            config.grid_height_threshold,
            config.relativity_mode,
            generator,
        )
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn pool(&self) -> &BubblePool {
        &self.pool
    }

    pub fn turret(&self) -> &Turret {
        &self.turret
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Seconds played, pauses excluded.
    pub fn time_elapsed(&self) -> f32 {
        self.clock.elapsed_secs()
    }

    /// Whether a game is running, paused or not.
    pub fn is_game_active(&self) -> bool {
        matches!(self.state, SessionState::Active | SessionState::Paused)
    }

    /// Take the session events recorded so far.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take the grid updates flushed so far.
    pub fn take_grid_updates(&mut self) -> Vec<GridUpdate> {
        self.grid.take_updates()
    }

    /// Start a new game. Ignored while a game is running.
    pub fn start(&mut self) {
        if self.is_game_active() {
            debug!("Ignoring start: a game is already running");
            return;
        }
        self.initialize();
    }

    /// Throw the current game away and start over.
    pub fn restart(&mut self) {
        self.initialize();
    }

    fn initialize(&mut self) {
        self.grid = Self::build_grid(&self.config, &mut self.rng);
        self.pool = BubblePool::new(self.config.pool_kind(), self.config.chance_to_pop_threshold);
        self.turret = Turret::new();
        self.score = 0;
        self.clock.reset();
        self.clock.unpause();

        for row in 1..=self.config.initial_grid_height {
            self.grid.populate(row);
        }
        self.grid.force_notify_update();

        self.state = SessionState::Active;
        self.events.push(SessionEvent::Started);
        info!(
            "Game started: {}x{} grid, {} rows filled",
            self.config.grid_width,
            self.config.grid_height_threshold,
            self.config.initial_grid_height
        );

        self.reload();
    }

    /// Freeze the game. Only an active game can be paused.
    pub fn pause(&mut self) {
        if self.state != SessionState::Active {
            debug!("Ignoring pause in state {:?}", self.state);
            return;
        }
        self.state = SessionState::Paused;
        self.clock.pause();
        self.turret.can_shoot = false;
        self.events.push(SessionEvent::Paused);
    }

    /// Continue a paused game.
    pub fn resume(&mut self) {
        if self.state != SessionState::Paused {
            debug!("Ignoring resume in state {:?}", self.state);
            return;
        }
        self.state = SessionState::Active;
        self.clock.unpause();
        self.turret.can_shoot = true;
        self.events.push(SessionEvent::Continued);
    }

    /// Abandon the game without a result and empty the grid.
    pub fn stop(&mut self) {
        self.state = SessionState::Idle;
        self.clock.pause();
        self.turret.can_shoot = false;
        self.turret.reload(None);
        self.grid.clear();
    }

    /// Advance the session clock.
    pub fn tick(&mut self, delta: Duration) {
        if self.state == SessionState::Active {
            self.clock.tick(delta);
        }
    }

    /// Fire the loaded bubble, if the game allows it.
    pub fn shoot(&mut self) -> Option<Bubble> {
        if self.state != SessionState::Active {
            return None;
        }
        self.turret.shoot()
    }

    /// Resolve a shot that docked at `position`.
    ///
    /// Attaches the bubble, then applies the game rules in order: a miss
    /// in the last row loses, an empty grid wins, and every few shots or
    /// misses a new row is pushed in (losing if it no longer fits). The
    /// turret is reloaded from the recomputed pool unless the game ended.
    pub fn land_shot(
        &mut self,
        bubble: Bubble,
        position: GridPos,
    ) -> Result<ShotReport, SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive);
        }

        let attach = self.grid.attach(bubble, position)?;
        let mut report = ShotReport {
            attach,
            row_added: false,
            finished: None,
        };

        if report.attach.did_pop {
            let cleared = report.attach.affected.len() as u32;
            self.score += score_for(cleared);
        } else {
            self.turret.record_miss();

            if position.y as usize + 1 == self.grid.real_height() {
                info!("Missed shot landed in the last row at {}", position);
                report.finished = self.force_finish();
                return Ok(report);
            }
        }

        if self.grid.is_empty() {
            report.finished = self.force_finish();
            return Ok(report);
        }

        if self.row_due() {
            if !self.grid.add_row() {
                info!("No room for a new row");
                report.finished = self.force_finish();
                return Ok(report);
            }
            self.turret.missed_shots = 0;
            report.row_added = true;
            self.events.push(SessionEvent::RowAdded);
        }

        self.reload();
        Ok(report)
    }

    /// Whether the shot and miss counters call for a new row.
    fn row_due(&self) -> bool {
        let missed = self.turret.missed_shots();
        let shots = self.turret.shots();
        (missed > 0 && missed % self.config.missed_shots_till_new_row == 0)
            || (shots > 0 && shots % self.config.shots_till_new_row == 0)
    }

    fn reload(&mut self) {
        self.pool.recompute(&self.grid);
        let next = self.pool.pick_bubble_with(&mut self.rng);
        self.turret.reload(next.clone());
        self.turret.can_shoot = true;
        self.events.push(SessionEvent::Reloaded(next));
    }

    /// End the running game now. The game counts as won when the grid is
    /// empty.
    pub fn force_finish(&mut self) -> Option<SessionResult> {
        if !self.is_game_active() {
            return None;
        }

        self.state = SessionState::Finished;
        self.clock.pause();
        self.turret.can_shoot = false;

        let result = SessionResult {
            time_taken: self.time_elapsed(),
            shots_fired: self.turret.shots(),
            missed_pops: self.turret.total_missed_shots(),
            has_won: self.grid.height() == 0,
            score: self.score,
        };

        if result.has_won {
            info!("WIN! All bubbles cleared! Final score: {}", result.score);
        } else {
            info!("GAME OVER! Final score: {}", result.score);
        }

        self.events.push(SessionEvent::Finished(result));
        Some(result)
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::build(GameConfig::default(), StdRng::from_os_rng())
    }
}

/// Points for popping `count` bubbles at once.
fn score_for(count: u32) -> u32 {
    let bonus = (count / 2).saturating_sub(1);
    count * (POINTS_PER_BUBBLE + bonus * COMBO_BONUS)
}

/// Run the commands sent to the session this frame.
fn apply_session_commands(
    mut session: ResMut<GameSession>,
    mut requests: MessageReader<SessionCommand>,
    mut fired_events: MessageWriter<BubbleFired>,
    mut attached_events: MessageWriter<BubbleAttached>,
    mut popped_events: MessageWriter<BubblePopped>,
) {
    for request in requests.read() {
        match request {
            SessionCommand::Start => session.start(),
            SessionCommand::Restart => session.restart(),
            SessionCommand::Pause => session.pause(),
            SessionCommand::Resume => session.resume(),
            SessionCommand::Stop => session.stop(),
            SessionCommand::Shoot => {
                if let Some(bubble) = session.shoot() {
                    fired_events.write(BubbleFired(bubble));
                }
            }
            SessionCommand::LandShot { bubble, position } => {
                match session.land_shot(bubble.clone(), *position) {
                    Ok(report) => {
                        for popped in &report.attach.popped {
                            popped_events.write(BubblePopped(popped.clone()));
                        }
                        attached_events.write(BubbleAttached(report.attach));
                    }
                    Err(e) => warn!("Shot at {} rejected: {}", position, e),
                }
            }
        }
    }
}

/// Keep the session clock in step with game time.
fn tick_session_clock(time: Res<Time>, mut session: ResMut<GameSession>) {
    session.tick(time.delta());
}

/// Forward grid updates and game results as messages.
fn publish_session_output(
    mut session: ResMut<GameSession>,
    mut update_events: MessageWriter<GridUpdated>,
    mut finished_events: MessageWriter<SessionFinished>,
) {
    for update in session.take_grid_updates() {
        update_events.write(GridUpdated(update));
    }

    for event in session.take_events() {
        match event {
            SessionEvent::Finished(result) => {
                finished_events.write(SessionFinished(result));
            }
            other => debug!("Session event: {:?}", other),
        }
    }
}
