//! Registry of live matches and the entry point for everything outside the
//! simulation core.
//!
//! This module handles:
//! - Match lifecycle (create, attach, pause, resume, abort, shutdown)
//! - Routing paddle intents to the right match by identifier
//! - Handing out subscriptions to each match's event stream
//! - Deregistering matches once their loop has finished
//!
//! Creation takes the registry's write lock for the whole check-and-insert,
//! so at most one match exists per identifier at any time.

use crate::config::ServerConfig;
use crate::error::{MatchError, MatchResult};
use crate::game::{Controller, MatchSetup, MatchSimulation, MatchStatus};
use crate::match_loop::{MatchCommand, MatchLoop};
use crate::paddle::validate_intent;
use log::{info, warn};
use shared::{AbortReason, AiDifficulty, MatchEvent, MatchId, PaddleIntent, Side};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;

/// Returned by a successful `create_match`.
///
/// Carries a subscription opened before the match loop started, so the
/// creator sees every event including `Started`.
#[derive(Debug)]
pub struct MatchHandle {
    match_id: MatchId,
    setup: MatchSetup,
    events: broadcast::Receiver<MatchEvent>,
}

impl MatchHandle {
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    pub fn setup(&self) -> MatchSetup {
        self.setup
    }

    pub fn events(&mut self) -> &mut broadcast::Receiver<MatchEvent> {
        &mut self.events
    }

    pub fn into_events(self) -> broadcast::Receiver<MatchEvent> {
        self.events
    }
}

/// Everything the manager keeps about one running match. The simulation
/// itself lives inside the match loop task.
struct MatchEntry {
    instance: u64,
    setup: MatchSetup,
    commands: mpsc::UnboundedSender<MatchCommand>,
    left_intents: Option<watch::Sender<PaddleIntent>>,
    right_intents: Option<watch::Sender<PaddleIntent>>,
    events: broadcast::Sender<MatchEvent>,
    task: JoinHandle<MatchStatus>,
}

impl MatchEntry {
    fn intents(&self, side: Side) -> Option<&watch::Sender<PaddleIntent>> {
        match side {
            Side::Left => self.left_intents.as_ref(),
            Side::Right => self.right_intents.as_ref(),
        }
    }

    fn send(&self, match_id: &MatchId, command: MatchCommand) -> MatchResult<()> {
        self.commands
            .send(command)
            .map_err(|_| MatchError::MatchAborted(match_id.clone()))
    }
}

type Registry = Arc<RwLock<HashMap<MatchId, MatchEntry>>>;

/// Derives a per-match seed from the configured base seed (FNV-1a over the
/// identifier), so a given id replays the same serves and AI noise.
pub fn derive_seed(base_seed: u64, match_id: &MatchId) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    match_id
        .as_str()
        .bytes()
        .fold(FNV_OFFSET ^ base_seed, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
        })
}

pub struct MatchManager {
    matches: Registry,
    config: ServerConfig,
    next_instance: AtomicU64,
}

impl MatchManager {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            matches: Arc::new(RwLock::new(HashMap::new())),
            config,
            next_instance: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates a match with a human on the left and, if `ai` is given, the
    /// AI on the right (a second human otherwise).
    pub async fn create_match(
        &self,
        match_id: impl Into<MatchId>,
        ai: Option<AiDifficulty>,
    ) -> MatchResult<MatchHandle> {
        self.create_match_with(match_id, MatchSetup::against(ai)).await
    }

    /// Creates a match with an explicit controller per side and spawns its
    /// loop. Fails with `AlreadyExists` if the identifier is taken; the
    /// existing match is left untouched.
    pub async fn create_match_with(
        &self,
        match_id: impl Into<MatchId>,
        setup: MatchSetup,
    ) -> MatchResult<MatchHandle> {
        let match_id = match_id.into();
        let mut matches = self.matches.write().await;
        if matches.contains_key(&match_id) {
            return Err(MatchError::AlreadyExists(match_id));
        }

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let seed = derive_seed(self.config.base_seed, &match_id);
        let sim = MatchSimulation::new(match_id.clone(), setup, seed);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = broadcast::channel(self.config.event_buffer.max(1));
        let mut match_loop = MatchLoop::new(
            sim,
            cmd_rx,
            event_tx.clone(),
            self.config.join_timeout,
            self.config.pause_timeout,
        );

        let mut left_intents = None;
        let mut right_intents = None;
        for side in [Side::Left, Side::Right] {
            if setup.controller(side) != Controller::Human {
                continue;
            }
            let (tx, rx) = watch::channel(PaddleIntent::STOP);
            match_loop = match_loop.with_intents(side, rx);
            match side {
                Side::Left => left_intents = Some(tx),
                Side::Right => right_intents = Some(tx),
            }
        }

        let task = {
            let registry = Arc::clone(&self.matches);
            let match_id = match_id.clone();
            tokio::spawn(async move {
                let status = match_loop.run().await;
                deregister(&registry, &match_id, instance).await;
                status
            })
        };

        info!(
            "Created match {} ({:?} vs {:?})",
            match_id, setup.left, setup.right
        );
        matches.insert(
            match_id.clone(),
            MatchEntry {
                instance,
                setup,
                commands: cmd_tx,
                left_intents,
                right_intents,
                events: event_tx,
                task,
            },
        );

        Ok(MatchHandle {
            match_id,
            setup,
            events: event_rx,
        })
    }

    /// Marks the human player of `side` as connected.
    pub async fn attach_player(&self, match_id: &MatchId, side: Side) -> MatchResult<()> {
        let matches = self.matches.read().await;
        let entry = lookup(&matches, match_id)?;
        if entry.setup.controller(side) != Controller::Human {
            return Err(MatchError::NotHumanControlled { side });
        }
        entry.send(match_id, MatchCommand::Attach { side })
    }

    /// Routes a paddle intent to a match. Only the latest intent per paddle
    /// is kept; the match loop picks it up on its next tick.
    ///
    /// A malformed intent stops the paddle and is reported as
    /// `InvalidIntent`; the match keeps running.
    pub async fn submit_intent(
        &self,
        match_id: &MatchId,
        side: Side,
        intent: impl Into<PaddleIntent>,
    ) -> MatchResult<()> {
        let matches = self.matches.read().await;
        let entry = lookup(&matches, match_id)?;
        let sender = entry
            .intents(side)
            .ok_or(MatchError::NotHumanControlled { side })?;

        let (intent, result) = match validate_intent(intent.into()) {
            Ok(intent) => (intent, Ok(())),
            Err(e) => {
                warn!("Match {}: {} from {} player", match_id, e, side);
                (PaddleIntent::STOP, Err(e))
            }
        };

        sender
            .send(intent)
            .map_err(|_| MatchError::MatchAborted(match_id.clone()))?;
        result
    }

    /// Opens a new subscription to a match's events. Subscribers only see
    /// events emitted after this call.
    pub async fn subscribe(
        &self,
        match_id: &MatchId,
    ) -> MatchResult<broadcast::Receiver<MatchEvent>> {
        let matches = self.matches.read().await;
        Ok(lookup(&matches, match_id)?.events.subscribe())
    }

    /// Asks a match to pause. `Ok` only means the command was delivered: a
    /// match that is not in progress (still waiting for players, or already
    /// paused) ignores it. The effect is visible as a `Paused` event.
    pub async fn pause_match(&self, match_id: &MatchId) -> MatchResult<()> {
        let matches = self.matches.read().await;
        lookup(&matches, match_id)?.send(match_id, MatchCommand::Pause)
    }

    /// Asks a paused match to continue. Like `pause_match`, a match in any
    /// other state ignores the command; success shows up as `Resumed`.
    pub async fn resume_match(&self, match_id: &MatchId) -> MatchResult<()> {
        let matches = self.matches.read().await;
        lookup(&matches, match_id)?.send(match_id, MatchCommand::Resume)
    }

    /// Aborts a match and waits for its loop to stop. The identifier is free
    /// again when this returns.
    pub async fn abort_match(&self, match_id: &MatchId) -> MatchResult<()> {
        let entry = {
            let mut matches = self.matches.write().await;
            matches
                .remove(match_id)
                .ok_or_else(|| MatchError::MatchNotFound(match_id.clone()))?
        };
        stop_entry(match_id, entry, AbortReason::Requested).await;
        Ok(())
    }

    /// Aborts every live match and waits for all loops to finish.
    pub async fn shutdown(&self) {
        let entries: Vec<(MatchId, MatchEntry)> = {
            let mut matches = self.matches.write().await;
            matches.drain().collect()
        };

        if !entries.is_empty() {
            info!("Shutting down {} matches", entries.len());
        }
        for (match_id, entry) in entries {
            stop_entry(&match_id, entry, AbortReason::Shutdown).await;
        }
    }

    pub async fn contains(&self, match_id: &MatchId) -> bool {
        self.matches.read().await.contains_key(match_id)
    }

    pub async fn match_ids(&self) -> Vec<MatchId> {
        let mut ids: Vec<MatchId> = self.matches.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of live matches
    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }
}

impl Default for MatchManager {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

fn lookup<'a>(
    matches: &'a HashMap<MatchId, MatchEntry>,
    match_id: &MatchId,
) -> MatchResult<&'a MatchEntry> {
    matches
        .get(match_id)
        .ok_or_else(|| MatchError::MatchNotFound(match_id.clone()))
}

/// Removes a finished match, unless the identifier has meanwhile been taken
/// by a newer instance.
async fn deregister(registry: &Registry, match_id: &MatchId, instance: u64) {
    let mut matches = registry.write().await;
    if matches
        .get(match_id)
        .map_or(false, |entry| entry.instance == instance)
    {
        matches.remove(match_id);
        info!("Match {} deregistered", match_id);
    }
}

async fn stop_entry(match_id: &MatchId, entry: MatchEntry, reason: AbortReason) {
    // The loop may already have ended on its own
    let _ = entry.commands.send(MatchCommand::Abort { reason });
    match entry.task.await {
        Ok(status) => info!("Match {} stopped ({:?})", match_id, status),
        Err(e) => warn!("Match {} task failed: {}", match_id, e),
    }
}
