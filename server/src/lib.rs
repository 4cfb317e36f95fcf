//! # Pong Match Server Library
//!
//! This library provides the authoritative simulation core for two-player
//! Pong matches. It owns the canonical state of every match, advances it at a
//! fixed tick rate, and publishes snapshots for a transport layer to deliver.
//! Authentication, chat, tournaments and the network transport itself are
//! handled by other services and only meet this crate through the
//! `MatchManager` API and the per-match event stream.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Ball integration, wall and paddle collisions, speed escalation, scoring
//! and the first-to-11 win condition all run here. Clients only ever see
//! copies of the resulting state.
//!
//! ### Computer Opponents
//! A paddle can be driven by an AI whose perception is deliberately limited:
//! it looks at the ball at most once per second, with an error that depends
//! on the difficulty tier, and holds its decision until the next look.
//!
//! ### Match Lifecycle
//! Matches wait for their players, run, may be paused and resumed, and end
//! either with a winner or by being aborted (on request, when players never
//! show up, or when a pause lasts too long).
//!
//! ## Architecture Design
//!
//! ### One Task per Match
//! Every match runs in its own tokio task that exclusively owns the match
//! state. Matches run concurrently with each other but each one is advanced
//! by a single writer, so the tick path takes no locks.
//!
//! ### Message Passing
//! Lifecycle commands reach a match over an mpsc channel, human paddle
//! intents over a watch channel per paddle (only the latest intent matters),
//! and events leave over a broadcast channel. A slow subscriber loses old
//! snapshots instead of slowing the match down.
//!
//! ### Deterministic Core
//! The simulation steps with a fixed delta time and draws all randomness
//! (serve angles, AI error) from a per-match seeded generator, so a match id
//! and seed replay identically.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The synchronous match state machine: physics step, scoring, win
//! detection, pause/abort transitions and snapshot production.
//!
//! ### Paddle Module (`paddle`)
//! Intent validation and bounded paddle motion.
//!
//! ### AI Module (`ai`)
//! The rate-limited, noisy computer opponent.
//!
//! ### Match Loop Module (`match_loop`)
//! The async task that ticks one match and handles its commands and
//! timeouts.
//!
//! ### Match Manager Module (`match_manager`)
//! The registry of live matches: creation, routing of intents and commands,
//! subscriptions and cleanup.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::match_manager::MatchManager;
//! use shared::{AiDifficulty, Direction, MatchEvent, Side};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = MatchManager::new(ServerConfig::default());
//!
//!     // A human on the left against the hard AI on the right
//!     let mut handle = manager.create_match("match-1", Some(AiDifficulty::Hard)).await?;
//!     let id = handle.match_id().clone();
//!     manager.attach_player(&id, Side::Left).await?;
//!     manager.submit_intent(&id, Side::Left, Direction::Up).await?;
//!
//!     while let Ok(event) = handle.events().recv().await {
//!         if let MatchEvent::Snapshot(state) = &event {
//!             println!("tick {}: {}-{}", state.tick, state.score1, state.score2);
//!         }
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod config;
pub mod error;
pub mod game;
pub mod match_loop;
pub mod match_manager;
pub mod paddle;
