//! Core daemon for edgelink.
//!
//! Implements the edge handoff state machine, the dual-channel session with
//! its reader and writer tasks, clipboard and hotkey wiring, and the
//! handle the CLI drives it through.

pub mod config;
pub mod daemon;
pub mod edge;
pub mod error;
pub mod hotkey;
pub mod session;
pub mod setup;
pub mod state;

pub use config::Config;
pub use daemon::{
    start, Backends, Daemon, DaemonEvent, DaemonHandle, DaemonStatus, RunningDaemon, SessionEnd,
};
pub use error::DaemonError;
pub use state::{SessionPhase, SharedState};
