//! Tonearm Core - Playback control for a single stream or clip
//!
//! This crate provides the playback state machine, the listener protocol,
//! and the [`Player`] facade that sequences caller commands and engine
//! signals. Decoding, rendering, and network transport belong to an
//! [`Engine`] implementation supplied by the embedding application.

pub mod command;
pub mod engine;
pub mod error;
pub mod listener;
pub mod machine;
pub mod player;
pub mod session;
pub mod state;

#[cfg( test )]
mod testing;

pub use command::{ Command, CommandError, MethodCall };
pub use engine::{ Engine, Signal, SignalSender };
pub use error::PlaybackError;
pub use listener::{ ListenerRegistry, Notification, PlayerListener };
pub use machine::{ Effect, EngineRequest, Input, StateMachine };
pub use player::{ Player, PlayerHandle };
pub use session::{ PlaybackSession, SessionId };
pub use state::{ PlaybackState, SeekOrigin };
