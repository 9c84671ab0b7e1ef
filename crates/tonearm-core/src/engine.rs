//! Capability surface of the decode/render engine.
//!
//! The player drives an [`Engine`] with fire-and-forget requests and
//! learns about progress only through [`Signal`]s the engine sends back
//! on the [`SignalSender`] it received at load time. Engines may run on
//! any thread; they never touch session state directly.

use std::sync::mpsc::Sender;

use crate::error::PlaybackError;
use crate::machine::Input;
use crate::session::SessionId;


/// Low-level notifications from an engine.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Signal {
    /// Percentage of the source buffered so far.
    Buffering( u8 ),

    /// Playback control is possible; carries the total length.
    Ready { duration_ms: u64 },

    /// Playhead position while playing.
    Position( u64 ),

    EndOfStream,

    /// The latest seek request was resolved to this position.
    SeekDone { position_ms: u64 },

    Error( PlaybackError ),
}


/// Sends signals for one session back to the player.
///
/// Every signal is tagged with the session it was issued for; the player
/// drops signals that belong to a session it has already discarded.
#[derive( Debug, Clone )]
pub struct SignalSender {
    session: SessionId,
    tx: Sender<Input>,
}


impl SignalSender {
    pub(crate) fn new( session: SessionId, tx: Sender<Input> ) -> Self {
        Self { session, tx }
    }


    /// The session these signals belong to.
    pub fn session( &self ) -> SessionId {
        self.session
    }


    /// Queues a signal. Returns false once the player has been dropped.
    pub fn send( &self, signal: Signal ) -> bool {
        self.tx.send( Input::Signal { session: self.session, signal } ).is_ok()
    }


    pub fn buffering( &self, percent: u8 ) -> bool {
        self.send( Signal::Buffering( percent ) )
    }


    pub fn ready( &self, duration_ms: u64 ) -> bool {
        self.send( Signal::Ready { duration_ms } )
    }


    pub fn position( &self, position_ms: u64 ) -> bool {
        self.send( Signal::Position( position_ms ) )
    }


    pub fn end_of_stream( &self ) -> bool {
        self.send( Signal::EndOfStream )
    }


    pub fn seek_done( &self, position_ms: u64 ) -> bool {
        self.send( Signal::SeekDone { position_ms } )
    }


    pub fn error( &self, error: PlaybackError ) -> bool {
        self.send( Signal::Error( error ) )
    }
}


/// Primitives a playback engine must provide.
///
/// All requests return immediately. Results arrive later as signals.
pub trait Engine {
    /// Starts loading a source. Buffering, readiness and failures for
    /// this source must be reported through `signals`.
    fn load( &mut self, source: &str, signals: SignalSender );

    /// Starts or resumes rendering.
    fn start( &mut self );

    fn pause( &mut self );

    /// Releases the current source. Signals for it may still arrive and
    /// will be ignored.
    fn release( &mut self );

    /// Moves the playhead. Every request is answered by exactly one
    /// `SeekDone` (or an `Error`), in request order.
    fn seek( &mut self, target_ms: u64 );

    /// Current playhead position, if the engine can report one.
    fn position( &self ) -> Option<u64>;
}


impl<E: Engine + ?Sized> Engine for Box<E> {
    fn load( &mut self, source: &str, signals: SignalSender ) {
        ( **self ).load( source, signals )
    }


    fn start( &mut self ) {
        ( **self ).start()
    }


    fn pause( &mut self ) {
        ( **self ).pause()
    }


    fn release( &mut self ) {
        ( **self ).release()
    }


    fn seek( &mut self, target_ms: u64 ) {
        ( **self ).seek( target_ms )
    }


    fn position( &self ) -> Option<u64> {
        ( **self ).position()
    }
}
