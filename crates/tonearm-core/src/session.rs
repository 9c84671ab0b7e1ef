//! The record of one loaded stream or clip.

use std::fmt;

use crate::state::PlaybackState;


/// Identity of a session. Engine signals carry it so late signals from a
/// discarded session can be recognised and dropped.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct SessionId( u64 );


impl SessionId {
    pub fn new( raw: u64 ) -> Self {
        Self( raw )
    }


    pub fn get( self ) -> u64 {
        self.0
    }
}


impl fmt::Display for SessionId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// One loaded stream or clip.
#[derive( Debug, Clone )]
pub struct PlaybackSession {
    id: SessionId,
    source: String,
    /// Unknown until readiness, then fixed.
    duration_ms: Option<u64>,
    position_ms: u64,
    buffered_percent: u8,
    state: PlaybackState,
    pending_seek: Option<u64>,
    /// Seek requests the engine has not answered yet.
    seeks_in_flight: u32,
    /// End of stream reported while a seek was in flight.
    completion_deferred: bool,
}


impl PlaybackSession {
    /// Creates a session in the `Loading` state.
    pub fn new( id: SessionId, source: impl Into<String> ) -> Self {
        Self {
            id,
            source: source.into(),
            duration_ms: None,
            position_ms: 0,
            buffered_percent: 0,
            state: PlaybackState::Loading,
            pending_seek: None,
            seeks_in_flight: 0,
            completion_deferred: false,
        }
    }


    pub fn id( &self ) -> SessionId {
        self.id
    }


    /// The URL or file reference given to `load`.
    pub fn source( &self ) -> &str {
        &self.source
    }


    pub fn duration_ms( &self ) -> Option<u64> {
        self.duration_ms
    }


    pub fn position_ms( &self ) -> u64 {
        self.position_ms
    }


    pub fn buffered_percent( &self ) -> u8 {
        self.buffered_percent
    }


    pub fn state( &self ) -> PlaybackState {
        self.state
    }


    pub fn pending_seek( &self ) -> Option<u64> {
        self.pending_seek
    }


    pub(crate) fn set_state( &mut self, state: PlaybackState ) {
        self.state = state;
    }


    pub(crate) fn set_buffered_percent( &mut self, percent: u8 ) {
        self.buffered_percent = percent;
    }


    /// Records the duration. Returns false if it was already known.
    pub(crate) fn set_duration( &mut self, duration_ms: u64 ) -> bool {
        if self.duration_ms.is_some() {
            return false;
        }
        self.duration_ms = Some( duration_ms );
        true
    }


    /// Stores a position, bounded by the duration once it is known.
    pub(crate) fn set_position( &mut self, position_ms: u64 ) -> u64 {
        self.position_ms = self.clamp( position_ms );
        self.position_ms
    }


    /// Records a new seek request, superseding any pending target.
    pub(crate) fn begin_seek( &mut self, target_ms: u64 ) {
        self.pending_seek = Some( target_ms );
        self.seeks_in_flight += 1;
        self.completion_deferred = false;
    }


    /// Holds an end of stream until the seek in flight resolves.
    pub(crate) fn defer_completion( &mut self ) {
        self.completion_deferred = true;
    }


    /// Returns and clears a deferred end of stream.
    pub(crate) fn take_deferred_completion( &mut self ) -> bool {
        std::mem::take( &mut self.completion_deferred )
    }


    /// Accounts for one answered seek request.
    ///
    /// Returns true when it answered the latest request, which clears the
    /// pending target.
    pub(crate) fn finish_seek( &mut self ) -> bool {
        self.seeks_in_flight = self.seeks_in_flight.saturating_sub( 1 );
        if self.seeks_in_flight == 0 {
            self.pending_seek = None;
            true
        } else {
            false
        }
    }


    /// Bounds a position to `[0, duration]`.
    pub fn clamp( &self, position_ms: u64 ) -> u64 {
        match self.duration_ms {
            Some( duration ) => position_ms.min( duration ),
            None => position_ms,
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_new_session_is_loading() {
        let session = PlaybackSession::new( SessionId::new( 1 ), "http://x/a.mp3" );
        assert_eq!( session.state(), PlaybackState::Loading );
        assert_eq!( session.duration_ms(), None );
        assert_eq!( session.source(), "http://x/a.mp3" );
    }


    #[test]
    fn test_duration_is_set_once() {
        let mut session = PlaybackSession::new( SessionId::new( 1 ), "file:///a.ogg" );
        assert!( session.set_duration( 120_000 ) );
        assert!( !session.set_duration( 5 ) );
        assert_eq!( session.duration_ms(), Some( 120_000 ) );
    }


    #[test]
    fn test_position_bounded_by_duration() {
        let mut session = PlaybackSession::new( SessionId::new( 1 ), "file:///a.ogg" );
        assert_eq!( session.set_position( 500_000 ), 500_000 );
        session.set_duration( 120_000 );
        assert_eq!( session.set_position( 500_000 ), 120_000 );
    }


    #[test]
    fn test_only_last_seek_finishes() {
        let mut session = PlaybackSession::new( SessionId::new( 3 ), "file:///a.ogg" );
        session.begin_seek( 5_000 );
        session.begin_seek( 9_000 );
        assert_eq!( session.pending_seek(), Some( 9_000 ) );

        assert!( !session.finish_seek() );
        assert_eq!( session.pending_seek(), Some( 9_000 ) );
        assert!( session.finish_seek() );
        assert_eq!( session.pending_seek(), None );
    }


    #[test]
    fn test_new_seek_discards_deferred_completion() {
        let mut session = PlaybackSession::new( SessionId::new( 4 ), "file:///a.ogg" );
        session.begin_seek( 1_000 );
        session.defer_completion();
        session.begin_seek( 2_000 );
        assert!( !session.take_deferred_completion() );

        session.defer_completion();
        assert!( session.take_deferred_completion() );
        assert!( !session.take_deferred_completion() );
    }
}
