//! Playback state machine.
//!
//! The machine owns the current [`PlaybackSession`] and turns each input
//! (a caller command or a tagged engine signal) into an ordered list of
//! [`Effect`]s: engine requests to issue and notifications to deliver.
//! It performs no I/O itself, so every transition is straight-line logic
//! that can be tested without an engine.

use crate::command::Command;
use crate::engine::Signal;
use crate::error::PlaybackError;
use crate::listener::Notification;
use crate::session::{ PlaybackSession, SessionId };
use crate::state::{ PlaybackState, SeekOrigin };


/// Everything that can reach the sequencing point.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Input {
    Command( Command ),
    Signal { session: SessionId, signal: Signal },
}


/// A primitive request for the engine.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum EngineRequest {
    Load { session: SessionId, source: String },
    Start,
    Pause,
    Release,
    Seek( u64 ),
}


/// Output of one transition, applied in order.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Effect {
    Engine( EngineRequest ),
    Notify( Notification ),
}


/// The authoritative playback model.
#[derive( Debug, Default )]
pub struct StateMachine {
    session: Option<PlaybackSession>,
    last_session: u64,
}


impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }


    /// Current state; `Idle` when no session exists.
    pub fn state( &self ) -> PlaybackState {
        self.session.as_ref().map( |s| s.state() ).unwrap_or( PlaybackState::Idle )
    }


    pub fn session( &self ) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }


    /// Applies one input and returns the effects it produced.
    pub fn handle( &mut self, input: Input ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            Input::Command( command ) => self.on_command( command, &mut effects ),
            Input::Signal { session, signal } => self.on_signal( session, signal, &mut effects ),
        }
        effects
    }


    /// Records the engine's playhead without notifying anyone.
    ///
    /// Used to refresh the position when playback is paused, since ticks
    /// only arrive while playing.
    pub fn settle_position( &mut self, position_ms: u64 ) {
        if let Some( session ) = self.session.as_mut() {
            if matches!( session.state(), PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused ) {
                session.set_position( position_ms );
            }
        }
    }


    fn on_command( &mut self, command: Command, out: &mut Vec<Effect> ) {
        match command {
            Command::Load { source } => self.load( source, out ),
            Command::Play => self.play( out ),
            Command::Pause => self.pause( out ),
            Command::Stop => self.stop( out ),
            Command::Seek { position_ms } => self.seek( position_ms, out ),
        }
    }


    fn load( &mut self, source: String, out: &mut Vec<Effect> ) {
        if self.session.is_some() {
            self.stop( out );
        }

        self.last_session += 1;
        let id = SessionId::new( self.last_session );
        tracing::info!( "Loading {} (session {})", source, id );

        out.push( Effect::Engine( EngineRequest::Load { session: id, source: source.clone() } ) );
        out.push( Effect::Notify( Notification::AudioLoading ) );
        self.session = Some( PlaybackSession::new( id, source ) );
    }


    fn play( &mut self, out: &mut Vec<Effect> ) {
        let Some( session ) = self.session.as_mut() else {
            tracing::warn!( "Can't play: nothing loaded" );
            return;
        };

        let next = match session.state() {
            PlaybackState::Ready | PlaybackState::Paused => PlaybackState::Playing,
            PlaybackState::Seeking { origin } if !origin.is_playing() => {
                PlaybackState::Seeking { origin: SeekOrigin::Playing }
            }
            PlaybackState::Playing | PlaybackState::Seeking { .. } => {
                tracing::debug!( "Already playing" );
                return;
            }
            other => {
                tracing::warn!( "Can't play in current state: {}", other.label() );
                return;
            }
        };

        transition( session, next );
        out.push( Effect::Engine( EngineRequest::Start ) );
        out.push( Effect::Notify( Notification::Playing ) );
    }


    fn pause( &mut self, out: &mut Vec<Effect> ) {
        let Some( session ) = self.session.as_mut() else {
            tracing::warn!( "Can't pause: nothing loaded" );
            return;
        };

        let next = match session.state() {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Seeking { origin: SeekOrigin::Playing } => {
                PlaybackState::Seeking { origin: SeekOrigin::Paused }
            }
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Seeking { .. } => {
                tracing::debug!( "Already paused" );
                return;
            }
            other => {
                tracing::warn!( "Can't pause in current state: {}", other.label() );
                return;
            }
        };

        transition( session, next );
        out.push( Effect::Engine( EngineRequest::Pause ) );
        out.push( Effect::Notify( Notification::Paused ) );
    }


    fn stop( &mut self, out: &mut Vec<Effect> ) {
        let Some( session ) = self.session.take() else {
            tracing::debug!( "Stop ignored: nothing loaded" );
            return;
        };

        tracing::info!( "Stopped session {} from {}", session.id(), session.state().label() );
        out.push( Effect::Engine( EngineRequest::Release ) );
        out.push( Effect::Notify( Notification::Stopped ) );
    }


    fn seek( &mut self, position_ms: u64, out: &mut Vec<Effect> ) {
        let Some( session ) = self.session.as_mut() else {
            tracing::warn!( "Can't seek: nothing loaded" );
            return;
        };

        let Some( origin ) = session.state().seek_origin() else {
            tracing::warn!( "Can't seek in current state: {}", session.state().label() );
            return;
        };

        let target = session.clamp( position_ms );
        if target != position_ms {
            tracing::debug!( "Seek target {}ms clamped to {}ms", position_ms, target );
        }

        let completed = session.state().is_completed();
        session.begin_seek( target );
        transition( session, PlaybackState::Seeking { origin } );
        out.push( Effect::Notify( Notification::SeekStarted ) );
        if completed {
            // Hold the engine still so the scrubbed position waits for play
            out.push( Effect::Engine( EngineRequest::Pause ) );
        }
        out.push( Effect::Engine( EngineRequest::Seek( target ) ) );
    }


    fn on_signal( &mut self, tag: SessionId, signal: Signal, out: &mut Vec<Effect> ) {
        let Some( session ) = self.session.as_mut() else {
            tracing::trace!( "Dropping {:?} from session {}: idle", signal, tag );
            return;
        };

        if session.id() != tag {
            tracing::trace!( "Dropping {:?} from discarded session {}", signal, tag );
            return;
        }

        match signal {
            Signal::Buffering( percent ) => {
                session.set_buffered_percent( percent );
                out.push( Effect::Notify( Notification::BufferingUpdate( percent ) ) );
            }

            Signal::Ready { duration_ms } => {
                if session.state() != PlaybackState::Loading || !session.set_duration( duration_ms ) {
                    tracing::trace!( "Dropping duplicate readiness for session {}", tag );
                    return;
                }
                transition( session, PlaybackState::Ready );
                out.push( Effect::Notify( Notification::AudioReady { length_ms: duration_ms } ) );
                out.push( Effect::Notify( Notification::Paused ) );
            }

            Signal::Position( position_ms ) => {
                if session.state() != PlaybackState::Playing {
                    tracing::trace!( "Dropping position tick while {}", session.state().label() );
                    return;
                }
                let position_ms = session.set_position( position_ms );
                let length_ms = session.duration_ms().unwrap_or( 0 );
                out.push( Effect::Notify( Notification::PlaybackUpdate { position_ms, length_ms } ) );
            }

            Signal::EndOfStream => {
                if matches!( session.state(), PlaybackState::Seeking { origin: SeekOrigin::Playing } ) {
                    tracing::debug!( "End of stream during seek on session {}, deferred", tag );
                    session.defer_completion();
                    return;
                }
                if session.state() != PlaybackState::Playing {
                    tracing::trace!( "Dropping end of stream while {}", session.state().label() );
                    return;
                }
                if let Some( duration ) = session.duration_ms() {
                    session.set_position( duration );
                }
                transition( session, PlaybackState::Completed );
                out.push( Effect::Notify( Notification::Completed ) );
            }

            Signal::SeekDone { position_ms } => {
                let PlaybackState::Seeking { origin } = session.state() else {
                    tracing::trace!( "Dropping seek completion while {}", session.state().label() );
                    return;
                };
                if !session.finish_seek() {
                    tracing::debug!( "Seek to {}ms superseded", position_ms );
                    return;
                }
                let position_ms = session.set_position( position_ms );
                if session.take_deferred_completion() {
                    if let Some( duration ) = session.duration_ms() {
                        session.set_position( duration );
                    }
                    transition( session, PlaybackState::Completed );
                    out.push( Effect::Notify( Notification::SeekCompleted { position_ms } ) );
                    out.push( Effect::Notify( Notification::Completed ) );
                    return;
                }
                transition( session, origin.resume_state() );
                out.push( Effect::Notify( Notification::SeekCompleted { position_ms } ) );
            }

            Signal::Error( error ) => self.fail( error, out ),
        }
    }


    /// Forced stop after an engine failure. The engine is not asked to
    /// release; it reported the failure and owns its own cleanup.
    fn fail( &mut self, error: PlaybackError, out: &mut Vec<Effect> ) {
        if let Some( session ) = self.session.take() {
            tracing::warn!(
                "Session {} failed while {}: {}",
                session.id(),
                session.state().label(),
                error
            );
            out.push( Effect::Notify( Notification::Error( error ) ) );
            out.push( Effect::Notify( Notification::Stopped ) );
        }
    }
}


fn transition( session: &mut PlaybackSession, next: PlaybackState ) {
    tracing::debug!( "Session {}: {:?} -> {:?}", session.id(), session.state(), next );
    session.set_state( next );
}


#[cfg( test )]
mod tests {
    use super::*;


    fn notifications( effects: &[Effect] ) -> Vec<Notification> {
        effects.iter()
            .filter_map( |e| match e {
                Effect::Notify( n ) => Some( n.clone() ),
                Effect::Engine( _ ) => None,
            })
            .collect()
    }


    fn requests( effects: &[Effect] ) -> Vec<EngineRequest> {
        effects.iter()
            .filter_map( |e| match e {
                Effect::Engine( r ) => Some( r.clone() ),
                Effect::Notify( _ ) => None,
            })
            .collect()
    }


    fn signal( machine: &StateMachine, signal: Signal ) -> Input {
        let session = machine.session().map( |s| s.id() ).expect( "session" );
        Input::Signal { session, signal }
    }


    /// Loads a source and delivers readiness.
    fn ready_machine( duration_ms: u64 ) -> StateMachine {
        let mut machine = StateMachine::new();
        machine.handle( Input::Command( Command::Load { source: "file:///a.flac".into() } ) );
        let input = signal( &machine, Signal::Ready { duration_ms } );
        machine.handle( input );
        machine
    }


    fn playing_machine( duration_ms: u64 ) -> StateMachine {
        let mut machine = ready_machine( duration_ms );
        machine.handle( Input::Command( Command::Play ) );
        machine
    }


    #[test]
    fn test_idle_commands_are_noops() {
        let mut machine = StateMachine::new();
        for command in [ Command::Play, Command::Pause, Command::Stop, Command::Seek { position_ms: 10 } ] {
            let effects = machine.handle( Input::Command( command ) );
            assert!( effects.is_empty() );
            assert_eq!( machine.state(), PlaybackState::Idle );
        }
    }


    #[test]
    fn test_load_requests_engine_and_notifies() {
        let mut machine = StateMachine::new();
        let effects = machine.handle( Input::Command( Command::Load { source: "http://x/a.mp3".into() } ) );

        assert_eq!( machine.state(), PlaybackState::Loading );
        assert_eq!( notifications( &effects ), vec![ Notification::AudioLoading ] );
        assert_eq!(
            requests( &effects ),
            vec![ EngineRequest::Load { session: SessionId::new( 1 ), source: "http://x/a.mp3".into() } ]
        );
    }


    #[test]
    fn test_load_over_existing_session_stops_first() {
        let mut machine = playing_machine( 60_000 );
        let effects = machine.handle( Input::Command( Command::Load { source: "file:///b.ogg".into() } ) );

        assert_eq!(
            notifications( &effects ),
            vec![ Notification::Stopped, Notification::AudioLoading ]
        );
        assert_eq!( requests( &effects )[ 0 ], EngineRequest::Release );
        assert_eq!( machine.session().map( |s| s.id() ), Some( SessionId::new( 2 ) ) );
    }


    #[test]
    fn test_ready_lands_paused() {
        let mut machine = StateMachine::new();
        machine.handle( Input::Command( Command::Load { source: "file:///a.flac".into() } ) );
        let input = signal( &machine, Signal::Ready { duration_ms: 120_000 } );
        let effects = machine.handle( input );

        assert_eq!(
            notifications( &effects ),
            vec![ Notification::AudioReady { length_ms: 120_000 }, Notification::Paused ]
        );
        assert_eq!( machine.state(), PlaybackState::Ready );
        assert!( machine.state().is_paused() );
    }


    #[test]
    fn test_second_ready_is_dropped() {
        let mut machine = ready_machine( 120_000 );
        let input = signal( &machine, Signal::Ready { duration_ms: 1 } );
        assert!( machine.handle( input ).is_empty() );
        assert_eq!( machine.session().and_then( |s| s.duration_ms() ), Some( 120_000 ) );
    }


    #[test]
    fn test_play_twice_starts_once() {
        let mut machine = ready_machine( 10_000 );
        let first = machine.handle( Input::Command( Command::Play ) );
        let second = machine.handle( Input::Command( Command::Play ) );

        assert_eq!( requests( &first ), vec![ EngineRequest::Start ] );
        assert_eq!( notifications( &first ), vec![ Notification::Playing ] );
        assert!( second.is_empty() );
    }


    #[test]
    fn test_pause_while_loading_is_ignored() {
        let mut machine = StateMachine::new();
        machine.handle( Input::Command( Command::Load { source: "http://x/a.mp3".into() } ) );
        assert!( machine.handle( Input::Command( Command::Pause ) ).is_empty() );
        assert!( machine.handle( Input::Command( Command::Play ) ).is_empty() );
        assert!( machine.handle( Input::Command( Command::Seek { position_ms: 5 } ) ).is_empty() );
        assert_eq!( machine.state(), PlaybackState::Loading );
    }


    #[test]
    fn test_pause_when_paused_is_silent() {
        let mut machine = playing_machine( 10_000 );
        let first = machine.handle( Input::Command( Command::Pause ) );
        let second = machine.handle( Input::Command( Command::Pause ) );

        assert_eq!( notifications( &first ), vec![ Notification::Paused ] );
        assert!( second.is_empty() );
    }


    #[test]
    fn test_position_ticks_only_while_playing() {
        let mut machine = playing_machine( 10_000 );
        let input = signal( &machine, Signal::Position( 2_500 ) );
        assert_eq!(
            notifications( &machine.handle( input ) ),
            vec![ Notification::PlaybackUpdate { position_ms: 2_500, length_ms: 10_000 } ]
        );

        machine.handle( Input::Command( Command::Pause ) );
        let input = signal( &machine, Signal::Position( 3_000 ) );
        assert!( machine.handle( input ).is_empty() );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 2_500 ) );
    }


    #[test]
    fn test_position_clamped_to_duration() {
        let mut machine = playing_machine( 10_000 );
        let input = signal( &machine, Signal::Position( 99_999 ) );
        assert_eq!(
            notifications( &machine.handle( input ) ),
            vec![ Notification::PlaybackUpdate { position_ms: 10_000, length_ms: 10_000 } ]
        );
    }


    #[test]
    fn test_end_of_stream_completes() {
        let mut machine = playing_machine( 10_000 );
        let input = signal( &machine, Signal::EndOfStream );
        assert_eq!( notifications( &machine.handle( input ) ), vec![ Notification::Completed ] );
        assert_eq!( machine.state(), PlaybackState::Completed );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 10_000 ) );

        // No replay from completed; stop still works
        assert!( machine.handle( Input::Command( Command::Play ) ).is_empty() );
        assert_eq!(
            notifications( &machine.handle( Input::Command( Command::Stop ) ) ),
            vec![ Notification::Stopped ]
        );
    }


    #[test]
    fn test_seek_from_completed_lands_paused() {
        let mut machine = playing_machine( 10_000 );
        let input = signal( &machine, Signal::EndOfStream );
        machine.handle( input );

        let effects = machine.handle( Input::Command( Command::Seek { position_ms: 0 } ) );
        assert_eq!( notifications( &effects ), vec![ Notification::SeekStarted ] );
        assert_eq!( requests( &effects ), vec![ EngineRequest::Pause, EngineRequest::Seek( 0 ) ] );
        assert_eq!( machine.state(), PlaybackState::Seeking { origin: SeekOrigin::Paused } );

        let effects = machine.handle( Input::Command( Command::Play ) );
        assert_eq!( notifications( &effects ), vec![ Notification::Playing ] );

        let input = signal( &machine, Signal::SeekDone { position_ms: 0 } );
        assert_eq!(
            notifications( &machine.handle( input ) ),
            vec![ Notification::SeekCompleted { position_ms: 0 } ]
        );
        assert_eq!( machine.state(), PlaybackState::Playing );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 0 ) );
    }


    #[test]
    fn test_end_of_stream_during_seek_completes_after_it() {
        let mut machine = playing_machine( 60_000 );
        machine.handle( Input::Command( Command::Seek { position_ms: 59_990 } ) );

        let input = signal( &machine, Signal::EndOfStream );
        assert!( machine.handle( input ).is_empty() );
        assert!( machine.state().is_playing() );

        let input = signal( &machine, Signal::SeekDone { position_ms: 59_990 } );
        assert_eq!(
            notifications( &machine.handle( input ) ),
            vec![ Notification::SeekCompleted { position_ms: 59_990 }, Notification::Completed ]
        );
        assert_eq!( machine.state(), PlaybackState::Completed );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 60_000 ) );
    }


    #[test]
    fn test_later_seek_discards_deferred_end_of_stream() {
        let mut machine = playing_machine( 60_000 );
        machine.handle( Input::Command( Command::Seek { position_ms: 59_990 } ) );
        let input = signal( &machine, Signal::EndOfStream );
        machine.handle( input );
        machine.handle( Input::Command( Command::Seek { position_ms: 1_000 } ) );

        for position_ms in [ 59_990, 1_000 ] {
            let input = signal( &machine, Signal::SeekDone { position_ms } );
            machine.handle( input );
        }
        assert_eq!( machine.state(), PlaybackState::Playing );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 1_000 ) );
    }


    #[test]
    fn test_seek_error_stops_and_drops_late_completion() {
        let mut machine = playing_machine( 60_000 );
        machine.handle( Input::Command( Command::Seek { position_ms: 20_000 } ) );
        let session = machine.session().map( |s| s.id() ).expect( "session" );

        let error = PlaybackError::Seek( "target unreachable".into() );
        let effects = machine.handle( Input::Signal { session, signal: Signal::Error( error.clone() ) } );
        assert_eq!(
            notifications( &effects ),
            vec![ Notification::Error( error ), Notification::Stopped ]
        );
        assert_eq!( machine.state(), PlaybackState::Idle );
        assert!( machine.session().and_then( |s| s.pending_seek() ).is_none() );

        let late = Input::Signal { session, signal: Signal::SeekDone { position_ms: 20_000 } };
        assert!( machine.handle( late ).is_empty() );
        assert_eq!( machine.state(), PlaybackState::Idle );
    }


    #[test]
    fn test_seek_returns_to_origin() {
        let mut machine = playing_machine( 120_000 );
        let effects = machine.handle( Input::Command( Command::Seek { position_ms: 30_000 } ) );

        assert_eq!( notifications( &effects ), vec![ Notification::SeekStarted ] );
        assert_eq!( requests( &effects ), vec![ EngineRequest::Seek( 30_000 ) ] );
        assert_eq!( machine.state(), PlaybackState::Seeking { origin: SeekOrigin::Playing } );
        assert_eq!( machine.session().and_then( |s| s.pending_seek() ), Some( 30_000 ) );

        let input = signal( &machine, Signal::SeekDone { position_ms: 30_000 } );
        let effects = machine.handle( input );
        assert_eq!( notifications( &effects ), vec![ Notification::SeekCompleted { position_ms: 30_000 } ] );
        assert_eq!( machine.state(), PlaybackState::Playing );
        assert_eq!( machine.session().and_then( |s| s.pending_seek() ), None );
    }


    #[test]
    fn test_seek_supersession_reports_latest_only() {
        let mut machine = ready_machine( 120_000 );
        machine.handle( Input::Command( Command::Seek { position_ms: 5_000 } ) );
        machine.handle( Input::Command( Command::Seek { position_ms: 9_000 } ) );
        assert_eq!( machine.session().and_then( |s| s.pending_seek() ), Some( 9_000 ) );

        let first = signal( &machine, Signal::SeekDone { position_ms: 5_000 } );
        assert!( machine.handle( first ).is_empty() );

        let second = signal( &machine, Signal::SeekDone { position_ms: 9_000 } );
        assert_eq!(
            notifications( &machine.handle( second ) ),
            vec![ Notification::SeekCompleted { position_ms: 9_000 } ]
        );
        assert_eq!( machine.state(), PlaybackState::Ready );
    }


    #[test]
    fn test_seek_past_end_is_clamped() {
        let mut machine = playing_machine( 10_000 );
        let effects = machine.handle( Input::Command( Command::Seek { position_ms: 50_000 } ) );
        assert_eq!( requests( &effects ), vec![ EngineRequest::Seek( 10_000 ) ] );
    }


    #[test]
    fn test_pause_during_seek_changes_origin() {
        let mut machine = playing_machine( 60_000 );
        machine.handle( Input::Command( Command::Seek { position_ms: 1_000 } ) );

        let effects = machine.handle( Input::Command( Command::Pause ) );
        assert_eq!( requests( &effects ), vec![ EngineRequest::Pause ] );
        assert_eq!( notifications( &effects ), vec![ Notification::Paused ] );

        let input = signal( &machine, Signal::SeekDone { position_ms: 1_000 } );
        machine.handle( input );
        assert_eq!( machine.state(), PlaybackState::Paused );
    }


    #[test]
    fn test_stale_signals_are_dropped() {
        let mut machine = StateMachine::new();
        machine.handle( Input::Command( Command::Load { source: "http://x/a.mp3".into() } ) );
        let stale = machine.session().map( |s| s.id() ).expect( "session" );
        machine.handle( Input::Command( Command::Stop ) );

        let effects = machine.handle( Input::Signal { session: stale, signal: Signal::Buffering( 50 ) } );
        assert!( effects.is_empty() );

        machine.handle( Input::Command( Command::Load { source: "http://x/b.mp3".into() } ) );
        let effects = machine.handle( Input::Signal { session: stale, signal: Signal::Ready { duration_ms: 1 } } );
        assert!( effects.is_empty() );
        assert_eq!( machine.state(), PlaybackState::Loading );
    }


    #[test]
    fn test_error_forces_idle() {
        let mut machine = playing_machine( 60_000 );
        let error = PlaybackError::Runtime( "decoder crashed".into() );
        let input = signal( &machine, Signal::Error( error.clone() ) );
        let effects = machine.handle( input );

        assert!( requests( &effects ).is_empty() );
        assert_eq!(
            notifications( &effects ),
            vec![ Notification::Error( error ), Notification::Stopped ]
        );
        assert_eq!( machine.state(), PlaybackState::Idle );
    }


    #[test]
    fn test_settle_position_is_silent() {
        let mut machine = playing_machine( 60_000 );
        machine.handle( Input::Command( Command::Pause ) );
        machine.settle_position( 4_200 );
        assert_eq!( machine.session().map( |s| s.position_ms() ), Some( 4_200 ) );
    }
}
