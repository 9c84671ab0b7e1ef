//! Public playback facade.
//!
//! [`Player`] is the single sequencing point. Caller commands, commands
//! queued through a [`PlayerHandle`], and engine signals all enter one
//! inbox and are applied one at a time, in arrival order. Each input
//! runs to completion (engine requests issued, every notification
//! delivered) before the next one is taken.

use std::sync::mpsc::{ self, Receiver, RecvTimeoutError, Sender };
use std::sync::Arc;
use std::time::Duration;

use crate::command::Command;
use crate::engine::{ Engine, SignalSender };
use crate::listener::{ ListenerRegistry, PlayerListener };
use crate::machine::{ Effect, EngineRequest, Input, StateMachine };
use crate::state::PlaybackState;


/// Cloneable command sender for a [`Player`].
///
/// Commands sent through a handle are queued and run the next time the
/// player drains its inbox. This is how listeners issue commands from
/// inside a callback without reentering the player.
#[derive( Debug, Clone )]
pub struct PlayerHandle {
    tx: Sender<Input>,
}


impl PlayerHandle {
    /// Queues a command. Returns false once the player has been dropped.
    pub fn send( &self, command: Command ) -> bool {
        self.tx.send( Input::Command( command ) ).is_ok()
    }


    pub fn load( &self, source: impl Into<String> ) -> bool {
        self.send( Command::Load { source: source.into() } )
    }


    pub fn play( &self ) -> bool {
        self.send( Command::Play )
    }


    pub fn pause( &self ) -> bool {
        self.send( Command::Pause )
    }


    pub fn stop( &self ) -> bool {
        self.send( Command::Stop )
    }


    pub fn seek( &self, position_ms: u64 ) -> bool {
        self.send( Command::Seek { position_ms } )
    }
}


/// Playback controller for a single stream or clip.
pub struct Player<E: Engine> {
    engine: E,
    machine: StateMachine,
    listeners: ListenerRegistry,
    tx: Sender<Input>,
    rx: Receiver<Input>,
}


impl<E: Engine> Player<E> {
    /// Creates an idle player driving the given engine.
    pub fn new( engine: E ) -> Self {
        let ( tx, rx ) = mpsc::channel();
        Self {
            engine,
            machine: StateMachine::new(),
            listeners: ListenerRegistry::new(),
            tx,
            rx,
        }
    }


    /// Returns a handle for queueing commands.
    pub fn handle( &self ) -> PlayerHandle {
        PlayerHandle { tx: self.tx.clone() }
    }


    /// Loads a stream (URL) or clip (file reference).
    ///
    /// Audio does not play automatically. Any current session is stopped
    /// first. Listeners hear `on_audio_loading`, then buffering updates,
    /// then `on_audio_ready` immediately followed by `on_player_paused`.
    pub fn load( &mut self, source: impl Into<String> ) {
        self.execute( Command::Load { source: source.into() } );
    }


    /// Starts or resumes playback of loaded audio. No effect while
    /// already playing.
    pub fn play( &mut self ) {
        self.execute( Command::Play );
    }


    /// Pauses playing audio. No effect if already paused.
    pub fn pause( &mut self ) {
        self.execute( Command::Pause );
    }


    /// Stops playback and releases the stream or clip.
    pub fn stop( &mut self ) {
        self.execute( Command::Stop );
    }


    /// Moves the playhead while ready, playing or paused.
    ///
    /// A seek issued while another is pending supersedes it.
    pub fn seek( &mut self, position_ms: u64 ) {
        self.execute( Command::Seek { position_ms } );
    }


    /// Queues a command behind anything already waiting, then drains.
    pub fn execute( &mut self, command: Command ) {
        // The receiver lives in self, so this send cannot fail
        let _ = self.tx.send( Input::Command( command ) );
        self.pump();
    }


    /// Applies every queued input. Returns how many were applied.
    pub fn pump( &mut self ) -> usize {
        let mut applied = 0;
        while let Ok( input ) = self.rx.try_recv() {
            self.step( input );
            applied += 1;
        }
        applied
    }


    /// Waits up to `timeout` for an input, then drains the queue.
    pub fn pump_timeout( &mut self, timeout: Duration ) -> usize {
        match self.rx.recv_timeout( timeout ) {
            Ok( input ) => {
                self.step( input );
                1 + self.pump()
            }
            Err( RecvTimeoutError::Timeout ) | Err( RecvTimeoutError::Disconnected ) => 0,
        }
    }


    fn step( &mut self, input: Input ) {
        for effect in self.machine.handle( input ) {
            match effect {
                Effect::Engine( request ) => self.request( request ),
                Effect::Notify( notification ) => self.listeners.notify( &notification ),
            }
        }
    }


    fn request( &mut self, request: EngineRequest ) {
        match request {
            EngineRequest::Load { session, source } => {
                let signals = SignalSender::new( session, self.tx.clone() );
                self.engine.load( &source, signals );
            }
            EngineRequest::Start => self.engine.start(),
            EngineRequest::Pause => {
                self.engine.pause();
                if let Some( position ) = self.engine.position() {
                    self.machine.settle_position( position );
                }
            }
            EngineRequest::Release => self.engine.release(),
            EngineRequest::Seek( target ) => self.engine.seek( target ),
        }
    }


    /// Registers a listener. Registering the same listener twice has no
    /// effect.
    pub fn add_listener( &mut self, listener: Arc<dyn PlayerListener> ) -> bool {
        self.listeners.add( listener )
    }


    pub fn remove_listener( &mut self, listener: &Arc<dyn PlayerListener> ) -> bool {
        self.listeners.remove( listener )
    }


    pub fn state( &self ) -> PlaybackState {
        self.machine.state()
    }


    /// Is the audio loaded to the point that it can be played?
    pub fn is_audio_ready( &self ) -> bool {
        self.state().is_audio_ready()
    }


    /// Length of the loaded audio in milliseconds, once ready.
    pub fn audio_length( &self ) -> Option<u64> {
        self.machine.session().and_then( |s| s.duration_ms() )
    }


    pub fn is_playing( &self ) -> bool {
        self.state().is_playing()
    }


    /// Current playhead position in milliseconds.
    pub fn playback_position( &self ) -> u64 {
        self.machine.session().map( |s| s.position_ms() ).unwrap_or( 0 )
    }


    pub fn is_paused( &self ) -> bool {
        self.state().is_paused()
    }


    /// Stopped means no audio is loaded.
    pub fn is_stopped( &self ) -> bool {
        self.state().is_stopped()
    }


    pub fn is_completed( &self ) -> bool {
        self.state().is_completed()
    }


    /// Last buffering percentage reported for the current session.
    pub fn buffered_percent( &self ) -> Option<u8> {
        self.machine.session().map( |s| s.buffered_percent() )
    }


    /// Target of the seek in flight, if any.
    pub fn pending_seek( &self ) -> Option<u64> {
        self.machine.session().and_then( |s| s.pending_seek() )
    }


    /// Source reference of the current session.
    pub fn source( &self ) -> Option<&str> {
        self.machine.session().map( |s| s.source() )
    }


    pub fn engine( &self ) -> &E {
        &self.engine
    }


    /// Stops any session and drops all listeners.
    pub fn release( mut self ) {
        self.stop();
        self.listeners.clear();
    }
}


impl<E: Engine> Drop for Player<E> {
    fn drop( &mut self ) {
        // Ensure the engine lets go of the source when the player goes away
        if !self.is_stopped() {
            self.stop();
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::error::PlaybackError;
    use crate::listener::Notification;
    use crate::testing::{ EngineCall, EngineProbe, RecordingListener, ScriptedEngine };


    fn setup() -> ( Player<ScriptedEngine>, Arc<EngineProbe>, Arc<RecordingListener> ) {
        let ( engine, probe ) = ScriptedEngine::new();
        let mut player = Player::new( engine );
        let recorder = Arc::new( RecordingListener::default() );
        player.add_listener( recorder.clone() );
        ( player, probe, recorder )
    }


    /// Loads a clip and delivers readiness, discarding the notifications.
    fn ready( duration_ms: u64 ) -> ( Player<ScriptedEngine>, Arc<EngineProbe>, Arc<RecordingListener> ) {
        let ( mut player, probe, recorder ) = setup();
        player.load( "file:///clip.ogg" );
        probe.signals().ready( duration_ms );
        player.pump();
        recorder.take();
        probe.take_calls();
        ( player, probe, recorder )
    }


    #[test]
    fn test_load_buffer_ready_play_complete() {
        let ( mut player, probe, recorder ) = setup();

        player.load( "http://x/a.mp3" );
        let signals = probe.signals();
        signals.buffering( 10 );
        signals.buffering( 45 );
        signals.buffering( 100 );
        signals.ready( 120_000 );
        player.pump();

        assert_eq!( recorder.take(), vec![
            Notification::AudioLoading,
            Notification::BufferingUpdate( 10 ),
            Notification::BufferingUpdate( 45 ),
            Notification::BufferingUpdate( 100 ),
            Notification::AudioReady { length_ms: 120_000 },
            Notification::Paused,
        ] );
        assert!( player.is_audio_ready() );
        assert!( player.is_paused() );
        assert_eq!( player.audio_length(), Some( 120_000 ) );

        player.play();
        assert_eq!( recorder.take(), vec![ Notification::Playing ] );

        signals.end_of_stream();
        player.pump();
        assert_eq!( recorder.take(), vec![ Notification::Completed ] );
        assert!( player.is_completed() );
        assert_eq!(
            probe.take_calls(),
            vec![ EngineCall::Load( "http://x/a.mp3".into() ), EngineCall::Start ]
        );
    }


    #[test]
    fn test_idle_player_ignores_commands() {
        let ( mut player, probe, recorder ) = setup();
        player.play();
        player.pause();
        player.stop();
        player.seek( 1_000 );

        assert!( player.is_stopped() );
        assert!( recorder.take().is_empty() );
        assert!( probe.take_calls().is_empty() );
    }


    #[test]
    fn test_play_twice_from_paused() {
        let ( mut player, probe, recorder ) = ready( 60_000 );
        player.play();
        player.pause();
        recorder.take();
        probe.take_calls();

        player.play();
        player.play();
        assert_eq!( recorder.take(), vec![ Notification::Playing ] );
        assert_eq!( probe.take_calls(), vec![ EngineCall::Start ] );
    }


    #[test]
    fn test_seek_from_playing_restores_playing() {
        let ( mut player, probe, recorder ) = ready( 120_000 );
        player.play();
        recorder.take();

        player.seek( 30_000 );
        assert_eq!( recorder.take(), vec![ Notification::SeekStarted ] );
        assert_eq!( player.pending_seek(), Some( 30_000 ) );

        probe.signals().seek_done( 30_000 );
        player.pump();
        assert_eq!( recorder.take(), vec![ Notification::SeekCompleted { position_ms: 30_000 } ] );
        assert!( player.is_playing() );
        assert_eq!( player.playback_position(), 30_000 );
    }


    #[test]
    fn test_queries_follow_intent_during_seek() {
        let ( mut player, _probe, _recorder ) = ready( 60_000 );
        player.play();
        player.seek( 1_000 );
        assert!( player.is_playing() );
        assert!( !player.is_paused() );

        player.pause();
        assert!( !player.is_playing() );
        assert!( player.is_paused() );
    }


    #[test]
    fn test_seek_failure_stops_session() {
        let ( mut player, probe, recorder ) = ready( 60_000 );
        player.play();
        player.seek( 20_000 );
        recorder.take();

        let signals = probe.signals();
        let error = PlaybackError::Seek( "target unreachable".into() );
        signals.error( error.clone() );
        signals.seek_done( 20_000 );
        player.pump();

        assert_eq!( recorder.take(), vec![ Notification::Error( error ), Notification::Stopped ] );
        assert!( player.is_stopped() );
        assert_eq!( player.pending_seek(), None );
    }


    #[test]
    fn test_scrub_back_after_completion() {
        let ( mut player, probe, recorder ) = ready( 60_000 );
        player.play();
        probe.signals().end_of_stream();
        player.pump();
        recorder.take();
        probe.take_calls();

        player.seek( 0 );
        probe.signals().seek_done( 0 );
        player.pump();
        player.play();

        assert_eq!( recorder.take(), vec![
            Notification::SeekStarted,
            Notification::SeekCompleted { position_ms: 0 },
            Notification::Playing,
        ] );
        assert_eq!(
            probe.take_calls(),
            vec![ EngineCall::Pause, EngineCall::Seek( 0 ), EngineCall::Start ]
        );
        assert!( player.is_playing() );
    }


    #[test]
    fn test_superseded_seek_reports_once() {
        let ( mut player, probe, recorder ) = ready( 120_000 );
        player.play();
        recorder.take();
        probe.take_calls();

        player.seek( 5_000 );
        player.seek( 9_000 );
        assert_eq!( probe.take_calls(), vec![ EngineCall::Seek( 5_000 ), EngineCall::Seek( 9_000 ) ] );

        let signals = probe.signals();
        signals.seek_done( 5_000 );
        signals.seek_done( 9_000 );
        player.pump();

        let completions: Vec<_> = recorder.take().into_iter()
            .filter( |n| matches!( n, Notification::SeekCompleted { .. } ) )
            .collect();
        assert_eq!( completions, vec![ Notification::SeekCompleted { position_ms: 9_000 } ] );
    }


    #[test]
    fn test_stop_mid_load_suppresses_late_signals() {
        let ( mut player, probe, recorder ) = setup();
        player.load( "http://x/slow.mp3" );
        let stale = probe.signals();
        player.stop();
        assert_eq!( recorder.take(), vec![ Notification::AudioLoading, Notification::Stopped ] );

        stale.buffering( 80 );
        stale.ready( 90_000 );
        player.pump();
        assert!( recorder.take().is_empty() );
        assert!( player.is_stopped() );
    }


    #[test]
    fn test_late_signals_ignored_after_reload() {
        let ( mut player, probe, recorder ) = setup();
        player.load( "http://x/first.mp3" );
        let stale = probe.signals();
        player.load( "http://x/second.mp3" );
        recorder.take();

        stale.ready( 1_000 );
        player.pump();
        assert!( recorder.take().is_empty() );
        assert_eq!( player.state(), PlaybackState::Loading );
        assert_eq!( player.source(), Some( "http://x/second.mp3" ) );
    }


    #[test]
    fn test_engine_error_stops_session() {
        let ( mut player, probe, recorder ) = ready( 60_000 );
        player.play();
        recorder.take();

        let error = PlaybackError::Runtime( "output device lost".into() );
        probe.signals().error( error.clone() );
        player.pump();

        assert_eq!( recorder.take(), vec![ Notification::Error( error ), Notification::Stopped ] );
        assert!( player.is_stopped() );
        assert_eq!( player.audio_length(), None );
    }


    #[test]
    fn test_buffering_regressions_delivered_as_received() {
        let ( mut player, probe, recorder ) = setup();
        player.load( "http://x/a.mp3" );
        recorder.take();

        let signals = probe.signals();
        signals.buffering( 60 );
        signals.buffering( 40 );
        signals.buffering( 40 );
        player.pump();

        assert_eq!( recorder.take(), vec![
            Notification::BufferingUpdate( 60 ),
            Notification::BufferingUpdate( 40 ),
            Notification::BufferingUpdate( 40 ),
        ] );
        assert_eq!( player.buffered_percent(), Some( 40 ) );
    }


    #[test]
    fn test_pause_refreshes_position_from_engine() {
        let ( mut player, probe, _recorder ) = ready( 60_000 );
        player.play();
        probe.set_position( Some( 12_345 ) );
        player.pause();
        assert_eq!( player.playback_position(), 12_345 );
    }


    #[test]
    fn test_listener_commands_are_queued() {
        struct PlayWhenReady {
            handle: PlayerHandle,
            recorder: Arc<RecordingListener>,
        }

        impl PlayerListener for PlayWhenReady {
            fn on_audio_ready( &self, length_ms: u64 ) {
                self.recorder.on_audio_ready( length_ms );
                self.handle.play();
            }

            fn on_player_paused( &self ) {
                self.recorder.on_player_paused();
            }

            fn on_player_playing( &self ) {
                self.recorder.on_player_playing();
            }
        }

        let ( engine, probe ) = ScriptedEngine::new();
        let mut player = Player::new( engine );
        let recorder = Arc::new( RecordingListener::default() );
        player.add_listener( Arc::new( PlayWhenReady { handle: player.handle(), recorder: recorder.clone() } ) );

        player.load( "file:///clip.ogg" );
        probe.signals().ready( 5_000 );
        player.pump();

        // The queued play runs only after ready and paused were delivered
        assert_eq!( recorder.take(), vec![
            Notification::AudioReady { length_ms: 5_000 },
            Notification::Paused,
            Notification::Playing,
        ] );
        assert!( player.is_playing() );
    }


    #[test]
    fn test_duplicate_listener_single_delivery() {
        let ( mut player, _probe, recorder ) = setup();
        assert!( !player.add_listener( recorder.clone() ) );

        player.load( "file:///clip.ogg" );
        assert_eq!( recorder.take(), vec![ Notification::AudioLoading ] );
    }


    #[test]
    fn test_removed_listener_stops_hearing() {
        let ( mut player, _probe, recorder ) = setup();
        let listener: Arc<dyn PlayerListener> = recorder.clone();
        assert!( player.remove_listener( &listener ) );

        player.load( "file:///clip.ogg" );
        assert!( recorder.take().is_empty() );
    }


    #[test]
    fn test_drop_releases_engine() {
        let ( player, probe, recorder ) = ready( 60_000 );
        drop( player );
        assert_eq!( probe.take_calls(), vec![ EngineCall::Release ] );
        assert_eq!( recorder.take(), vec![ Notification::Stopped ] );
    }


    #[test]
    fn test_command_apply_routes_to_player() {
        let ( mut player, probe, _recorder ) = ready( 60_000 );
        Command::parse( "play" ).unwrap().apply( &mut player );
        Command::parse( "seek 0:10" ).unwrap().apply( &mut player );
        assert_eq!( probe.take_calls(), vec![ EngineCall::Start, EngineCall::Seek( 10_000 ) ] );
    }
}
