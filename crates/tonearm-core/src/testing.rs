//! Test doubles: a listener that records notifications and an engine
//! that records requests and hands its signal sender to the test.

use std::sync::{ Arc, Mutex };

use crate::engine::{ Engine, SignalSender };
use crate::error::PlaybackError;
use crate::listener::{ Notification, PlayerListener };


/// Records every notification it receives.
#[derive( Default )]
pub struct RecordingListener {
    seen: Mutex<Vec<Notification>>,
}


impl RecordingListener {
    fn push( &self, notification: Notification ) {
        self.seen.lock().unwrap().push( notification );
    }


    /// Returns and clears everything recorded so far.
    pub fn take( &self ) -> Vec<Notification> {
        std::mem::take( &mut *self.seen.lock().unwrap() )
    }
}


impl PlayerListener for RecordingListener {
    fn on_audio_loading( &self ) {
        self.push( Notification::AudioLoading );
    }

    fn on_buffering_update( &self, percent: u8 ) {
        self.push( Notification::BufferingUpdate( percent ) );
    }

    fn on_audio_ready( &self, length_ms: u64 ) {
        self.push( Notification::AudioReady { length_ms } );
    }

    fn on_player_playing( &self ) {
        self.push( Notification::Playing );
    }

    fn on_player_playback_update( &self, position_ms: u64, length_ms: u64 ) {
        self.push( Notification::PlaybackUpdate { position_ms, length_ms } );
    }

    fn on_player_paused( &self ) {
        self.push( Notification::Paused );
    }

    fn on_player_stopped( &self ) {
        self.push( Notification::Stopped );
    }

    fn on_player_completed( &self ) {
        self.push( Notification::Completed );
    }

    fn on_seek_started( &self ) {
        self.push( Notification::SeekStarted );
    }

    fn on_seek_completed( &self, position_ms: u64 ) {
        self.push( Notification::SeekCompleted { position_ms } );
    }

    fn on_player_error( &self, error: &PlaybackError ) {
        self.push( Notification::Error( error.clone() ) );
    }
}


/// A request received by the scripted engine.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum EngineCall {
    Load( String ),
    Start,
    Pause,
    Release,
    Seek( u64 ),
}


/// Shared view into a [`ScriptedEngine`].
#[derive( Default )]
pub struct EngineProbe {
    calls: Mutex<Vec<EngineCall>>,
    signals: Mutex<Vec<SignalSender>>,
    position: Mutex<Option<u64>>,
}


impl EngineProbe {
    /// Returns and clears the recorded requests.
    pub fn take_calls( &self ) -> Vec<EngineCall> {
        std::mem::take( &mut *self.calls.lock().unwrap() )
    }


    /// Sender handed over by the most recent load.
    pub fn signals( &self ) -> SignalSender {
        self.signals.lock().unwrap().last().cloned().expect( "engine was never loaded" )
    }


    pub fn set_position( &self, position_ms: Option<u64> ) {
        *self.position.lock().unwrap() = position_ms;
    }
}


/// Engine that does nothing on its own; tests drive its signals.
pub struct ScriptedEngine {
    probe: Arc<EngineProbe>,
}


impl ScriptedEngine {
    pub fn new() -> ( Self, Arc<EngineProbe> ) {
        let probe = Arc::new( EngineProbe::default() );
        ( Self { probe: probe.clone() }, probe )
    }


    fn record( &self, call: EngineCall ) {
        self.probe.calls.lock().unwrap().push( call );
    }
}


impl Engine for ScriptedEngine {
    fn load( &mut self, source: &str, signals: SignalSender ) {
        self.record( EngineCall::Load( source.to_string() ) );
        self.probe.signals.lock().unwrap().push( signals );
    }

    fn start( &mut self ) {
        self.record( EngineCall::Start );
    }

    fn pause( &mut self ) {
        self.record( EngineCall::Pause );
    }

    fn release( &mut self ) {
        self.record( EngineCall::Release );
    }

    fn seek( &mut self, target_ms: u64 ) {
        self.record( EngineCall::Seek( target_ms ) );
    }

    fn position( &self ) -> Option<u64> {
        *self.probe.position.lock().unwrap()
    }
}
