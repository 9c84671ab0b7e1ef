//! Silent clock engine
//!
//! Implements the engine capability surface without producing sound:
//! local clips are probed for their length, network streams simulate
//! buffering progress, and a wall-clock playhead drives position ticks
//! and end of stream. All timers run as tokio tasks that report back
//! through the session's signal sender.

use std::path::PathBuf;
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::{ Duration, Instant };

use tokio::runtime::Handle;
use tokio::sync::mpsc::{ self, UnboundedReceiver, UnboundedSender };
use tokio::task::JoinHandle;

use tonearm_core::{ Engine, PlaybackError, SignalSender };

use crate::probe;


/// Timing parameters for the clock engine.
#[derive( Debug, Clone, Copy, PartialEq )]
pub struct ClockSettings {
    pub position_interval: Duration,
    pub buffer_step_percent: u8,
    pub buffer_step: Duration,
    pub stream_duration_ms: u64,
    pub seek_latency: Duration,
}


/// How a source reference is resolved.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Source {
    Stream( String ),
    File( PathBuf ),
    Unsupported( String ),
}


impl Source {
    /// Classifies a source reference by its scheme.
    pub fn resolve( reference: &str ) -> Self {
        let reference = reference.trim();
        if reference.starts_with( "http://" ) || reference.starts_with( "https://" ) {
            Source::Stream( reference.to_string() )
        } else if let Some( path ) = reference.strip_prefix( "file://" ) {
            Source::File( PathBuf::from( path ) )
        } else if reference.contains( "://" ) {
            Source::Unsupported( reference.to_string() )
        } else {
            Source::File( PathBuf::from( reference ) )
        }
    }
}


/// Wall-clock playhead.
#[derive( Debug, Default )]
struct Clock {
    base_ms: u64,
    running_since: Option<Instant>,
    duration_ms: Option<u64>,
    /// End of stream already reported for the current position
    ended: bool,
    /// Seeks requested but not yet applied
    seeks_pending: u32,
}


/// What the ticker reports on one interval.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum Tick {
    Position( u64 ),
    End,
}


impl Clock {
    fn position( &self ) -> u64 {
        let elapsed = self.running_since
            .map( |since| since.elapsed().as_millis() as u64 )
            .unwrap_or( 0 );
        let position = self.base_ms + elapsed;
        match self.duration_ms {
            Some( duration ) => position.min( duration ),
            None => position,
        }
    }


    fn at_end( &self ) -> bool {
        self.duration_ms.is_some_and( |d| self.position() >= d )
    }


    fn resume( &mut self ) {
        if self.running_since.is_none() {
            self.running_since = Some( Instant::now() );
        }
    }


    fn pause( &mut self ) {
        self.base_ms = self.position();
        self.running_since = None;
    }


    /// The report due on this interval, if any.
    ///
    /// Stays quiet while a seek is pending so end of stream always
    /// describes the playhead after the latest seek.
    fn tick( &mut self ) -> Option<Tick> {
        if self.seeks_pending > 0 {
            None
        } else if !self.at_end() {
            Some( Tick::Position( self.position() ) )
        } else if !self.ended {
            self.ended = true;
            Some( Tick::End )
        } else {
            None
        }
    }


    fn set( &mut self, position_ms: u64 ) {
        let running = self.running_since.is_some();
        self.base_ms = match self.duration_ms {
            Some( duration ) => position_ms.min( duration ),
            None => position_ms,
        };
        self.running_since = running.then( Instant::now );
        self.ended = false;
    }
}


type SharedClock = Arc<Mutex<Clock>>;


fn lock( clock: &SharedClock ) -> MutexGuard<'_, Clock> {
    clock.lock().unwrap_or_else( |poisoned| poisoned.into_inner() )
}


/// Tasks and state of the loaded source.
struct Track {
    signals: SignalSender,
    clock: SharedClock,
    seeks: UnboundedSender<u64>,
    loader: JoinHandle<()>,
    seeker: JoinHandle<()>,
    ticker: Option<JoinHandle<()>>,
}


impl Drop for Track {
    fn drop( &mut self ) {
        self.loader.abort();
        self.seeker.abort();
        if let Some( ticker ) = self.ticker.take() {
            ticker.abort();
        }
    }
}


/// Engine that keeps time without rendering audio.
pub struct ClockEngine {
    settings: ClockSettings,
    runtime: Handle,
    track: Option<Track>,
}


impl ClockEngine {
    /// Creates an engine that spawns its timers on `runtime`.
    pub fn new( settings: ClockSettings, runtime: Handle ) -> Self {
        Self {
            settings,
            runtime,
            track: None,
        }
    }
}


impl Engine for ClockEngine {
    fn load( &mut self, source: &str, signals: SignalSender ) {
        self.release();

        let clock = SharedClock::default();
        let ( seeks, seek_rx ) = mpsc::unbounded_channel();

        let loader = self.runtime.spawn( load_source(
            Source::resolve( source ),
            self.settings,
            signals.clone(),
            clock.clone(),
        ));
        let seeker = self.runtime.spawn( run_seeker(
            seek_rx,
            self.settings.seek_latency,
            signals.clone(),
            clock.clone(),
        ));

        tracing::debug!( "Clock engine loading {} for session {}", source, signals.session() );
        self.track = Some( Track {
            signals,
            clock,
            seeks,
            loader,
            seeker,
            ticker: None,
        });
    }


    fn start( &mut self ) {
        let Some( track ) = self.track.as_mut() else {
            return;
        };

        lock( &track.clock ).resume();
        if track.ticker.is_none() {
            track.ticker = Some( self.runtime.spawn( run_ticker(
                self.settings.position_interval,
                track.signals.clone(),
                track.clock.clone(),
            )));
        }
    }


    fn pause( &mut self ) {
        let Some( track ) = self.track.as_mut() else {
            return;
        };

        lock( &track.clock ).pause();
        if let Some( ticker ) = track.ticker.take() {
            ticker.abort();
        }
    }


    fn release( &mut self ) {
        if let Some( track ) = self.track.take() {
            tracing::debug!( "Clock engine released session {}", track.signals.session() );
        }
    }


    fn seek( &mut self, target_ms: u64 ) {
        if let Some( track ) = self.track.as_ref() {
            let mut clock = lock( &track.clock );
            if track.seeks.send( target_ms ).is_ok() {
                clock.seeks_pending += 1;
            } else {
                track.signals.error( PlaybackError::Seek( "seek worker stopped".into() ) );
            }
        }
    }


    fn position( &self ) -> Option<u64> {
        self.track.as_ref().map( |t| lock( &t.clock ).position() )
    }
}


/// Resolves a source to its length, reporting buffering on the way.
async fn load_source( source: Source, settings: ClockSettings, signals: SignalSender, clock: SharedClock ) {
    let duration_ms = match source {
        Source::Stream( url ) => {
            tracing::debug!( "Simulating buffering for {}", url );
            let mut buffered: u8 = 0;
            while buffered < 100 {
                tokio::time::sleep( settings.buffer_step ).await;
                buffered = buffered.saturating_add( settings.buffer_step_percent ).min( 100 );
                signals.buffering( buffered );
            }
            settings.stream_duration_ms
        }
        Source::File( path ) => {
            match tokio::task::spawn_blocking( move || probe::probe( &path ) ).await {
                Ok( Ok( info ) ) => {
                    signals.buffering( 100 );
                    info.duration_ms
                }
                Ok( Err( e ) ) => {
                    signals.error( PlaybackError::Load( e.to_string() ) );
                    return;
                }
                Err( e ) => {
                    signals.error( PlaybackError::Runtime( format!( "probe task failed: {}", e ) ) );
                    return;
                }
            }
        }
        Source::Unsupported( reference ) => {
            signals.error( PlaybackError::Load( format!( "Unsupported source: {}", reference ) ) );
            return;
        }
    };

    lock( &clock ).duration_ms = Some( duration_ms );
    signals.ready( duration_ms );
}


/// Reports the playhead every interval and end of stream once reached.
async fn run_ticker( interval: Duration, signals: SignalSender, clock: SharedClock ) {
    let mut ticks = tokio::time::interval( interval );
    // The first tick completes immediately
    ticks.tick().await;

    loop {
        ticks.tick().await;

        let tick = lock( &clock ).tick();
        let delivered = match tick {
            Some( Tick::Position( position ) ) => signals.position( position ),
            Some( Tick::End ) => signals.end_of_stream(),
            None => true,
        };

        if !delivered {
            break;
        }
    }
}


/// Resolves seeks one at a time, in request order.
async fn run_seeker(
    mut seeks: UnboundedReceiver<u64>,
    latency: Duration,
    signals: SignalSender,
    clock: SharedClock,
) {
    while let Some( target ) = seeks.recv().await {
        tokio::time::sleep( latency ).await;

        // Report under the lock so no tick slips in ahead of the completion
        {
            let mut clock = lock( &clock );
            clock.set( target );
            clock.seeks_pending = clock.seeks_pending.saturating_sub( 1 );
            signals.seek_done( clock.position() );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use tonearm_core::{ Notification, Player, PlayerListener };

    use crate::probe::tests::write_wav;


    #[derive( Default )]
    struct Recorder {
        seen: Mutex<Vec<Notification>>,
    }


    impl Recorder {
        fn push( &self, notification: Notification ) {
            self.seen.lock().unwrap().push( notification );
        }

        fn seen( &self ) -> Vec<Notification> {
            self.seen.lock().unwrap().clone()
        }
    }


    impl PlayerListener for Recorder {
        fn on_buffering_update( &self, percent: u8 ) {
            self.push( Notification::BufferingUpdate( percent ) );
        }

        fn on_audio_ready( &self, length_ms: u64 ) {
            self.push( Notification::AudioReady { length_ms } );
        }

        fn on_player_completed( &self ) {
            self.push( Notification::Completed );
        }

        fn on_seek_completed( &self, position_ms: u64 ) {
            self.push( Notification::SeekCompleted { position_ms } );
        }

        fn on_player_stopped( &self ) {
            self.push( Notification::Stopped );
        }

        fn on_player_error( &self, error: &PlaybackError ) {
            self.push( Notification::Error( error.clone() ) );
        }
    }


    fn fast_settings() -> ClockSettings {
        ClockSettings {
            position_interval: Duration::from_millis( 5 ),
            buffer_step_percent: 50,
            buffer_step: Duration::from_millis( 2 ),
            stream_duration_ms: 40,
            seek_latency: Duration::from_millis( 2 ),
        }
    }


    fn player() -> ( Player<ClockEngine>, Arc<Recorder> ) {
        let mut player = Player::new( ClockEngine::new( fast_settings(), Handle::current() ) );
        let recorder = Arc::new( Recorder::default() );
        player.add_listener( recorder.clone() );
        ( player, recorder )
    }


    /// Pumps the player until `done` holds or two seconds pass.
    async fn pump_until( player: &mut Player<ClockEngine>, done: impl Fn( &Player<ClockEngine> ) -> bool ) -> bool {
        let deadline = Instant::now() + Duration::from_secs( 2 );
        while Instant::now() < deadline {
            player.pump();
            if done( player ) {
                return true;
            }
            tokio::time::sleep( Duration::from_millis( 2 ) ).await;
        }
        false
    }


    #[test]
    fn test_resolve_sources() {
        assert_eq!( Source::resolve( "http://x/a.mp3" ), Source::Stream( "http://x/a.mp3".into() ) );
        assert_eq!( Source::resolve( "file:///music/a.ogg" ), Source::File( PathBuf::from( "/music/a.ogg" ) ) );
        assert_eq!( Source::resolve( "clips/a.wav" ), Source::File( PathBuf::from( "clips/a.wav" ) ) );
        assert_eq!( Source::resolve( "ftp://x/a.mp3" ), Source::Unsupported( "ftp://x/a.mp3".into() ) );
    }


    #[test]
    fn test_clock_pause_and_set() {
        let mut clock = Clock { duration_ms: Some( 1_000 ), ..Clock::default() };
        clock.set( 400 );
        assert_eq!( clock.position(), 400 );
        clock.pause();
        assert_eq!( clock.position(), 400 );
        clock.set( 5_000 );
        assert_eq!( clock.position(), 1_000 );
        assert!( clock.at_end() );
    }


    #[test]
    fn test_clock_quiet_while_seek_pending() {
        let mut clock = Clock { duration_ms: Some( 1_000 ), ..Clock::default() };
        clock.set( 1_000 );
        clock.seeks_pending = 1;
        assert_eq!( clock.tick(), None );
        assert!( !clock.ended );

        clock.set( 200 );
        clock.seeks_pending = 0;
        assert_eq!( clock.tick(), Some( Tick::Position( 200 ) ) );

        clock.set( 1_000 );
        assert_eq!( clock.tick(), Some( Tick::End ) );
        assert_eq!( clock.tick(), None );
    }


    #[tokio::test]
    async fn test_stream_buffers_then_ready() {
        let ( mut player, recorder ) = player();
        player.load( "http://example.test/live.mp3" );

        assert!( pump_until( &mut player, |p| p.is_audio_ready() ).await );
        assert_eq!( recorder.seen(), vec![
            Notification::BufferingUpdate( 50 ),
            Notification::BufferingUpdate( 100 ),
            Notification::AudioReady { length_ms: 40 },
        ] );
    }


    #[tokio::test]
    async fn test_stream_plays_to_completion() {
        let ( mut player, recorder ) = player();
        player.load( "https://example.test/short.mp3" );
        assert!( pump_until( &mut player, |p| p.is_audio_ready() ).await );

        player.play();
        assert!( pump_until( &mut player, |p| p.is_completed() ).await );
        assert_eq!( recorder.seen().last(), Some( &Notification::Completed ) );
        assert_eq!( player.playback_position(), 40 );
    }


    #[tokio::test]
    async fn test_seek_resolves_through_engine() {
        let ( mut player, recorder ) = player();
        player.load( "http://example.test/a.mp3" );
        assert!( pump_until( &mut player, |p| p.is_audio_ready() ).await );

        player.seek( 25 );
        assert!( pump_until( &mut player, |p| p.pending_seek().is_none() ).await );
        assert!( recorder.seen().contains( &Notification::SeekCompleted { position_ms: 25 } ) );
        assert!( player.is_paused() );
    }


    #[tokio::test]
    async fn test_local_clip_uses_probed_length() {
        let path = write_wav( "engine-clip", 8000, 250 );
        let ( mut player, recorder ) = player();
        player.load( format!( "file://{}", path.display() ) );

        assert!( pump_until( &mut player, |p| p.is_audio_ready() ).await );
        assert_eq!( player.audio_length(), Some( 250 ) );
        assert!( recorder.seen().contains( &Notification::AudioReady { length_ms: 250 } ) );
        let _ = std::fs::remove_file( path );
    }


    #[tokio::test]
    async fn test_unreadable_clip_stops_player() {
        let ( mut player, recorder ) = player();
        player.load( "/nonexistent/tonearm/missing.flac" );

        assert!( pump_until( &mut player, |p| p.is_stopped() ).await );
        let seen = recorder.seen();
        assert!( matches!( seen.first(), Some( Notification::Error( PlaybackError::Load( _ ) ) ) ) );
        assert_eq!( seen.last(), Some( &Notification::Stopped ) );
    }
}
