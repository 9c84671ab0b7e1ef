//! Console listeners
//!
//! Print player notifications to stdout and optionally resume playback as
//! soon as a source becomes ready.

use tonearm_core::{ PlaybackError, PlayerHandle, PlayerListener };


/// Formats milliseconds as `M:SS`, or `H:MM:SS` past an hour.
pub fn format_ms( ms: u64 ) -> String {
    let total = ms / 1000;
    let ( hours, minutes, seconds ) = ( total / 3600, ( total / 60 ) % 60, total % 60 );
    if hours > 0 {
        format!( "{}:{:02}:{:02}", hours, minutes, seconds )
    } else {
        format!( "{}:{:02}", minutes, seconds )
    }
}


/// Prints every notification as a status line tagged with the player id.
pub struct ConsoleListener {
    player_id: String,
    print_progress: bool,
}


impl ConsoleListener {
    pub fn new( player_id: impl Into<String>, print_progress: bool ) -> Self {
        Self {
            player_id: player_id.into(),
            print_progress,
        }
    }


    fn say( &self, message: std::fmt::Arguments<'_> ) {
        println!( "[{}] {}", self.player_id, message );
    }
}


impl PlayerListener for ConsoleListener {
    fn on_audio_loading( &self ) {
        self.say( format_args!( "Loading..." ) );
    }


    fn on_buffering_update( &self, percent: u8 ) {
        self.say( format_args!( "Buffering {}%", percent ) );
    }


    fn on_audio_ready( &self, length_ms: u64 ) {
        self.say( format_args!( "Ready ({})", format_ms( length_ms ) ) );
    }


    fn on_player_playing( &self ) {
        self.say( format_args!( "Playing" ) );
    }


    fn on_player_playback_update( &self, position_ms: u64, length_ms: u64 ) {
        if self.print_progress {
            self.say( format_args!( "  {} / {}", format_ms( position_ms ), format_ms( length_ms ) ) );
        }
    }


    fn on_player_paused( &self ) {
        self.say( format_args!( "Paused" ) );
    }


    fn on_player_stopped( &self ) {
        self.say( format_args!( "Stopped" ) );
    }


    fn on_player_completed( &self ) {
        self.say( format_args!( "Completed" ) );
    }


    fn on_seek_started( &self ) {
        self.say( format_args!( "Seeking..." ) );
    }


    fn on_seek_completed( &self, position_ms: u64 ) {
        self.say( format_args!( "Seeked to {}", format_ms( position_ms ) ) );
    }


    fn on_player_error( &self, error: &PlaybackError ) {
        self.say( format_args!( "Error: {}", error ) );
    }
}


/// Starts playback whenever a source becomes ready.
pub struct AutoPlay {
    handle: PlayerHandle,
}


impl AutoPlay {
    pub fn new( handle: PlayerHandle ) -> Self {
        Self { handle }
    }
}


impl PlayerListener for AutoPlay {
    fn on_audio_ready( &self, _length_ms: u64 ) {
        if !self.handle.play() {
            tracing::warn!( "Autoplay skipped: player is gone" );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tonearm_core::{ Engine, Player, PlaybackState, SignalSender };


    #[test]
    fn test_format_ms() {
        assert_eq!( format_ms( 0 ), "0:00" );
        assert_eq!( format_ms( 61_999 ), "1:01" );
        assert_eq!( format_ms( 3_725_000 ), "1:02:05" );
    }


    /// Engine that reports readiness as soon as it is asked to load.
    struct InstantEngine;


    impl Engine for InstantEngine {
        fn load( &mut self, _source: &str, signals: SignalSender ) {
            signals.ready( 10_000 );
        }

        fn start( &mut self ) {}

        fn pause( &mut self ) {}

        fn release( &mut self ) {}

        fn seek( &mut self, _target_ms: u64 ) {}

        fn position( &self ) -> Option<u64> {
            None
        }
    }


    #[test]
    fn test_autoplay_starts_after_ready() {
        let mut player = Player::new( InstantEngine );
        player.add_listener( Arc::new( AutoPlay::new( player.handle() ) ) );

        player.load( "http://example.test/a.mp3" );
        assert_eq!( player.state(), PlaybackState::Playing );
    }
}
