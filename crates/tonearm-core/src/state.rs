//! Observable playback states.


/// State a seek overlay returns to once the engine resolves the seek.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum SeekOrigin {
    /// Ready but never started.
    Ready,
    Playing,
    Paused,
}


impl SeekOrigin {
    /// The state restored when the seek completes.
    pub fn resume_state( self ) -> PlaybackState {
        match self {
            SeekOrigin::Ready => PlaybackState::Ready,
            SeekOrigin::Playing => PlaybackState::Playing,
            SeekOrigin::Paused => PlaybackState::Paused,
        }
    }


    /// Whether playback intent is "playing".
    pub fn is_playing( self ) -> bool {
        self == SeekOrigin::Playing
    }
}


/// Current playback state.
///
/// `Idle` means no session exists. Every other state belongs to the
/// current session.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlaybackState {
    /// No session loaded.
    #[default]
    Idle,

    /// Source handed to the engine, waiting for readiness.
    Loading,

    /// Readiness reached; playback has not started yet.
    Ready,

    Playing,

    Paused,

    /// The engine reached end of stream.
    Completed,

    /// Seek in flight. Returns to `origin` on completion.
    Seeking { origin: SeekOrigin },
}


impl PlaybackState {
    /// Enough of the source is buffered to accept playback control.
    pub fn is_audio_ready( self ) -> bool {
        matches!(
            self,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Completed
                | PlaybackState::Seeking { .. }
        )
    }


    /// A seek overlay reports the intent it will return to.
    pub fn is_playing( self ) -> bool {
        match self {
            PlaybackState::Playing => true,
            PlaybackState::Seeking { origin } => origin.is_playing(),
            _ => false,
        }
    }


    /// Ready and Paused both present as paused to callers, as does a seek
    /// that returns to either of them.
    pub fn is_paused( self ) -> bool {
        match self {
            PlaybackState::Ready | PlaybackState::Paused => true,
            PlaybackState::Seeking { origin } => !origin.is_playing(),
            _ => false,
        }
    }


    /// Stopped means no audio is loaded.
    pub fn is_stopped( self ) -> bool {
        self == PlaybackState::Idle
    }


    pub fn is_completed( self ) -> bool {
        self == PlaybackState::Completed
    }


    /// The origin a seek issued from this state would return to.
    ///
    /// A completed stream is scrubbed back into the paused state. Returns
    /// None when seeking is not allowed.
    pub fn seek_origin( self ) -> Option<SeekOrigin> {
        match self {
            PlaybackState::Ready => Some( SeekOrigin::Ready ),
            PlaybackState::Playing => Some( SeekOrigin::Playing ),
            PlaybackState::Paused | PlaybackState::Completed => Some( SeekOrigin::Paused ),
            PlaybackState::Seeking { origin } => Some( origin ),
            _ => None,
        }
    }


    /// Short label for logs and console output.
    pub fn label( self ) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Completed => "completed",
            PlaybackState::Seeking { .. } => "seeking",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_ready_counts_as_paused() {
        assert!( PlaybackState::Ready.is_paused() );
        assert!( PlaybackState::Ready.is_audio_ready() );
        assert!( !PlaybackState::Ready.is_playing() );
    }


    #[test]
    fn test_seek_origin_preserved_through_overlay() {
        let seeking = PlaybackState::Seeking { origin: SeekOrigin::Playing };
        assert_eq!( seeking.seek_origin(), Some( SeekOrigin::Playing ) );
        assert_eq!( SeekOrigin::Playing.resume_state(), PlaybackState::Playing );
    }


    #[test]
    fn test_no_seek_before_ready() {
        assert_eq!( PlaybackState::Idle.seek_origin(), None );
        assert_eq!( PlaybackState::Loading.seek_origin(), None );
    }


    #[test]
    fn test_completed_seeks_back_to_paused() {
        assert_eq!( PlaybackState::Completed.seek_origin(), Some( SeekOrigin::Paused ) );
    }


    #[test]
    fn test_seek_overlay_reports_origin_intent() {
        let playing = PlaybackState::Seeking { origin: SeekOrigin::Playing };
        assert!( playing.is_playing() );
        assert!( !playing.is_paused() );

        for origin in [ SeekOrigin::Ready, SeekOrigin::Paused ] {
            let paused = PlaybackState::Seeking { origin };
            assert!( paused.is_paused() );
            assert!( !paused.is_playing() );
        }
    }
}
