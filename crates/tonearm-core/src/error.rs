//! Playback failure taxonomy.
//!
//! Engines report failures through [`Signal::Error`](crate::engine::Signal::Error).
//! The player never retries: every failure ends the session.

use thiserror::Error;


/// Failures reported by a playback engine.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum PlaybackError {
    /// The source could not be resolved or decoded.
    #[error( "Failed to load source: {0}" )]
    Load( String ),

    /// The seek target was unreachable.
    #[error( "Seek failed: {0}" )]
    Seek( String ),

    /// Unexpected engine fault during playback.
    #[error( "Playback fault: {0}" )]
    Runtime( String ),
}


impl PlaybackError {
    /// Short, stable name for logs and console output.
    pub fn kind( &self ) -> &'static str {
        match self {
            PlaybackError::Load( _ ) => "load",
            PlaybackError::Seek( _ ) => "seek",
            PlaybackError::Runtime( _ ) => "runtime",
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_display_includes_detail() {
        let err = PlaybackError::Load( "404 Not Found".into() );
        assert_eq!( err.to_string(), "Failed to load source: 404 Not Found" );
        assert_eq!( err.kind(), "load" );
    }
}
