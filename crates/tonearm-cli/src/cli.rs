//! Command-line argument parsing for Tonearm.

use std::path::PathBuf;

use clap::Parser;


/// Tonearm - Console controller for a single stream or clip.
#[derive( Parser, Debug )]
#[command( name = "tonearm" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// URL or file to load on startup.
    pub source: Option<String>,

    /// Start playing as soon as the source is ready.
    #[arg( short, long )]
    pub autoplay: bool,

    /// Exit once playback completes or stops.
    #[arg( long )]
    pub once: bool,

    /// Read settings from this file instead of the default location.
    #[arg( short, long, value_name = "PATH" )]
    pub settings: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit.
    #[arg( long )]
    pub init_settings: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg( short, long, action = clap::ArgAction::Count )]
    pub verbose: u8,
}


impl Args {
    /// Log level implied by the verbosity flags, if any were given.
    pub fn log_level( &self ) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some( "info" ),
            2 => Some( "debug" ),
            _ => Some( "trace" ),
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_source_and_flags() {
        let args = Args::parse_from( [ "tonearm", "--autoplay", "-vv", "http://x/a.mp3" ] );
        assert_eq!( args.source.as_deref(), Some( "http://x/a.mp3" ) );
        assert!( args.autoplay );
        assert_eq!( args.log_level(), Some( "debug" ) );
    }


    #[test]
    fn test_defaults() {
        let args = Args::parse_from( [ "tonearm" ] );
        assert!( args.source.is_none() );
        assert!( !args.once );
        assert_eq!( args.log_level(), None );
    }
}
