//! Application settings management
//!
//! Persistent parameters for the clock engine and console output.

use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };

use crate::engine::ClockSettings;


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Interval between playhead position reports while playing
    pub position_interval_ms: u64,

    /// Buffering progress reported per step when loading a stream
    pub buffer_step_percent: u8,

    /// Delay between buffering steps
    pub buffer_step_ms: u64,

    /// Length assumed for network streams
    pub stream_duration_ms: u64,

    /// Time the engine takes to resolve a seek
    pub seek_latency_ms: u64,

    /// Print playhead updates to the console
    pub print_progress: bool,

    /// Log level used when no -v flag is given
    pub log_level: String,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            position_interval_ms: 500,
            buffer_step_percent: 25,
            buffer_step_ms: 200,
            stream_duration_ms: 180_000,
            seek_latency_ms: 50,
            print_progress: true,
            log_level: "warn".into(),
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "tonearm" ).join( "settings.json" ) )
    }


    /// Loads settings from the default location, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from a specific file, or returns defaults if it
    /// is missing or unreadable.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => {
                serde_json::from_str( &contents ).unwrap_or_else( |e| {
                    tracing::warn!( "Invalid settings in {:?}: {}", path, e );
                    Self::default()
                })
            }
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to a file, creating its directory if needed.
    pub fn save_to( &self, path: &Path ) -> std::io::Result<()> {
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all( parent )?;
            }
        }

        let json = serde_json::to_string_pretty( self )?;
        fs::write( path, json )
    }


    /// Timing parameters for the clock engine.
    pub fn clock( &self ) -> ClockSettings {
        ClockSettings {
            position_interval: Duration::from_millis( self.position_interval_ms.max( 1 ) ),
            buffer_step_percent: self.buffer_step_percent.clamp( 1, 100 ),
            buffer_step: Duration::from_millis( self.buffer_step_ms ),
            stream_duration_ms: self.stream_duration_ms,
            seek_latency: Duration::from_millis( self.seek_latency_ms ),
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn temp_path( name: &str ) -> PathBuf {
        std::env::temp_dir()
            .join( format!( "tonearm-settings-{}", std::process::id() ) )
            .join( name )
    }


    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = serde_json::from_str( r#"{ "position_interval_ms": 250 }"# ).unwrap();
        assert_eq!( settings.position_interval_ms, 250 );
        assert_eq!( settings.stream_duration_ms, 180_000 );
        assert_eq!( settings.log_level, "warn" );
    }


    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = Settings::load_from( &temp_path( "absent.json" ) );
        assert_eq!( settings, Settings::default() );
    }


    #[test]
    fn test_save_then_load() {
        let path = temp_path( "saved.json" );
        let settings = Settings {
            seek_latency_ms: 5,
            print_progress: false,
            ..Settings::default()
        };
        settings.save_to( &path ).unwrap();
        assert_eq!( Settings::load_from( &path ), settings );
        let _ = fs::remove_file( path );
    }


    #[test]
    fn test_invalid_file_yields_defaults() {
        let path = temp_path( "broken.json" );
        fs::create_dir_all( path.parent().unwrap() ).unwrap();
        fs::write( &path, "{ not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
        let _ = fs::remove_file( path );
    }


    #[test]
    fn test_clock_settings_are_sanitized() {
        let settings = Settings {
            position_interval_ms: 0,
            buffer_step_percent: 0,
            ..Settings::default()
        };
        let clock = settings.clock();
        assert_eq!( clock.position_interval, Duration::from_millis( 1 ) );
        assert_eq!( clock.buffer_step_percent, 1 );
    }
}
