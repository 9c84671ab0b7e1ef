//! Playback command parsing and routing.
//!
//! Commands reach the player from two surfaces: typed console input
//! (`seek 1:30`) and method-channel routes of the form
//! `audioplayer/<playerId>/<command>` carrying named arguments.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use crate::engine::Engine;
use crate::player::Player;


/// Prefix of every method-channel route.
pub const ROUTE_PREFIX: &str = "audioplayer";

/// Argument carrying the source reference for `load`.
pub const ARG_AUDIO_URL: &str = "audioUrl";

/// Argument carrying the target (milliseconds) for `seek`.
pub const ARG_SEEK_POSITION: &str = "seekPosition";


/// Errors that can occur during command parsing.
#[derive( Debug, Error, PartialEq, Eq )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),

    #[error( "Invalid audio player route: {0}" )]
    InvalidRoute( String ),
}


/// A playback command.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Command {
    Load { source: String },
    Play,
    Pause,
    Stop,
    Seek { position_ms: u64 },
}


impl Command {
    /// Parses a console command string.
    ///
    /// @param input - The command string to parse, e.g. `load http://x/a.mp3`
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let input = input.strip_prefix( '/' ).unwrap_or( input );
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            "load" | "l" | "open" => {
                let source = args
                    .ok_or_else( || CommandError::MissingArgument( "source".into() ) )?;
                Ok( Command::Load { source: source.to_string() } )
            }
            "play" | "p" => Ok( Command::Play ),
            "pause" | "pa" => Ok( Command::Pause ),
            "stop" | "st" => Ok( Command::Stop ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position_ms = parse_time( time_str )?;
                Ok( Command::Seek { position_ms } )
            }

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Load { .. } => "Load a stream or clip",
            Command::Play => "Start or resume playback",
            Command::Pause => "Pause playback",
            Command::Stop => "Stop and unload",
            Command::Seek { .. } => "Seek to position",
        }
    }


    /// Executes the command against a player.
    pub fn apply<E: Engine>( self, player: &mut Player<E> ) {
        match self {
            Command::Load { source } => player.load( source ),
            Command::Play => player.play(),
            Command::Pause => player.pause(),
            Command::Stop => player.stop(),
            Command::Seek { position_ms } => player.seek( position_ms ),
        }
    }
}


impl FromStr for Command {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        Command::parse( s )
    }
}


/// A parsed method-channel route.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct MethodCall {
    pub player_id: String,
    pub method: String,
}


impl MethodCall {
    /// Parses a route like `audioplayer/0/seek`.
    pub fn parse( route: &str ) -> Result<Self, CommandError> {
        let invalid = || CommandError::InvalidRoute( route.to_string() );

        let mut segments = route.split( '/' );
        let prefix = segments.next().ok_or_else( invalid )?;
        let player_id = segments.next().filter( |s| !s.is_empty() ).ok_or_else( invalid )?;
        let method = segments.next().filter( |s| !s.is_empty() ).ok_or_else( invalid )?;

        if prefix != ROUTE_PREFIX || segments.next().is_some() {
            return Err( invalid() );
        }

        Ok( Self {
            player_id: player_id.to_string(),
            method: method.to_string(),
        })
    }


    /// Resolves the route into a command using its named arguments.
    pub fn to_command( &self, args: &HashMap<String, String> ) -> Result<Command, CommandError> {
        match self.method.as_str() {
            "load" => {
                let source = args.get( ARG_AUDIO_URL )
                    .ok_or_else( || CommandError::MissingArgument( ARG_AUDIO_URL.into() ) )?;
                Ok( Command::Load { source: source.clone() } )
            }
            "play" => Ok( Command::Play ),
            "pause" => Ok( Command::Pause ),
            "stop" => Ok( Command::Stop ),
            "seek" => {
                let raw = args.get( ARG_SEEK_POSITION )
                    .ok_or_else( || CommandError::MissingArgument( ARG_SEEK_POSITION.into() ) )?;
                let position_ms = raw.trim().parse()
                    .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seek position: {}", raw ) ) )?;
                Ok( Command::Seek { position_ms } )
            }
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


/// Parses a time string into milliseconds.
///
/// @param s - `"MM:SS"`, `"M:SS"`, plain seconds, or milliseconds with an `ms` suffix
///
/// @returns Milliseconds or error
fn parse_time( s: &str ) -> Result<u64, CommandError> {
    let s = s.trim();

    if let Some( ms ) = s.strip_suffix( "ms" ) {
        return ms.trim().parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid milliseconds: {}", ms ) ) );
    }

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        minutes.checked_mul( 60 )
            .and_then( |m| m.checked_add( seconds ) )
            .and_then( |total| total.checked_mul( 1000 ) )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        seconds.checked_mul( 1000 )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Playback Commands:
  load <ref>      Load a URL or file reference          [l]
  play            Start or resume playback              [p]
  pause           Pause playback                        [pa]
  stop            Stop and unload                       [st]
  seek <time>     Seek (e.g. 1:30, 90, 1500ms)          [sk]

Channel Routes:
  call audioplayer/<id>/<cmd> [key=value ...]
                  e.g. call audioplayer/0/seek seekPosition=30000

Other Commands:
  status          Show player state
  help            Show this help
  quit            Exit tonearm"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_load() {
        let cmd = Command::parse( "load http://x/a.mp3" ).unwrap();
        assert_eq!( cmd, Command::Load { source: "http://x/a.mp3".into() } );
    }


    #[test]
    fn test_parse_slash_prefix() {
        let cmd = Command::parse( "/pause" ).unwrap();
        assert_eq!( cmd, Command::Pause );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position_ms: 90_000 } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "sk 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position_ms: 45_000 } );
    }


    #[test]
    fn test_parse_seek_millis() {
        let cmd = Command::parse( "seek 1500ms" ).unwrap();
        assert_eq!( cmd, Command::Seek { position_ms: 1500 } );
    }


    #[test]
    fn test_parse_seek_out_of_range() {
        for input in [ "seek 18446744073709552", "seek 307445734561825861:00" ] {
            let result = Command::parse( input );
            assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ), "{}", input );
        }
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "shuffle" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "load" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_route() {
        let call = MethodCall::parse( "audioplayer/7/seek" ).unwrap();
        assert_eq!( call.player_id, "7" );
        assert_eq!( call.method, "seek" );
    }


    #[test]
    fn test_parse_route_rejects_other_prefix() {
        let result = MethodCall::parse( "videoplayer/0/play" );
        assert!( matches!( result, Err( CommandError::InvalidRoute( _ ) ) ) );

        let result = MethodCall::parse( "audioplayer/0" );
        assert!( matches!( result, Err( CommandError::InvalidRoute( _ ) ) ) );
    }


    #[test]
    fn test_route_to_command_uses_arguments() {
        let mut args = HashMap::new();
        args.insert( ARG_SEEK_POSITION.to_string(), "30000".to_string() );

        let call = MethodCall::parse( "audioplayer/0/seek" ).unwrap();
        assert_eq!( call.to_command( &args ), Ok( Command::Seek { position_ms: 30_000 } ) );

        let call = MethodCall::parse( "audioplayer/0/load" ).unwrap();
        assert!( matches!( call.to_command( &args ), Err( CommandError::MissingArgument( _ ) ) ) );
    }
}
