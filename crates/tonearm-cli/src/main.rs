//! Tonearm CLI - Console controller for streams and clips

mod cli;
mod console;
mod engine;
mod probe;
mod settings;

use std::collections::{ BTreeMap, HashMap };
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ Context, Result };
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::runtime::Handle;
use tracing_subscriber::filter::LevelFilter;

use cli::Args;
use console::{ format_ms, AutoPlay, ConsoleListener };
use engine::ClockEngine;
use settings::Settings;

use tonearm_core::{ command, Command, MethodCall, Player };


/// How often queued engine signals are applied.
const PUMP_INTERVAL: Duration = Duration::from_millis( 20 );

/// Player addressed by plain console commands.
const DEFAULT_PLAYER: &str = "0";


/// Application state.
struct App {
    /// Players by channel id, created on first use
    players: BTreeMap<String, Player<ClockEngine>>,
    settings: Settings,
    runtime: Handle,
    autoplay: bool,
    once: bool,
    /// Something was loaded since startup
    loaded: bool,
    should_quit: bool,
}


impl App {
    fn new( args: &Args, settings: Settings ) -> Self {
        Self {
            players: BTreeMap::new(),
            settings,
            runtime: Handle::current(),
            autoplay: args.autoplay,
            once: args.once,
            loaded: false,
            should_quit: false,
        }
    }


    /// Returns the player for `id`, creating it on first use.
    fn player( &mut self, id: &str ) -> &mut Player<ClockEngine> {
        let settings = &self.settings;
        let runtime = &self.runtime;
        let autoplay = self.autoplay;

        self.players.entry( id.to_string() ).or_insert_with( || {
            tracing::info!( "Creating player {}", id );
            let engine = ClockEngine::new( settings.clock(), runtime.clone() );
            let mut player = Player::new( engine );
            player.add_listener( Arc::new( ConsoleListener::new( id, settings.print_progress ) ) );
            if autoplay {
                player.add_listener( Arc::new( AutoPlay::new( player.handle() ) ) );
            }
            player
        })
    }


    /// Applies queued engine signals on every player.
    fn tick( &mut self ) {
        for player in self.players.values_mut() {
            player.pump();
        }

        if self.once && self.loaded && self.players.values().all( |p| p.is_stopped() || p.is_completed() ) {
            self.should_quit = true;
        }
    }


    fn handle_line( &mut self, line: &str ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match line {
            "quit" | "q" | "exit" => self.should_quit = true,
            "help" | "h" | "?" => println!( "{}", command::help_text() ),
            "status" => self.print_status(),
            _ => {
                if let Some( rest ) = line.strip_prefix( "call " ) {
                    self.call( rest );
                } else {
                    match Command::parse( line ) {
                        Ok( cmd ) => self.run_command( DEFAULT_PLAYER, cmd ),
                        Err( e ) => println!( "{}", e ),
                    }
                }
            }
        }
    }


    /// Handles `call <route> [key=value ...]`.
    fn call( &mut self, input: &str ) {
        let mut parts = input.split_whitespace();
        let Some( route ) = parts.next() else {
            println!( "Usage: call audioplayer/<id>/<command> [key=value ...]" );
            return;
        };

        let args: HashMap<String, String> = parts
            .filter_map( |pair| pair.split_once( '=' ) )
            .map( |( k, v )| ( k.to_string(), v.to_string() ) )
            .collect();

        let resolved = MethodCall::parse( route )
            .and_then( |call| call.to_command( &args ).map( |cmd| ( call.player_id, cmd ) ) );

        match resolved {
            Ok(( player_id, cmd )) => self.run_command( &player_id, cmd ),
            Err( e ) => println!( "{}", e ),
        }
    }


    fn run_command( &mut self, player_id: &str, cmd: Command ) {
        tracing::debug!( "Player {}: {}", player_id, cmd.description() );
        if matches!( cmd, Command::Load { .. } ) {
            self.loaded = true;
        }
        cmd.apply( self.player( player_id ) );
    }


    fn print_status( &self ) {
        if self.players.is_empty() {
            println!( "No players" );
            return;
        }

        for ( id, player ) in &self.players {
            let length = player.audio_length()
                .map( format_ms )
                .unwrap_or_else( || "--:--".into() );
            println!(
                "[{}] {} {} / {} buffered {}% {}",
                id,
                player.state().label(),
                format_ms( player.playback_position() ),
                length,
                player.buffered_percent().unwrap_or( 0 ),
                player.source().unwrap_or( "-" ),
            );
        }
    }
}


/// Installs the stderr log subscriber.
fn init_logging( args: &Args, settings: &Settings ) {
    let level = args.log_level()
        .unwrap_or( settings.log_level.as_str() )
        .parse::<LevelFilter>()
        .unwrap_or( LevelFilter::WARN );

    tracing_subscriber::fmt()
        .with_max_level( level )
        .with_writer( std::io::stderr )
        .with_target( false )
        .init();
}


#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.settings {
        Some( path ) => Settings::load_from( path ),
        None => Settings::load(),
    };

    if args.init_settings {
        let path = args.settings.clone()
            .or_else( Settings::settings_path )
            .context( "No configuration directory available" )?;
        settings.save_to( &path )
            .with_context( || format!( "Failed to write {}", path.display() ) )?;
        println!( "Wrote {}", path.display() );
        return Ok(());
    }

    init_logging( &args, &settings );

    let mut app = App::new( &args, settings );
    if let Some( source ) = &args.source {
        app.run_command( DEFAULT_PLAYER, Command::Load { source: source.clone() } );
    } else {
        println!( "Type 'help' for commands." );
    }

    let mut lines = BufReader::new( tokio::io::stdin() ).lines();
    let mut stdin_open = true;
    let mut pump = tokio::time::interval( PUMP_INTERVAL );

    while !app.should_quit {
        tokio::select! {
            _ = pump.tick() => app.tick(),
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok( Some( line ) ) => app.handle_line( &line ),
                    Ok( None ) => {
                        stdin_open = false;
                        // Only a loaded --once session is worth waiting for
                        if !app.once || !app.loaded {
                            app.should_quit = true;
                        }
                    }
                    Err( e ) => {
                        tracing::warn!( "Failed to read stdin: {}", e );
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => app.should_quit = true,
        }
    }

    // Release every session before the runtime shuts down
    for ( _, player ) in std::mem::take( &mut app.players ) {
        player.release();
    }

    Ok(())
}
