//! Listener protocol and registry.
//!
//! Listeners implement [`PlayerListener`], overriding only the callbacks
//! they care about. The [`ListenerRegistry`] delivers each notification
//! to every registered listener, in registration order, before the
//! player accepts its next input.

use std::sync::Arc;

use crate::error::PlaybackError;


/// Receives player notifications.
///
/// Callbacks run synchronously at the player's sequencing point and must
/// return quickly. To issue commands from a callback, hold a
/// [`PlayerHandle`](crate::player::PlayerHandle); its commands are queued
/// behind the notification being delivered.
pub trait PlayerListener: Send + Sync {
    /// A stream or clip just started loading.
    fn on_audio_loading( &self ) {}

    /// The engine reported buffering progress. Values are delivered as
    /// received, so they may repeat or go backwards.
    fn on_buffering_update( &self, _percent: u8 ) {}

    /// Playback control is now possible. Always followed immediately by
    /// `on_player_paused`.
    fn on_audio_ready( &self, _length_ms: u64 ) {}

    fn on_player_playing( &self ) {}

    /// The playhead moved forward while playing.
    fn on_player_playback_update( &self, _position_ms: u64, _length_ms: u64 ) {}

    fn on_player_paused( &self ) {}

    /// Playback ceased and the audio was released. A new `load` is
    /// required to play again.
    fn on_player_stopped( &self ) {}

    /// The stream or clip reached its end.
    fn on_player_completed( &self ) {}

    fn on_seek_started( &self ) {}

    fn on_seek_completed( &self, _position_ms: u64 ) {}

    /// The engine failed. `on_player_stopped` follows immediately.
    fn on_player_error( &self, _error: &PlaybackError ) {}
}


/// A single notification produced by the state machine.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Notification {
    AudioLoading,
    BufferingUpdate( u8 ),
    AudioReady { length_ms: u64 },
    Playing,
    PlaybackUpdate { position_ms: u64, length_ms: u64 },
    Paused,
    Stopped,
    Completed,
    SeekStarted,
    SeekCompleted { position_ms: u64 },
    Error( PlaybackError ),
}


impl Notification {
    /// Invokes the matching listener callback.
    pub fn deliver( &self, listener: &dyn PlayerListener ) {
        match self {
            Notification::AudioLoading => listener.on_audio_loading(),
            Notification::BufferingUpdate( percent ) => listener.on_buffering_update( *percent ),
            Notification::AudioReady { length_ms } => listener.on_audio_ready( *length_ms ),
            Notification::Playing => listener.on_player_playing(),
            Notification::PlaybackUpdate { position_ms, length_ms } => {
                listener.on_player_playback_update( *position_ms, *length_ms )
            }
            Notification::Paused => listener.on_player_paused(),
            Notification::Stopped => listener.on_player_stopped(),
            Notification::Completed => listener.on_player_completed(),
            Notification::SeekStarted => listener.on_seek_started(),
            Notification::SeekCompleted { position_ms } => listener.on_seek_completed( *position_ms ),
            Notification::Error( error ) => listener.on_player_error( error ),
        }
    }
}


/// Registered listeners in registration order.
#[derive( Default )]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn PlayerListener>>,
}


/// Listener identity is the address of the shared allocation.
fn same_listener( a: &Arc<dyn PlayerListener>, b: &Arc<dyn PlayerListener> ) -> bool {
    std::ptr::eq( Arc::as_ptr( a ) as *const (), Arc::as_ptr( b ) as *const () )
}


impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }


    /// Registers a listener.
    ///
    /// Returns false if the same listener was already registered.
    pub fn add( &mut self, listener: Arc<dyn PlayerListener> ) -> bool {
        if self.contains( &listener ) {
            return false;
        }
        self.listeners.push( listener );
        true
    }


    /// Deregisters a listener. Returns false if it was not registered.
    pub fn remove( &mut self, listener: &Arc<dyn PlayerListener> ) -> bool {
        match self.listeners.iter().position( |l| same_listener( l, listener ) ) {
            Some( index ) => {
                self.listeners.remove( index );
                true
            }
            None => false,
        }
    }


    pub fn contains( &self, listener: &Arc<dyn PlayerListener> ) -> bool {
        self.listeners.iter().any( |l| same_listener( l, listener ) )
    }


    pub fn len( &self ) -> usize {
        self.listeners.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.listeners.is_empty()
    }


    pub fn clear( &mut self ) {
        self.listeners.clear();
    }


    /// Delivers one notification to every registered listener.
    ///
    /// Registration needs `&mut self`, so the set cannot change while a
    /// delivery is running.
    pub fn notify( &self, notification: &Notification ) {
        for listener in &self.listeners {
            notification.deliver( listener.as_ref() );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::testing::RecordingListener;


    #[test]
    fn test_duplicate_registration_is_noop() {
        let mut registry = ListenerRegistry::new();
        let recorder = Arc::new( RecordingListener::default() );
        let listener: Arc<dyn PlayerListener> = recorder.clone();

        assert!( registry.add( listener.clone() ) );
        assert!( !registry.add( listener ) );
        assert_eq!( registry.len(), 1 );

        registry.notify( &Notification::Playing );
        assert_eq!( recorder.take(), vec![ Notification::Playing ] );
    }


    #[test]
    fn test_delivery_in_registration_order() {
        let mut registry = ListenerRegistry::new();
        let log = Arc::new( std::sync::Mutex::new( Vec::new() ) );

        struct Tagged( &'static str, Arc<std::sync::Mutex<Vec<&'static str>>> );
        impl PlayerListener for Tagged {
            fn on_player_paused( &self ) {
                self.1.lock().unwrap().push( self.0 );
            }
        }

        registry.add( Arc::new( Tagged( "first", log.clone() ) ) );
        registry.add( Arc::new( Tagged( "second", log.clone() ) ) );
        registry.add( Arc::new( Tagged( "third", log.clone() ) ) );

        registry.notify( &Notification::Paused );
        assert_eq!( *log.lock().unwrap(), vec![ "first", "second", "third" ] );
    }


    #[test]
    fn test_removed_listener_receives_nothing() {
        let mut registry = ListenerRegistry::new();
        let recorder = Arc::new( RecordingListener::default() );
        let listener: Arc<dyn PlayerListener> = recorder.clone();

        registry.add( listener.clone() );
        assert!( registry.remove( &listener ) );
        assert!( !registry.remove( &listener ) );

        registry.notify( &Notification::Stopped );
        assert!( recorder.take().is_empty() );
    }


    #[test]
    fn test_registry_changes_apply_to_next_delivery() {
        let mut registry = ListenerRegistry::new();
        let first = Arc::new( RecordingListener::default() );
        let second = Arc::new( RecordingListener::default() );
        let first_listener: Arc<dyn PlayerListener> = first.clone();

        registry.add( first_listener.clone() );
        registry.notify( &Notification::SeekStarted );
        registry.remove( &first_listener );
        registry.add( second.clone() );
        registry.notify( &Notification::Completed );

        assert_eq!( first.take(), vec![ Notification::SeekStarted ] );
        assert_eq!( second.take(), vec![ Notification::Completed ] );
    }


    #[test]
    fn test_error_maps_to_error_callback() {
        let recorder = RecordingListener::default();
        let error = PlaybackError::Runtime( "device lost".into() );
        Notification::Error( error.clone() ).deliver( &recorder );
        assert_eq!( recorder.take(), vec![ Notification::Error( error ) ] );
    }
}
