//! Container probing via Symphonia
//!
//! Resolves the length of a local clip by reading its container headers.
//! No audio is decoded.

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;


/// Errors that can occur while probing a clip.
#[derive( Debug, Error )]
pub enum ProbeError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Clip length is unknown" )]
    UnknownLength,
}


/// What probing learned about a clip.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct ClipInfo {
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: usize,
}


/// Probes a local file for its audio track length.
///
/// Supports SMB/UNC paths transparently via std::fs.
pub fn probe( path: &Path ) -> Result<ClipInfo, ProbeError> {
    // Use larger buffer for network paths (SMB)
    let buffer_len = if path.starts_with( r"\\" ) {
        256 * 1024
    } else {
        64 * 1024
    };

    let file = File::open( path )?;
    let mss = MediaSourceStream::new( Box::new( file ), MediaSourceStreamOptions { buffer_len } );

    // Provide hint based on file extension
    let mut hint = Hint::new();
    if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
        hint.with_extension( ext );
    }

    let probed = symphonia::default::get_probe()
        .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
        .map_err( |_| ProbeError::UnsupportedFormat )?;

    let track = probed.format
        .tracks()
        .iter()
        .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
        .ok_or( ProbeError::NoAudioTrack )?;

    let params = &track.codec_params;
    let sample_rate = params.sample_rate.unwrap_or( 44100 );
    let channels = params.channels.map( |c| c.count() ).unwrap_or( 2 );
    let frames = params.n_frames.ok_or( ProbeError::UnknownLength )?;

    let duration_ms = match params.time_base {
        Some( time_base ) => {
            let time = time_base.calc_time( frames );
            time.seconds * 1000 + ( time.frac * 1000.0 ).round() as u64
        }
        None => frames * 1000 / sample_rate.max( 1 ) as u64,
    };

    tracing::info!(
        "Probed {:?}: {} Hz, {} channels, {} ms",
        path,
        sample_rate,
        channels,
        duration_ms
    );

    Ok( ClipInfo { duration_ms, sample_rate, channels } )
}


#[cfg( test )]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;


    /// Writes a silent 16-bit mono PCM WAV file and returns its path.
    pub(crate) fn write_wav( name: &str, sample_rate: u32, millis: u32 ) -> PathBuf {
        let frames = sample_rate * millis / 1000;
        let data_len = frames * 2;

        let mut bytes = Vec::with_capacity( 44 + data_len as usize );
        bytes.extend_from_slice( b"RIFF" );
        bytes.extend_from_slice( &( 36 + data_len ).to_le_bytes() );
        bytes.extend_from_slice( b"WAVE" );
        bytes.extend_from_slice( b"fmt " );
        bytes.extend_from_slice( &16u32.to_le_bytes() );
        bytes.extend_from_slice( &1u16.to_le_bytes() ); // PCM
        bytes.extend_from_slice( &1u16.to_le_bytes() ); // mono
        bytes.extend_from_slice( &sample_rate.to_le_bytes() );
        bytes.extend_from_slice( &( sample_rate * 2 ).to_le_bytes() );
        bytes.extend_from_slice( &2u16.to_le_bytes() );
        bytes.extend_from_slice( &16u16.to_le_bytes() );
        bytes.extend_from_slice( b"data" );
        bytes.extend_from_slice( &data_len.to_le_bytes() );
        bytes.resize( 44 + data_len as usize, 0 );

        let path = std::env::temp_dir()
            .join( format!( "tonearm-{}-{}.wav", std::process::id(), name ) );
        std::fs::write( &path, bytes ).unwrap();
        path
    }


    #[test]
    fn test_probe_wav_length() {
        let path = write_wav( "probe-length", 8000, 1500 );
        let info = probe( &path ).unwrap();
        assert_eq!( info.duration_ms, 1500 );
        assert_eq!( info.sample_rate, 8000 );
        assert_eq!( info.channels, 1 );
        let _ = std::fs::remove_file( path );
    }


    #[test]
    fn test_probe_missing_file() {
        let result = probe( Path::new( "/nonexistent/tonearm/clip.mp3" ) );
        assert!( matches!( result, Err( ProbeError::FileOpen( _ ) ) ) );
    }


    #[test]
    fn test_probe_rejects_non_audio() {
        let path = std::env::temp_dir()
            .join( format!( "tonearm-{}-notes.txt", std::process::id() ) );
        std::fs::write( &path, b"definitely not audio" ).unwrap();
        let result = probe( &path );
        assert!( matches!( result, Err( ProbeError::UnsupportedFormat ) ) );
        let _ = std::fs::remove_file( path );
    }
}
