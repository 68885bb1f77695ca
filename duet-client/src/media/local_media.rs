use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Each frame a track hands out covers this much audio.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// A 20 ms Opus packet that decodes to silence.
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Produces encoded Opus frames, one per `FRAME_DURATION`.
pub trait AudioSource: Send + Sync {
    fn read_frame(&self) -> Bytes;
}

/// Handle to one local audio track.
///
/// Clones share the same enabled/live flags, so the transport pumping the
/// track and the session toggling it see the same state.
#[derive(Clone)]
pub struct AudioTrack {
    id: String,
    enabled: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    source: Arc<dyn AudioSource>,
}

impl AudioTrack {
    pub fn new(id: impl Into<String>, source: Arc<dyn AudioSource>) -> Self {
        Self {
            id: id.into(),
            enabled: Arc::new(AtomicBool::new(true)),
            live: Arc::new(AtomicBool::new(true)),
            source,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Ends the track for good and releases the device.
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// Next frame to send; silence while the track is disabled.
    pub fn next_frame(&self) -> Bytes {
        if self.is_enabled() {
            self.source.read_frame()
        } else {
            Bytes::from_static(&OPUS_SILENCE_FRAME)
        }
    }

    pub(crate) fn live_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }
}

impl fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrack")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}

/// The tracks acquired for one session.
#[derive(Debug, Clone, Default)]
pub struct LocalMedia {
    tracks: Vec<AudioTrack>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<AudioTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    pub fn is_muted(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(|t| !t.is_enabled())
    }

    /// Flips every track and returns whether audio is now muted.
    pub fn toggle_mute(&self) -> bool {
        for track in &self.tracks {
            track.set_enabled(!track.is_enabled());
        }
        self.is_muted()
    }

    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(AudioTrack::is_live)
    }
}
