use crate::error::MediaError;
use crate::media::{AudioSource, AudioTrack, LocalMedia, MediaDevices, OPUS_SILENCE_FRAME};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

struct Silence;

impl AudioSource for Silence {
    fn read_frame(&self) -> Bytes {
        Bytes::from_static(&OPUS_SILENCE_FRAME)
    }
}

/// Stand-in capture device for hosts without a microphone backend.
///
/// Behaves like an exclusive device: a second acquisition fails until the
/// tracks from the previous one have been stopped.
#[derive(Default)]
pub struct SilentMicrophone {
    in_use: Mutex<Option<Arc<AtomicBool>>>,
    counter: AtomicU64,
}

impl SilentMicrophone {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaDevices for SilentMicrophone {
    async fn acquire_audio(&self) -> Result<LocalMedia, MediaError> {
        let mut in_use = self
            .in_use
            .lock()
            .map_err(|_| MediaError::DeviceUnavailable("device lock poisoned".to_owned()))?;

        if let Some(live) = in_use.as_ref() {
            if live.load(Ordering::SeqCst) {
                return Err(MediaError::DeviceUnavailable(
                    "previous session still holds the microphone".to_owned(),
                ));
            }
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let track = AudioTrack::new(format!("mic-{n}"), Arc::new(Silence));
        *in_use = Some(track.live_flag());
        debug!("Acquired {:?}", track);

        Ok(LocalMedia::new(vec![track]))
    }
}
