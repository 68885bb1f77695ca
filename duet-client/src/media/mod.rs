mod local_media;
mod silent_microphone;

pub use local_media::{AudioSource, AudioTrack, FRAME_DURATION, LocalMedia, OPUS_SILENCE_FRAME};
pub use silent_microphone::SilentMicrophone;

use crate::error::MediaError;
use async_trait::async_trait;

/// Access to the local capture device.
///
/// Called once per session, after a partner is found, so the permission
/// prompt never shows up before there is someone to talk to.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire_audio(&self) -> Result<LocalMedia, MediaError>;
}
