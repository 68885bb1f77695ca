
pub use fake_media::*;
pub use fake_peer::*;
pub use lobby_link::*;
