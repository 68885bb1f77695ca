pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Label of the data channel the caller opens for text chat.
pub const CHAT_CHANNEL_LABEL: &str = "chat";
