mod session;
mod session_command;
mod session_handle;
mod snapshot;

pub use session::*;
pub use session_command::*;
pub use session_handle::*;
pub use snapshot::*;
