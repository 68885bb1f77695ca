mod lobby;
mod lobby_command;
mod matchmaker;

pub use lobby::*;
pub use lobby_command::*;
pub use matchmaker::*;
