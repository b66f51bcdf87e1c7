//! Commands that ship with Hermes.

mod help;
mod ping;
mod search;


pub use help::HelpModule;
pub use ping::PingModule;
pub use search::{SearchModule, SEARCH_SHOWN};
