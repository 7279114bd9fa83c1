//! Command handlers for the docqa CLI.

pub mod ask;
pub mod chat;
pub mod history;
pub mod memory;
pub mod parse;
pub mod session;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use memory::MemoryCommand;
pub use parse::ParseCommand;
