pub mod chat;
pub mod client;
pub mod prompts;
pub mod stabilizer;

pub use chat::*;
pub use client::*;
pub use prompts::*;
pub use stabilizer::*;
