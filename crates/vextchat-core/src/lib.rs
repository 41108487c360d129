// Shared domain types for the chat front-end: configuration, credentials,
// chat turns, the transcript, and the session context that owns them.

pub mod config;
pub mod credentials;
pub mod protocol;
pub mod session;
pub mod transcript;
