// Orchestrator: owns the chat session and runs the event loop between the
// TUI and the relay.

pub mod app;
