// Library root: exposes the TUI so tests and the binary share it.

pub mod tui;
