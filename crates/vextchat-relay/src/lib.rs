// Message relay: turns a chat message plus credentials into one POST against
// a catch hook and normalizes whatever comes back into a `RelayResult`.

pub mod client;
pub mod reply;
pub mod result;
pub mod transport;

pub use client::Relay;
pub use reply::{ReplyExtractor, ReplyPolicy};
pub use result::{FailureKind, RelayError, RelayFailure, RelayResult};
pub use transport::{HttpTransport, OutboundRequest, Transport, TransportError, TransportResponse};

#[cfg(test)]
mod test_support;
