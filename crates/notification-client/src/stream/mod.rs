//! Live delivery of notifications: SSE decoding, transports, reconnect
//! policy and the connection manager.

pub mod backoff;
pub mod manager;
pub mod sse;
pub mod state;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use manager::{NotificationStream, StreamOptions};
pub use sse::{SseDecoder, SseFrame};
pub use state::{ConnectionState, ConnectionStatus, Delivery};
pub use transport::{EventTransport, FrameStream, HttpEventTransport, UnsupportedTransport};
