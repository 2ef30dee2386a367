//! Client side of the queue: transports and the turn-wait protocol.

pub mod http;
pub mod local;
pub mod retry;
pub mod transport;
pub mod turn;

pub use http::HttpTransport;
pub use local::LocalTransport;
pub use retry::{RetryConfig, retry_with_backoff};
pub use transport::Transport;
pub use turn::{Turn, TurnConfig, TurnState};
