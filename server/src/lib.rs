//! WebSocket gateway that streams synthesized speech back in chunks.

pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;
pub mod state;
pub mod streamer;
pub mod transport;
pub mod validation;

pub use config::ServerConfig;
pub use error::{GatewayError, RequestError};
pub use server::{Server, ServerHandle};
pub use state::AppState;
