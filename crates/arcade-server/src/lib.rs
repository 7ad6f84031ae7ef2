//! Realtime arcade server: WebSocket transport, envelope dispatch and the
//! in-process services behind the handlers.

pub mod config;
pub mod connection;
pub mod handlers;
pub mod matchmaker;
pub mod pipeline;
pub mod presence;
pub mod router;
pub mod server;
pub mod session;
pub mod storage;
pub mod token;

use std::sync::Arc;

pub use config::{load_config, Config, ConfigError};
pub use pipeline::{DispatchError, Pipeline};
pub use server::{start, ServerHandle};
pub use session::{Session, SessionRegistry};

/// Build a pipeline wired to the in-process services and every shipped handler.
pub fn build_pipeline(config: Arc<Config>) -> Result<Pipeline, DispatchError> {
    let services = Arc::new(pipeline::Services::local(config));
    let table = handlers::build_table()?;
    Ok(Pipeline::new(services, table))
}
