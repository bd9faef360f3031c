pub mod handlers;
pub mod jobs;
pub mod media;
pub mod middleware;
pub mod providers;
pub mod routes;
pub mod settings;
pub mod ws;

pub use routes::create_router;
pub use ws::{WsBroadcaster, WsMessage};
