pub mod credentials;
pub mod handlers;
pub mod items;
pub mod middleware;
pub mod production;
pub mod publishing;
pub mod routes;
pub mod ws;

pub use routes::create_router;
pub use ws::{WsBroadcaster, WsMessage};
