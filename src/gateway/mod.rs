//! Gateway server and protocol front-ends

pub mod auth;
pub mod rpc;
mod router;
mod server;
pub mod session;
mod sse;
mod ws;

pub use router::{AppState, create_router};
pub use rpc::{McpGateway, RpcReply};
pub use server::Gateway;
pub use session::SessionRegistry;
