mod changes;
pub mod dto;
mod projects;
mod realtime;
pub mod response;
mod router;

pub use router::{AppState, api_router, create_router};
