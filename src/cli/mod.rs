mod commands;
pub mod http_client;
mod review;
mod token;

pub use commands::{AdminCommands, ClientArgs};
pub use review::{run_changes, run_history, run_propose, run_review};
pub use token::run_admin_token;
