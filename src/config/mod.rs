mod file;
mod server;

pub use file::{FileConfig, ProjectSeed, UserEntry};
pub use server::{ServerConfig, StalePolicy};
