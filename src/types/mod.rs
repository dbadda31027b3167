mod models;
mod role;

pub use models::*;
pub use role::{Capability, Relation, Role};
