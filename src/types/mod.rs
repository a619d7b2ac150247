mod models;
mod permission;
mod scope;

pub use models::*;
pub use permission::*;
pub use scope::*;
