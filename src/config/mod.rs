mod server;

pub use server::{DEFAULT_COOKIE_NAME, ServerConfig};
