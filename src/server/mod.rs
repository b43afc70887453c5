mod handlers;
mod models;
mod state;

pub use handlers::{FONT_SIZE_HEADER, TRUNCATED_HEADER, router, run_server};
pub use state::ServerState;
