mod engine;
mod state;

pub use engine::*;
pub use state::*;
