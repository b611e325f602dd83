pub mod engine;
pub mod state;

pub use engine::{Engine, EngineStats};
pub use state::{EngineHandle, EngineStatus};
