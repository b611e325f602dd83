pub mod config;
pub mod detect;
pub mod model;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use detect::{DetectOutcome, Detection};
pub use utils::error::DetectError;

pub type Result<T> = std::result::Result<T, DetectError>;
