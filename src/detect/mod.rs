pub mod classes;
pub mod decode;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod types;

pub use classes::COCO_CLASSES;
pub use decode::{decode, NO_DETECTION_LABEL};
pub use loader::ImageLoader;
pub use pipeline::DetectPipeline;
pub use preprocess::Preprocessor;
pub use types::{DetectOptions, DetectOutcome, Detection};
