pub mod endpoint;
pub mod error;
pub mod models;
pub mod request;
pub mod result;
pub mod templates;
pub mod workflow;

pub use endpoint::{normalize_base_url, Endpoint};
pub use error::{ErrorKind, GenerationError};
pub use request::{
    AspectRatio, CloudModel, EngineKind, GenerationMode, GenerationRequest, ImageAsset,
    Resolution, MAX_REFERENCE_IMAGES,
};
pub use result::{EngineMode, GenerationResult};
