mod inventory;
mod resolver;

pub use inventory::{ModelInventory, CHECKPOINT_LOADER_NODE, POPULAR_CHECKPOINTS};
pub use resolver::{resolve_model, ModelResolution};
