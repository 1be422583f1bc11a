//! Image catalog: validated, read-only server templates.

pub mod catalog;
pub mod types;

pub use catalog::ImageCatalog;
pub use types::{
    ConfigFileDef, EnvironmentLink, ImageConfig, ImageDef, ImageMeta, ImageVariable, Installation,
    IMAGE_API_VERSION,
};
