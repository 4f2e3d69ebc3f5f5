pub mod catalog;
pub mod model;

pub use catalog::{VersionCatalog, DEFAULT_CATALOG_URL};
pub use model::{Channel, SemVersion, Version};
