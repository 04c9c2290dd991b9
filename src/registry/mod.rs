pub mod metadata;

pub use metadata::{
    ModuleDescription, ModuleFactory, ModuleMetadata, ModuleMetadataFactory, ModuleMetadataFactoryWrapper,
    Registered,
};

use crate::core::{Module, StreamError};

/// Every module type linked into the binary
pub fn all() -> Vec<ModuleMetadata> {
    let mut modules: Vec<ModuleMetadata> = inventory::iter::<ModuleMetadataFactoryWrapper>
        .into_iter()
        .map(|wrapper| (wrapper.0)())
        .collect();
    modules.sort_by(|a, b| a.id.cmp(&b.id));
    modules
}

pub fn find(id: &str) -> Option<ModuleMetadata> {
    inventory::iter::<ModuleMetadataFactoryWrapper>
        .into_iter()
        .map(|wrapper| (wrapper.0)())
        .find(|meta| meta.id == id)
}

/// Instantiate a registered module type
pub fn create(id: &str) -> Result<Box<dyn Module>, StreamError> {
    find(id)
        .map(|meta| meta.create_instance())
        .ok_or_else(|| StreamError::UnknownModule { id: id.to_string() })
}
