use crate::core::{AttributeSchema, Module};
use serde::{Deserialize, Serialize};

/// Implemented by `#[derive(StreamModule)]`
pub trait Registered {
    /// Registry id of the module type
    const ID: &'static str;
}

/// Factory function type for creating module instances
pub type ModuleFactory = fn() -> Box<dyn Module>;

/// Registry entry of a module type
#[derive(Clone)]
pub struct ModuleMetadata {
    pub id: String,
    pub name: String,
    pub category: String,
    pub factory: ModuleFactory,
}

impl ModuleMetadata {
    /// Create a new instance of this module type
    pub fn create_instance(&self) -> Box<dyn Module> {
        (self.factory)()
    }

    /// Attribute schema, read from a default instance
    pub fn parameters(&self) -> Vec<AttributeSchema> {
        self.create_instance().attributes().schema()
    }

    pub fn describe(&self) -> ModuleDescription {
        ModuleDescription {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            parameters: self.parameters(),
        }
    }
}

impl std::fmt::Debug for ModuleMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleMetadata")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Serializable summary of a module type, for hosts listing what they can build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub id: String,
    pub name: String,
    pub category: String,
    pub parameters: Vec<AttributeSchema>,
}

// Factory type for creating module metadata at runtime
pub type ModuleMetadataFactory = fn() -> ModuleMetadata;

// Wrapper for inventory collection
pub struct ModuleMetadataFactoryWrapper(pub ModuleMetadataFactory);

// Inventory submission type
inventory::collect!(ModuleMetadataFactoryWrapper);
