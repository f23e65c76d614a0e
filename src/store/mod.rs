//! Persistence of models, datasets and parameters by kind and name.

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use std::fmt;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::model::Model;
use crate::scoring::Parameter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Model,
    Dataset,
    Parameter,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Dataset => "dataset",
            EntityKind::Parameter => "parameter",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity that can be saved under its own name.
pub trait Storable: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn name(&self) -> &str;
}

impl Storable for Model {
    const KIND: EntityKind = EntityKind::Model;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Storable for Dataset {
    const KIND: EntityKind = EntityKind::Dataset;

    fn name(&self) -> &str {
        &self.name
    }
}

impl Storable for Parameter {
    const KIND: EntityKind = EntityKind::Parameter;

    fn name(&self) -> &str {
        Parameter::name(self)
    }
}

/// Complete-or-fail storage keyed by entity kind and name.
pub trait Store {
    fn load<T: Storable>(&self, name: &str) -> Result<T>;

    /// Save `entity`, replacing any stored entity of the same kind and name.
    fn save<T: Storable>(&mut self, entity: &T) -> Result<()>;

    /// Returns false when nothing was stored under `name`.
    fn delete(&mut self, kind: EntityKind, name: &str) -> Result<bool>;

    /// Stored names of one kind, sorted.
    fn list(&self, kind: EntityKind) -> Result<Vec<String>>;

    fn exists(&self, kind: EntityKind, name: &str) -> Result<bool>;
}

/// Reject names that cannot be used as a single file name.
pub(crate) fn check_name(kind: EntityKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("{} name must not be empty", kind);
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        anyhow::bail!("Invalid {} name '{}': must not contain path separators or '..'", kind, name);
    }
    Ok(())
}
