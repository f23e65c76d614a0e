use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::{check_name, EntityKind, Storable, Store};

/// Keeps serialized entities in memory, so round trips go through the
/// same JSON shape as [`super::JsonStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<(EntityKind, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load<T: Storable>(&self, name: &str) -> Result<T> {
        let json = self
            .entries
            .get(&(T::KIND, name.to_string()))
            .with_context(|| format!("{} '{}' not found", T::KIND, name))?;
        serde_json::from_str(json).with_context(|| format!("Failed to load {} '{}'", T::KIND, name))
    }

    fn save<T: Storable>(&mut self, entity: &T) -> Result<()> {
        check_name(T::KIND, entity.name())?;
        let json = serde_json::to_string_pretty(entity)
            .with_context(|| format!("Failed to serialize {} '{}'", T::KIND, entity.name()))?;
        self.entries.insert((T::KIND, entity.name().to_string()), json);
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, name: &str) -> Result<bool> {
        Ok(self.entries.remove(&(kind, name.to_string())).is_some())
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<String>> {
        Ok(self
            .entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn exists(&self, kind: EntityKind, name: &str) -> Result<bool> {
        Ok(self.entries.contains_key(&(kind, name.to_string())))
    }
}
