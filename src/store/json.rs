use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use tracing::debug;

use super::{check_name, EntityKind, Storable, Store};

/// Pretty JSON files at `<root>/<kind>/<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    fn path(&self, kind: EntityKind, name: &str) -> Result<PathBuf> {
        check_name(kind, name)?;
        Ok(self.kind_dir(kind).join(format!("{}.json", name)))
    }
}

impl Store for JsonStore {
    fn load<T: Storable>(&self, name: &str) -> Result<T> {
        let path = self.path(T::KIND, name)?;
        if !path.exists() {
            anyhow::bail!("{} '{}' not found in {}", T::KIND, name, self.root.display());
        }

        let file = File::open(&path)
            .with_context(|| format!("Failed to open {} file at {}", T::KIND, path.display()))?;
        let entity: T = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load {} '{}'", T::KIND, name))?;

        debug!(kind = %T::KIND, name, "loaded");
        Ok(entity)
    }

    /// Write atomically so a failed save never leaves a truncated file.
    fn save<T: Storable>(&mut self, entity: &T) -> Result<()> {
        let path = self.path(T::KIND, entity.name())?;
        let dir = self.kind_dir(T::KIND);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory at {}", dir.display()))?;

        let mut file = AtomicWriteFile::open(&path)
            .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
        serde_json::to_writer_pretty(&mut file, entity)
            .with_context(|| format!("Failed to serialize {} '{}'", T::KIND, entity.name()))?;
        file.commit()
            .with_context(|| format!("Failed to save {} '{}'", T::KIND, entity.name()))?;

        debug!(kind = %T::KIND, name = entity.name(), path = %path.display(), "saved");
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, name: &str) -> Result<bool> {
        let path = self.path(kind, name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {} at {}", kind, path.display()))?;
        debug!(%kind, name, "deleted");
        Ok(true)
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<String>> {
        let dir = self.kind_dir(kind);
        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let mut names = Vec::new();
        for entry in glob::glob(&pattern).context("Invalid storage path pattern")? {
            let path = entry.context("Failed to read storage directory entry")?;
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, kind: EntityKind, name: &str) -> Result<bool> {
        Ok(self.path(kind, name)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataPoint, Dataset};
    use crate::model::Model;
    use crate::scoring::{Normalizer, Parameter, ValueRange};
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        (dir, store)
    }

    fn price() -> Parameter {
        Parameter::numerical(
            "price",
            Some(ValueRange::new(0.0, 5000.0)),
            Normalizer::step_linear_negative(500.0, 3000.0).unwrap(),
        )
        .unwrap()
        .with_weight(2.0)
    }

    #[test]
    fn test_load_missing_is_error() {
        let (_dir, store) = store();
        let err = store.load::<Model>("nope").unwrap_err();
        assert!(err.to_string().contains("model 'nope' not found"));
    }

    #[test]
    fn test_model_roundtrip_is_exact() {
        let (_dir, mut store) = store();
        let mut model = Model::new("guitar-picker").with_description("Which guitar to buy");
        model.add_parameter(price()).unwrap();
        model.add_dataset(
            Dataset::new("guitars").with_point(DataPoint::new("Les Paul").with_value("price", 1500)),
        );
        model.evaluate_datasets().unwrap();

        store.save(&model).unwrap();
        let loaded: Model = store.load("guitar-picker").unwrap();
        assert_eq!(loaded, model);

        let path = store.root().join("model").join("guitar-picker.json");
        let first = fs::read_to_string(&path).unwrap();
        store.save(&loaded).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_list_and_delete() {
        let (_dir, mut store) = store();
        assert!(store.list(EntityKind::Dataset).unwrap().is_empty());
        store.save(&Dataset::new("b")).unwrap();
        store.save(&Dataset::new("a")).unwrap();
        store.save(&price()).unwrap();

        assert_eq!(store.list(EntityKind::Dataset).unwrap(), vec!["a", "b"]);
        assert_eq!(store.list(EntityKind::Parameter).unwrap(), vec!["price"]);
        assert!(store.exists(EntityKind::Dataset, "a").unwrap());

        assert!(store.delete(EntityKind::Dataset, "a").unwrap());
        assert!(!store.delete(EntityKind::Dataset, "a").unwrap());
        assert!(!store.exists(EntityKind::Dataset, "a").unwrap());
    }

    #[test]
    fn test_rejects_path_names() {
        let (_dir, mut store) = store();
        assert!(store.save(&Dataset::new("../escape")).is_err());
        assert!(store.load::<Dataset>("a/b").is_err());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let (_dir, store) = store();
        let dir = store.root().join("dataset");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("bad.json"), "{ not json").unwrap();
        let err = store.load::<Dataset>("bad").unwrap_err();
        assert!(err.to_string().contains("Failed to load dataset 'bad'"));
    }
}
