use std::collections::BTreeMap;
use std::fs::File;

use camino::Utf8PathBuf;

use crate::error::ApiResult;

/// Flat string key-value persistence used by the bridge registry.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> ApiResult<()>;
    fn remove(&mut self, key: &str) -> ApiResult<()>;
}

/// Keeps all values in a single yaml mapping, rewritten on every change.
#[derive(Debug)]
pub struct YamlFileStore {
    file: Utf8PathBuf,
    values: BTreeMap<String, String>,
}

impl YamlFileStore {
    pub fn load(file: Utf8PathBuf) -> Self {
        let values = if file.is_file() {
            match File::open(&file).and_then(|fd| {
                serde_yml::from_reader::<_, BTreeMap<String, String>>(fd)
                    .map_err(std::io::Error::other)
            }) {
                Ok(values) => values,
                Err(err) => {
                    log::warn!("Failed to parse {file}, starting empty: {err}");
                    BTreeMap::new()
                }
            }
        } else {
            log::debug!("No state file at {file}, starting empty");
            BTreeMap::new()
        };

        Self { file, values }
    }

    fn save(&self) -> ApiResult<()> {
        let fd = File::create(&self.file)?;
        serde_yml::to_writer(fd, &self.values)?;
        Ok(())
    }
}

impl KeyValueStore for YamlFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> ApiResult<()> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    fn remove(&mut self, key: &str) -> ApiResult<()> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> ApiResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ApiResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use crate::storage::{KeyValueStore, YamlFileStore};

    fn temp_path() -> Utf8PathBuf {
        let dir = Utf8PathBuf::try_from(std::env::temp_dir()).unwrap();
        dir.join(format!("huetrek-store-{}.yaml", uuid::Uuid::new_v4()))
    }

    #[test]
    fn yaml_store_survives_reload() {
        let path = temp_path();

        let mut store = YamlFileStore::load(path.clone());
        store.set("currentBridgeId", "demo".into()).unwrap();
        store.set("other", "value".into()).unwrap();
        store.remove("other").unwrap();

        let store = YamlFileStore::load(path.clone());
        assert_eq!(store.get("currentBridgeId").as_deref(), Some("demo"));
        assert_eq!(store.get("other"), None);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let path = temp_path();
        std::fs::write(&path, "- this\n- is a list\n").unwrap();

        let store = YamlFileStore::load(path.clone());
        assert_eq!(store.get("currentBridgeId"), None);

        std::fs::remove_file(&path).unwrap();
    }
}
