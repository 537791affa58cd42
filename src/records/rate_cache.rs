use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{AppError, Context, Result};

use super::{CachedRate, RateStore};

/// Durable store writing one `<KEY>.json` file per instrument.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ensure the cache directory exists before the first write.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create cache directory {}", self.dir.display())
        })?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl RateStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<CachedRate>> {
        let path = self.path_for(key);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::message(format!(
                    "Failed to read cached rate {}: {}",
                    path.display(),
                    err
                )));
            }
        };

        let cached: CachedRate = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse cached rate {}", path.display()))?;
        Ok(Some(cached))
    }

    fn save(&self, key: &str, rate: &CachedRate) -> Result<()> {
        self.prepare()?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string(rate).context("Failed to serialize cached rate")?;
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create cache file {}", tmp_path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write cache file {}", tmp_path.display()))?;
        drop(file);

        // Rename keeps readers from ever seeing a half-written record.
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace cache file {}", path.display()))?;
        Ok(())
    }
}

/// Process-lifetime store, used when persistence is disabled.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, CachedRate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<CachedRate>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| AppError::message("Failed to lock rate cache"))?;
        Ok(slots.get(key).copied())
    }

    fn save(&self, key: &str, rate: &CachedRate) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AppError::message("Failed to lock rate cache"))?;
        slots.insert(key.to_string(), *rate);
        Ok(())
    }
}
