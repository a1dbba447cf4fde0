use crate::errors::Error;
use crate::settings::Setting;
use crate::StorageAdapter;
use log::warn;
use parking_lot::Mutex;
use rasterkit_shared::types::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads settings from a flat json object like `{ "render.dpi": "u:144" }`.
///
/// Values are in the same typed string notation as the defaults in `settings.json`. Changes made
/// through `set()` are written back to the file right away.
pub struct JsonStorageAdapter {
    path: PathBuf,
    elements: Mutex<HashMap<String, Setting>>,
}

impl TryFrom<&Path> for JsonStorageAdapter {
    type Error = anyhow::Error;

    fn try_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            fs::write(path, "{}")?;
        }

        if !fs::metadata(path)?.is_file() {
            return Err(Error::Config(format!("{} is not a regular file", path.display())).into());
        }

        let elements = read_file(path)?;

        Ok(JsonStorageAdapter {
            path: path.to_path_buf(),
            elements: Mutex::new(elements),
        })
    }
}

impl StorageAdapter for JsonStorageAdapter {
    fn get(&self, key: &str) -> Option<Setting> {
        self.elements.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Setting) {
        self.elements.lock().insert(key.to_owned(), value);

        if let Err(err) = self.flush() {
            warn!("cannot write settings to {}: {err}", self.path.display());
        }
    }

    fn all(&self) -> Result<HashMap<String, Setting>> {
        Ok(self.elements.lock().clone())
    }
}

impl JsonStorageAdapter {
    /// Writes all settings back to the json file
    pub fn flush(&self) -> Result<()> {
        let json = {
            let lock = self.elements.lock();
            serde_json::to_string_pretty(&*lock).map_err(Error::from)?
        };

        fs::write(&self.path, json).map_err(Error::from)?;
        Ok(())
    }
}

/// Reads the whole json file. Entries that cannot be parsed are skipped with a warning.
fn read_file(path: &Path) -> Result<HashMap<String, Setting>> {
    let buf = fs::read_to_string(path).map_err(Error::from)?;
    let parsed_json: Value = serde_json::from_str(&buf).map_err(Error::from)?;

    let mut elements = HashMap::new();
    if let Value::Object(settings) = parsed_json {
        for (key, value) in settings {
            match serde_json::from_value(value) {
                Ok(setting) => {
                    elements.insert(key, setting);
                }
                Err(err) => {
                    warn!("problem reading setting {key} from json: {err}");
                }
            }
        }
    }

    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_flushes_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "render.dpi": "u:144", "broken": "x:1" }"#).unwrap();

        let adapter = JsonStorageAdapter::try_from(path.as_path()).unwrap();
        assert_eq!(adapter.get("render.dpi"), Some(Setting::UInt(144)));
        assert_eq!(adapter.get("broken"), None);

        adapter.set("fonts.load_system_fonts", Setting::Bool(false));

        let reread = JsonStorageAdapter::try_from(path.as_path()).unwrap();
        assert_eq!(reread.get("fonts.load_system_fonts"), Some(Setting::Bool(false)));
        assert_eq!(reread.all().unwrap().len(), 2);
    }

    #[test]
    fn creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.json");

        let adapter = JsonStorageAdapter::try_from(path.as_path()).unwrap();
        assert!(adapter.all().unwrap().is_empty());
        assert!(path.exists());
    }
}
