//! Configuration store
//!
//! All tunable options of the rasterizer live in the config store. Defaults are compiled in from
//! `settings.json`; a [`StorageAdapter`] can override them from another source (a json file in the
//! command line tool, memory in tests).

mod errors;
pub mod settings;
pub mod storage;

pub use crate::errors::Error;
use crate::settings::{Setting, SettingInfo};
use crate::storage::MemoryStorageAdapter;
use lazy_static::lazy_static;
use log::warn;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rasterkit_shared::types::Result;
use serde_derive::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::mem;
use std::str::FromStr;
use wildmatch::WildMatch;

/// Settings are stored in a json file, but this is included in the binary for mostly easy editing.
const SETTINGS_JSON: &str = include_str!("./settings.json");

/// `StorageAdapter` is the interface for storing and retrieving settings.
/// Adapters are shared between threads, so they need to be `Send + Sync`.
pub trait StorageAdapter: Send + Sync {
    /// Retrieves a setting from the storage
    fn get(&self, key: &str) -> Option<Setting>;

    /// Stores a given setting to the storage. Takes `&self`, so adapters use interior locking.
    fn set(&self, key: &str, value: Setting);

    /// Retrieves all the settings in the storage in one go. This is used for preloading the settings
    /// into the `ConfigStore`.
    fn all(&self) -> Result<HashMap<String, Setting>>;
}

lazy_static! {
    // Initial config store will have a memory storage adapter. It will save within the session, but not
    // persist this on disk.
    static ref CONFIG_STORE: RwLock<ConfigStore> = RwLock::new(ConfigStore::default());
}

/// Returns a read guard on the global config store.
/// Any callers of the config store can just do `config_store().get("render.dpi")`
pub fn config_store() -> RwLockReadGuard<'static, ConfigStore> {
    CONFIG_STORE.read()
}

pub fn config_store_write() -> RwLockWriteGuard<'static, ConfigStore> {
    CONFIG_STORE.write()
}

/// These macro's can be used to simplify the calls to the config store. You can simply do:
///
/// let dpi = `config!(uint "render.dpi")`;
/// `config_set!(bool "fonts.load_system_fonts", false)`;
///
/// Note that when you cannot find the key, it will return a default value. You can test for
/// existence of the key with `config_store().has("key")`
#[macro_export]
macro_rules! config {
    (string $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_string(),
            None => String::new(),
        }
    };
    (bool $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_bool(),
            None => false,
        }
    };
    (uint $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_uint(),
            None => 0,
        }
    };
    (sint $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_sint(),
            None => 0,
        }
    };
    (map $key:expr) => {
        match $crate::config_store().get($key) {
            Some(setting) => setting.to_map(),
            None => Vec::new(),
        }
    };
}

#[macro_export]
macro_rules! config_set {
    (string $key:expr, $val:expr) => {
        $crate::config_store().set($key, $crate::settings::Setting::String($val))
    };
    (bool $key:expr, $val:expr) => {
        $crate::config_store().set($key, $crate::settings::Setting::Bool($val))
    };
    (uint $key:expr, $val:expr) => {
        $crate::config_store().set($key, $crate::settings::Setting::UInt($val))
    };
    (sint $key:expr, $val:expr) => {
        $crate::config_store().set($key, $crate::settings::Setting::SInt($val))
    };
    (map $key:expr, $val:expr) => {
        $crate::config_store().set($key, $crate::settings::Setting::Map($val))
    };
}

/// `JsonEntry` is used for parsing the settings.json file
#[derive(Debug, Deserialize)]
struct JsonEntry {
    key: String,
    #[serde(rename = "type")]
    _entry_type: String,
    default: String,
    description: String,
}

/// Configuration storage is the place where the rasterizer can find all configurable options
pub struct ConfigStore {
    /// All current settings. Locked separately so settings can be stored through `&self`.
    settings: Mutex<HashMap<String, Setting>>,
    /// A hashmap of all setting descriptions, default values and type information
    settings_info: HashMap<String, SettingInfo>,
    /// Keys of all settings so we can iterate keys easily
    setting_keys: Vec<String>,
    /// The storage adapter used for persisting and loading keys
    storage: Box<dyn StorageAdapter>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        let mut store = Self {
            settings: Mutex::new(HashMap::new()),
            settings_info: HashMap::new(),
            setting_keys: Vec::new(),
            storage: Box::new(MemoryStorageAdapter::new()),
        };

        // Populate the store with the default settings. They may be overwritten by the storage
        // as soon as one is added with config_store_write().set_storage()
        if let Err(err) = store.populate_default_settings() {
            warn!("config: cannot load default settings: {err}");
        }
        store
    }
}

impl ConfigStore {
    /// Sets a new storage engine and updates all settings in the config store according to what
    /// is written in the storage. Note that it will overwrite any current settings in the config
    /// store.
    pub fn set_storage(&mut self, storage: Box<dyn StorageAdapter>) {
        self.storage = storage;

        match self.storage.all() {
            Ok(all_settings) => {
                let mut settings = self.settings.lock();
                for (key, value) in all_settings {
                    if self.accepts(&key, &value) {
                        settings.insert(key, value);
                    }
                }
            }
            Err(err) => warn!("config: cannot read settings from storage: {err}"),
        }
    }

    /// Returns true when the store knows about the given key
    pub fn has(&self, key: &str) -> bool {
        self.settings.lock().contains_key(key)
    }

    /// Returns a list of keys that matches the given search string (can use ? and *) for search
    /// wildcards.
    pub fn find(&self, search: &str) -> Vec<String> {
        let search = WildMatch::new(search);

        self.setting_keys
            .iter()
            .filter(|key| search.matches(key))
            .cloned()
            .collect()
    }

    /// Retrieves information about the given key, or returns None when key is unknown
    pub fn get_info(&self, key: &str) -> Option<SettingInfo> {
        self.settings_info.get(key).cloned()
    }

    /// Returns the setting with the given key. If the setting is not found in the current
    /// store, it will load the key from the storage. If the key is still not found, it will
    /// return the default value for the given key, or `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<Setting> {
        if let Some(setting) = self.settings.lock().get(key) {
            return Some(setting.clone());
        }

        // Setting not found, try and load it from the storage adapter
        if let Some(setting) = self.storage.get(key) {
            self.settings.lock().insert(key.to_string(), setting.clone());
            return Some(setting);
        }

        if let Some(info) = self.settings_info.get(key) {
            return Some(info.default.clone());
        }

        warn!("config: Setting {key} is not known");
        None
    }

    /// Sets the given setting to the given value. Will persist the setting to the
    /// storage. Note that the setting MUST have a settings-info entry of the same type,
    /// otherwise this function will not store the setting.
    pub fn set(&self, key: &str, value: Setting) {
        if !self.accepts(key, &value) {
            return;
        }

        self.settings.lock().insert(key.to_owned(), value.clone());
        self.storage.set(key, value);
    }

    /// Restores every setting to its compiled-in default
    pub fn reset(&self) {
        let mut settings = self.settings.lock();
        for (key, info) in &self.settings_info {
            settings.insert(key.clone(), info.default.clone());
        }
    }

    fn accepts(&self, key: &str, value: &Setting) -> bool {
        let Some(info) = self.settings_info.get(key) else {
            warn!("config: Setting {key} is not known");
            return false;
        };

        if mem::discriminant(&info.default) != mem::discriminant(value) {
            warn!("config: Setting {key} is of different type than setting expects");
            return false;
        }

        true
    }

    /// Populates the settings in the store from the settings.json file
    fn populate_default_settings(&mut self) -> Result<()> {
        let json_data: Value = serde_json::from_str(SETTINGS_JSON).map_err(Error::from)?;

        if let Value::Object(data) = json_data {
            for (section_prefix, section_entries) in data {
                let section_entries: Vec<JsonEntry> =
                    serde_json::from_value(section_entries).map_err(Error::from)?;

                for entry in section_entries {
                    let key = format!("{}.{}", section_prefix, entry.key);

                    let info = SettingInfo {
                        key: key.clone(),
                        description: entry.description,
                        default: Setting::from_str(&entry.default)?,
                    };

                    self.setting_keys.push(key.clone());
                    self.settings.lock().insert(key.clone(), info.default.clone());
                    self.settings_info.insert(key, info);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use storage::MemoryStorageAdapter;

    #[test]
    fn defaults_are_loaded() {
        let store = ConfigStore::default();

        assert_eq!(store.get("fonts.load_system_fonts"), Some(Setting::Bool(true)));
        assert_eq!(
            store.get("render.shape_rendering"),
            Some(Setting::String("geometric_precision".into()))
        );
        assert_eq!(store.get("document.default_width"), Some(Setting::UInt(100)));
        assert_eq!(store.find("limits.*").len(), 2);
        assert!(store.get_info("render.dpi").is_some());
    }

    #[test]
    fn set_and_reset() {
        let store = ConfigStore::default();

        store.set("render.dpi", Setting::UInt(144));
        assert_eq!(store.get("render.dpi"), Some(Setting::UInt(144)));

        store.reset();
        assert_eq!(store.get("render.dpi"), Some(Setting::UInt(96)));
    }

    #[test]
    fn storage_overrides_defaults() {
        let adapter = MemoryStorageAdapter::new();
        adapter.set("limits.max_dimension", Setting::UInt(512));
        adapter.set("limits.unknown", Setting::UInt(1));

        let mut store = ConfigStore::default();
        store.set_storage(Box::new(adapter));

        assert_eq!(store.get("limits.max_dimension"), Some(Setting::UInt(512)));
        assert!(!store.has("limits.unknown"));
    }

    #[test]
    fn invalid_setting() {
        testing_logger::setup();

        let store = ConfigStore::default();
        store.set("render.dpi", Setting::String("wont accept strings".into()));

        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(captured_logs[0].level, log::Level::Warn);
        });
        assert_eq!(store.get("render.dpi"), Some(Setting::UInt(96)));
    }

    #[test]
    fn unknown_key() {
        let store = ConfigStore::default();
        assert_eq!(store.get("this.key.doesnt.exist"), None);
    }

    #[test]
    fn macro_usage() {
        config_set!(uint "document.default_height", 240);
        let height = config!(uint "document.default_height");
        assert_eq!(height, 240);

        assert_eq!(config!(string "this.key.doesnt.exist"), "");
        config_store().reset();
    }
}
