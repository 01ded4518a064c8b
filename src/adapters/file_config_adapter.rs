//! INI file configuration adapter.
//!
//! Keys are case-sensitive so that ticker symbols in `[sector_mapper]` keep
//! their spelling.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new_cs();
        config.load(path).map_err(|e| std::io::Error::other(e))?;
        Ok(Self { config })
    }

    /// A configuration with no sections; every lookup falls back to its default.
    pub fn empty() -> Self {
        Self {
            config: Ini::new_cs(),
        }
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn section_entries(&self, section: &str) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|keys| {
                keys.iter()
                    .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.trim().to_string())))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort();
        entries
    }
}
