use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

/// Which metadata lines the cover cards render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub pages: bool,
    pub parodies: bool,
    pub characters: bool,
    pub tags: bool,
    pub artists: bool,
    pub languages: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            pages: true,
            parodies: true,
            characters: true,
            tags: true,
            artists: true,
            languages: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    /// Pages viewed before a gallery counts as read. At least 1.
    pub min_pages: u32,
    /// Percentage of the gallery viewed before it counts as read, 0-100.
    pub min_percent: u8,
    /// Suspend history recording entirely.
    pub pause_history: bool,
    /// Show the recording indicator while a read is being tracked.
    pub show_record_icon: bool,
    /// How many recent reads the stats page preloads for facet drill-downs.
    pub search_entry_count: u32,
    pub display: DisplaySettings,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            min_pages: 3,
            min_percent: 50,
            pause_history: false,
            show_record_icon: true,
            search_entry_count: 500,
            display: DisplaySettings::default(),
        }
    }
}

impl ReaderSettings {
    fn clamped(mut self) -> Self {
        self.min_pages = self.min_pages.max(1);
        self.min_percent = self.min_percent.min(100);
        self
    }

    /// Whether enough of a gallery was viewed to record a read. Applied
    /// by the caller before invoking the engine, never by the engine
    /// itself.
    pub fn meets_read_threshold(&self, pages_viewed: u32, total_pages: u32) -> bool {
        if total_pages == 0 {
            return false;
        }
        let percent = pages_viewed.saturating_mul(100) / total_pages;
        pages_viewed >= self.min_pages || percent >= u32::from(self.min_percent)
    }
}

/// Partial update from the settings form; unset fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub min_pages: Option<u32>,
    pub min_percent: Option<u8>,
    pub pause_history: Option<bool>,
    pub show_record_icon: Option<bool>,
    pub search_entry_count: Option<u32>,
    pub display: Option<DisplaySettings>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ReaderSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<ReaderSettings>(&contents)
                .unwrap_or_default()
                .clamped()
        } else {
            ReaderSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> ReaderSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, patch: SettingsPatch) -> Result<ReaderSettings> {
        let mut guard = self.data.write().unwrap();
        let mut next = guard.clone();

        if let Some(min_pages) = patch.min_pages {
            next.min_pages = min_pages;
        }
        if let Some(min_percent) = patch.min_percent {
            next.min_percent = min_percent;
        }
        if let Some(pause_history) = patch.pause_history {
            next.pause_history = pause_history;
        }
        if let Some(show_record_icon) = patch.show_record_icon {
            next.show_record_icon = show_record_icon;
        }
        if let Some(search_entry_count) = patch.search_entry_count {
            next.search_entry_count = search_entry_count;
        }
        if let Some(display) = patch.display {
            next.display = display;
        }

        let next = next.clamped();
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn persist(&self, data: &ReaderSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("kiroku-{name}-{}.json", uuid::Uuid::new_v4()))
    }

    fn cleanup(path: &Path) {
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("defaults");
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.current(), ReaderSettings::default());
        cleanup(&path);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.current(), ReaderSettings::default());
        cleanup(&path);
    }

    #[test]
    fn patch_persists_and_reloads() {
        let path = temp_path("patch");
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(SettingsPatch {
                min_pages: Some(5),
                pause_history: Some(true),
                ..SettingsPatch::default()
            })
            .unwrap();

        let reloaded = SettingsStore::new(path.clone()).unwrap();
        let settings = reloaded.current();
        assert_eq!(settings.min_pages, 5);
        assert!(settings.pause_history);
        assert_eq!(settings.min_percent, ReaderSettings::default().min_percent);
        cleanup(&path);
    }

    #[test]
    fn updates_are_clamped() {
        let path = temp_path("clamp");
        let store = SettingsStore::new(path.clone()).unwrap();
        let settings = store
            .update(SettingsPatch {
                min_pages: Some(0),
                min_percent: Some(250),
                ..SettingsPatch::default()
            })
            .unwrap();

        assert_eq!(settings.min_pages, 1);
        assert_eq!(settings.min_percent, 100);
        cleanup(&path);
    }

    #[test]
    fn read_threshold_takes_either_limit() {
        let settings = ReaderSettings {
            min_pages: 5,
            min_percent: 50,
            ..ReaderSettings::default()
        };

        assert!(settings.meets_read_threshold(5, 100));
        assert!(settings.meets_read_threshold(2, 4));
        assert!(!settings.meets_read_threshold(2, 100));
        assert!(!settings.meets_read_threshold(0, 0));
    }
}
