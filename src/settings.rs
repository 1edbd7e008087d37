use super::ParserError;
use crate::stub::DEFAULT_THRESHOLD;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub site: String,
    pub common: CommonSettings,
    pub custom: CustomSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    /// Pause between requests, in seconds.
    pub delay: f64,
    pub sizing_images: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CustomSettings {
    pub token: String,
    pub unstub: bool,
    pub ru_links: bool,
    pub add_free_publication_date: bool,
    pub stub_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site: String::from("remanga.org"),
            common: CommonSettings::default(),
            custom: CustomSettings::default(),
        }
    }
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            delay: 1.0,
            sizing_images: false,
        }
    }
}

impl Default for CustomSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            unstub: false,
            ru_links: false,
            add_free_publication_date: false,
            stub_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.common.delay.max(0.001))
    }
}
