use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/bant-reader.toml";
const CONFIG_PATH_ENV: &str = "BANT_READER_CONFIG";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub seeds: SeedsConfig,
    pub tag: TagConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct SeedsConfig {
    #[serde(default = "default_seeds_path")]
    pub path: PathBuf,
}

impl Default for SeedsConfig {
    fn default() -> Self {
        Self {
            path: default_seeds_path(),
        }
    }
}

fn default_seeds_path() -> PathBuf {
    PathBuf::from(bant_crypt::seeds::DEFAULT_SEEDS_PATH)
}

#[derive(Debug, Deserialize)]
pub struct TagConfig {
    /// Captured tag to read through the emulated transport.
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Dump destination; stdout when unset.
    pub path: Option<PathBuf>,
}

pub fn parse() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let path = Path::new(&path);

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;

    from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn from_str(raw: &str) -> Result<Config> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = from_str(
            r#"
            [seeds]
            path = "/data/bant_seeds.nfc"

            [tag]
            path = "capture.toml"

            [output]
            path = "dump.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.seeds.path, Path::new("/data/bant_seeds.nfc"));
        assert_eq!(config.tag.path, Path::new("capture.toml"));
        assert_eq!(config.output.path.as_deref(), Some(Path::new("dump.json")));
    }

    #[test]
    fn test_defaults() {
        let config = from_str("[tag]\npath = \"capture.toml\"\n").unwrap();
        assert_eq!(
            config.seeds.path,
            Path::new(bant_crypt::seeds::DEFAULT_SEEDS_PATH)
        );
        assert!(config.output.path.is_none());
    }

    #[test]
    fn test_tag_required() {
        assert!(from_str("[seeds]\npath = \"x\"\n").is_err());
    }
}
