//! Simple configuration persistence for Kadence
//!
//! Stores the last analyzed folder, the batch worker count and optional
//! overrides for the analysis parameters.

use kadence_analysis::{AnalysisConfig, ProfileSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// Last folder that was analyzed
    pub last_folder: Option<PathBuf>,
    /// Batch worker threads, `None` for one per core
    pub workers: Option<usize>,

    // Analysis overrides, unset fields keep the AnalysisConfig value
    pub profile_set: Option<ProfileSet>,
    pub bins_per_octave: Option<u32>,
    pub window_seconds: Option<f64>,
    pub step_seconds: Option<f64>,
    pub terminal_seconds: Option<f64>,
    pub edge_weight: Option<f32>,
    pub modulation_share_threshold: Option<f32>,
    pub resolve_modulation_globally: Option<bool>,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kadence")
            .join("config.txt")
    }

    /// Overlay the stored overrides onto `config`
    pub fn apply_to(&self, config: &mut AnalysisConfig) {
        if let Some(profile_set) = self.profile_set {
            config.profile_set = profile_set;
        }
        if let Some(bins) = self.bins_per_octave {
            config.bins_per_octave = bins;
        }
        if let Some(secs) = self.window_seconds {
            config.window_seconds = secs;
        }
        if let Some(secs) = self.step_seconds {
            config.step_seconds = secs;
        }
        if let Some(secs) = self.terminal_seconds {
            config.terminal_seconds = secs;
        }
        if let Some(weight) = self.edge_weight {
            config.edge_weight = weight;
        }
        if let Some(threshold) = self.modulation_share_threshold {
            config.modulation_share_threshold = threshold;
        }
        if let Some(resolve) = self.resolve_modulation_globally {
            config.resolve_modulation_globally = resolve;
        }
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(line, "Ignoring config line without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "last_folder" => config.last_folder = Some(PathBuf::from(value)),
                "workers" => config.workers = parse_value(key, value).filter(|&n: &usize| n > 0),
                "profile_set" => {
                    config.profile_set = ProfileSet::parse(value);
                    if config.profile_set.is_none() {
                        tracing::warn!(key, value, "Invalid config value");
                    }
                }
                "bins_per_octave" => config.bins_per_octave = parse_value(key, value),
                "window_seconds" => config.window_seconds = parse_value(key, value),
                "step_seconds" => config.step_seconds = parse_value(key, value),
                "terminal_seconds" => config.terminal_seconds = parse_value(key, value),
                "edge_weight" => config.edge_weight = parse_value(key, value),
                "modulation_share_threshold" => config.modulation_share_threshold = parse_value(key, value),
                "resolve_modulation_globally" => config.resolve_modulation_globally = parse_value(key, value),
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# Kadence Configuration".to_string()];

        if let Some(ref folder) = self.last_folder {
            lines.push(format!("last_folder={}", folder.display()));
        }
        if let Some(workers) = self.workers {
            lines.push(format!("workers={workers}"));
        }
        if let Some(profile_set) = self.profile_set {
            let name = match profile_set {
                ProfileSet::Classical => "classical",
                ProfileSet::Triad => "triad",
                ProfileSet::Blend => "blend",
                ProfileSet::Electronic => "electronic",
            };
            lines.push(format!("profile_set={name}"));
        }
        push_value(&mut lines, "bins_per_octave", self.bins_per_octave);
        push_value(&mut lines, "window_seconds", self.window_seconds);
        push_value(&mut lines, "step_seconds", self.step_seconds);
        push_value(&mut lines, "terminal_seconds", self.terminal_seconds);
        push_value(&mut lines, "edge_weight", self.edge_weight);
        push_value(&mut lines, "modulation_share_threshold", self.modulation_share_threshold);
        push_value(&mut lines, "resolve_modulation_globally", self.resolve_modulation_globally);

        lines.join("\n")
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value, "Invalid config value");
    }
    parsed
}

fn push_value<T: std::fmt::Display>(lines: &mut Vec<String>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        lines.push(format!("{key}={value}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_with_comments() {
        let content = "# Comment\nlast_folder=/music\n# Another comment\nworkers=3";
        let config = Config::parse(content);
        assert_eq!(config.last_folder, Some(PathBuf::from("/music")));
        assert_eq!(config.workers, Some(3));
    }

    #[test]
    fn test_invalid_and_unknown_values_skipped() {
        let content = "workers=many\nwindow_seconds=abc\nprofile_set=jazz\ncolor=red\nno equals sign\nstep_seconds=2.5";
        let config = Config::parse(content);
        assert_eq!(config.workers, None);
        assert_eq!(config.window_seconds, None);
        assert_eq!(config.profile_set, None);
        assert_eq!(config.step_seconds, Some(2.5));

        assert_eq!(Config::parse("workers=0").workers, None);
    }

    #[test]
    fn test_apply_to_analysis_config() {
        let config = Config::parse(
            "profile_set=Blend\nbins_per_octave=12\nmodulation_share_threshold=0.4\nresolve_modulation_globally=false",
        );
        let mut analysis = AnalysisConfig::default();
        config.apply_to(&mut analysis);

        assert_eq!(analysis.profile_set, ProfileSet::Blend);
        assert_eq!(analysis.bins_per_octave, 12);
        assert_eq!(analysis.modulation_share_threshold, 0.4);
        assert!(!analysis.resolve_modulation_globally);
        assert_eq!(analysis.window_seconds, AnalysisConfig::default().window_seconds);
        assert!(analysis.validate().is_ok());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            last_folder: Some(PathBuf::from("/test/path")),
            workers: Some(2),
            profile_set: Some(ProfileSet::Electronic),
            window_seconds: Some(8.0),
            edge_weight: Some(1.5),
            resolve_modulation_globally: Some(true),
            ..Default::default()
        };
        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("kadence-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.txt");
        let config = Config {
            last_folder: Some(PathBuf::from("/crates")),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert!(Config::load_from(&dir.join("missing.txt")).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
