//! Configuration management for G-code document loading.
//!
//! Handles:
//! - Library options for parsing and streaming
//! - An optional TOML configuration file
//! - Command-line argument parsing for `gcode-info`

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::{DocumentError, Result};

/// Default number of instructions kept by a streamed document
pub const DEFAULT_BUFFER_CAPACITY: usize = 128;

/// Files larger than this are streamed instead of loaded
pub const DEFAULT_STREAM_THRESHOLD_BYTES: u64 = 100_000_000;

/// Options controlling how a document is parsed
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Fail on lines with an unrecognized leading character
    pub strict: bool,
    /// Ring buffer size for streamed documents
    pub buffer_capacity: usize,
    /// File size above which [`crate::open`] streams
    pub stream_threshold_bytes: u64,
    /// Always stream, regardless of size
    pub force_streaming: bool,
    /// Layer height reported when nothing better is known
    pub fallback_layer_height: f64,
    /// Instructions per chunk for the parallel analysis passes
    pub parallel_chunk_size: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            strict: false,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            stream_threshold_bytes: DEFAULT_STREAM_THRESHOLD_BYTES,
            force_streaming: false,
            fallback_layer_height: 0.2,
            parallel_chunk_size: 65_536,
        }
    }
}

/// Filament properties used for usage estimates
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilamentSettings {
    /// Diameter in mm
    pub diameter: f64,
    /// Density in g/cm³
    pub density: f64,
}

impl Default for FilamentSettings {
    fn default() -> Self {
        Self {
            diameter: 1.75,
            density: 1.24,
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub document: DocumentOptions,
    pub filament: FilamentSettings,
}

impl FileConfig {
    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DocumentError::Config(e.to_string()))
    }

    /// Read a configuration file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config file at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `<config dir>/gcode-document/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gcode-document").join("config.toml"))
    }
}

/// Command-line arguments for `gcode-info`
#[derive(Debug, Parser)]
#[command(name = "gcode-info")]
#[command(about = "Summarize a G-code file: layers, bounds, filament and print time")]
#[command(version)]
pub struct Args {
    /// G-code file to analyze
    pub file: PathBuf,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, help = "Path to a config.toml")]
    pub config: Option<PathBuf>,

    /// Always use the bounded-memory streaming reader
    #[arg(long)]
    pub stream: bool,

    /// Treat unrecognized lines as errors
    #[arg(long)]
    pub strict: bool,

    /// Filament diameter in mm
    #[arg(long)]
    pub filament_diameter: Option<f64>,

    /// Filament density in g/cm³
    #[arg(long)]
    pub density: Option<f64>,

    /// Ring buffer size for streaming
    #[arg(long)]
    pub buffer_capacity: Option<usize>,

    /// Dump a single instruction as JSON
    #[arg(long)]
    pub line: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub file: PathBuf,
    pub document: DocumentOptions,
    pub filament: FilamentSettings,
    pub line: Option<usize>,
    pub json: bool,
    pub log_level: String,
}

impl Config {
    /// Create configuration from the process arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        let file_config = match args.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => match FileConfig::default_path() {
                Some(path) => FileConfig::load(&path).unwrap_or_else(|e| {
                    log::warn!("ignoring config file {:?}: {}", path, e);
                    FileConfig::default()
                }),
                None => FileConfig::default(),
            },
        };

        Ok(Self::merge(args, file_config))
    }

    /// Command-line values override the file
    pub fn merge(args: Args, file_config: FileConfig) -> Self {
        let FileConfig {
            mut document,
            mut filament,
        } = file_config;

        document.strict |= args.strict;
        document.force_streaming |= args.stream;
        if let Some(capacity) = args.buffer_capacity {
            document.buffer_capacity = capacity;
        }
        if let Some(diameter) = args.filament_diameter {
            filament.diameter = diameter;
        }
        if let Some(density) = args.density {
            filament.density = density;
        }

        Config {
            file: args.file,
            document,
            filament,
            line: args.line,
            json: args.json,
            log_level: args.log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [document]
            buffer_capacity = 256

            [filament]
            diameter = 2.85
            "#,
        )
        .unwrap();
        assert_eq!(config.document.buffer_capacity, 256);
        assert!(!config.document.strict);
        assert_eq!(config.filament.diameter, 2.85);
        assert_eq!(config.filament.density, 1.24);
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let err = FileConfig::from_toml("[document]\nstrict = \"yes\"").unwrap_err();
        assert!(matches!(err, DocumentError::Config(_)));
    }

    #[test]
    fn test_args_override_file() {
        let args = Args::parse_from([
            "gcode-info",
            "part.gcode",
            "--strict",
            "--filament-diameter",
            "2.85",
            "--buffer-capacity",
            "64",
        ]);
        let config = Config::merge(args, FileConfig::default());
        assert!(config.document.strict);
        assert_eq!(config.document.buffer_capacity, 64);
        assert_eq!(config.filament.diameter, 2.85);
        assert_eq!(config.file, PathBuf::from("part.gcode"));
        assert_eq!(config.log_level, "info");
    }
}
