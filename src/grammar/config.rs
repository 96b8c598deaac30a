//! Configuration loading
//!
//!     `defaults/codeshape.default.toml` is embedded into the crate, so the documented
//!     defaults and the runtime behavior cannot drift apart. Callers layer their own
//!     sources on top with [`Loader`], in this order:
//!         1. embedded defaults
//!         2. user files (`with_file` / `with_optional_file`)
//!         3. `CODESHAPE_*` environment variables (`with_env`), `__` separating sections,
//!            e.g. `CODESHAPE_PARSING__TAB_WIDTH=8`
//!         4. explicit overrides (`set_override`), typically from the command line
//!
//!     The parser itself only sees [`ParseOptions`], the parsing slice of the config.

use crate::grammar::error::{GrammarError, Result};
use crate::grammar::formats::Format;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, ValueKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../../defaults/codeshape.default.toml");

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CodeshapeConfig {
    pub parsing: ParsingConfig,
    pub limits: LimitsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParsingConfig {
    pub tab_width: usize,
    pub capture_code: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_input_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    pub format: Format,
    pub show_line_numbers: bool,
}

/// Knobs the parser reads. `Default` matches the embedded defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub tab_width: usize,
    pub capture_code: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            tab_width: 4,
            capture_code: true,
        }
    }
}

impl From<&ParsingConfig> for ParseOptions {
    fn from(config: &ParsingConfig) -> Self {
        Self {
            tab_width: config.tab_width.max(1),
            capture_code: config.capture_code,
        }
    }
}

impl CodeshapeConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::from(&self.parsing)
    }
}

impl LimitsConfig {
    /// Read a source file within `max_input_bytes`. Bytes that are not UTF-8 become
    /// U+FFFD rather than failing the read.
    pub fn read_source(&self, path: &Path) -> Result<String> {
        let io_error = |source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_error)?.len() as usize;
        if size > self.max_input_bytes {
            return Err(GrammarError::InputTooLarge {
                size,
                limit: self.max_input_bytes,
            });
        }
        let bytes = std::fs::read(path).map_err(io_error)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Layers configuration sources over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. A missing file is an error at `build`.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer a configuration file if it exists.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `CODESHAPE_*` environment variables.
    pub fn with_env(mut self) -> Self {
        let source = Environment::with_prefix("CODESHAPE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, e.g. `("parsing.tab_width", 8)`.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Apply a `key=value` override as typed on a command line. Integers and booleans are
    /// recognized, anything else is kept as a string.
    pub fn set_assignment(self, assignment: &str) -> Result<Self> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            config::ConfigError::Message(format!("expected key=value, got `{assignment}`"))
        })?;
        let key = key.trim();
        let value = value.trim();
        if let Ok(n) = value.parse::<i64>() {
            self.set_override(key, n)
        } else if let Ok(b) = value.parse::<bool>() {
            self.set_override(key, b)
        } else {
            self.set_override(key, value)
        }
    }

    /// Finalize the layers and deserialize.
    pub fn build(self) -> Result<CodeshapeConfig> {
        Ok(self.builder.build()?.try_deserialize()?)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The embedded defaults alone.
pub fn load_defaults() -> Result<CodeshapeConfig> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.parsing.tab_width, 4);
        assert!(config.parsing.capture_code);
        assert_eq!(config.limits.max_input_bytes, 4 * 1024 * 1024);
        assert_eq!(config.output.format, Format::Treeviz);
        assert!(config.output.show_line_numbers);
    }

    #[test]
    fn test_default_parse_options_match_embedded_defaults() {
        let config = load_defaults().unwrap();
        assert_eq!(config.parse_options(), ParseOptions::default());
    }

    #[test]
    fn test_supports_overrides() {
        let config = Loader::new()
            .set_override("output.format", "json")
            .unwrap()
            .set_assignment("parsing.tab_width=8")
            .unwrap()
            .set_assignment("parsing.capture_code = false")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.output.format, Format::Json);
        assert_eq!(config.parsing.tab_width, 8);
        assert!(!config.parsing.capture_code);
    }

    #[test]
    fn test_bad_assignment_is_config_error() {
        let err = Loader::new().set_assignment("no-equals-sign").unwrap_err();
        assert!(matches!(err, GrammarError::Config(_)));
    }

    #[test]
    fn test_missing_required_file() {
        let err = Loader::new()
            .with_file("/definitely/not/here/codeshape.toml")
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::Config(_)));
    }

    #[test]
    fn test_optional_file_may_be_absent() {
        let config = Loader::new()
            .with_optional_file("/definitely/not/here/codeshape.toml")
            .build()
            .unwrap();
        assert_eq!(config.parsing.tab_width, 4);
    }

    fn scratch_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("codeshape-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_read_source_replaces_invalid_utf8() {
        let path = scratch_file("latin1.py", b"def caf\xe9():\n    pass\n");
        let limits = LimitsConfig {
            max_input_bytes: 1024,
        };
        let source = limits.read_source(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(source, "def caf\u{fffd}():\n    pass\n");
    }

    #[test]
    fn test_read_source_enforces_the_size_limit() {
        let path = scratch_file("big.rs", b"fn main() {}\n");
        let limits = LimitsConfig { max_input_bytes: 4 };
        let err = limits.read_source(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, GrammarError::InputTooLarge { size: 13, limit: 4 }));

        let missing = limits.read_source(Path::new("/definitely/not/here.rs")).unwrap_err();
        assert!(matches!(missing, GrammarError::Io { .. }));
    }

    #[test]
    fn test_tab_width_is_at_least_one() {
        let parsing = ParsingConfig {
            tab_width: 0,
            capture_code: true,
        };
        assert_eq!(ParseOptions::from(&parsing).tab_width, 1);
    }
}
