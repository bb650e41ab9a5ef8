//! Emulator options
//!
//! Options come from three layers, later layers winning: built-in defaults, an optional TOML
//! file, and command-line flags that were actually given.

use std::path::{Path, PathBuf};

use clap::{parser::ValueSource, ArgAction, ArgMatches};
use serde::{Deserialize, Serialize};

/// Errors loading or validating options
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmuOptions {
    /// Disable translation and interpret every instruction
    #[arg(long = "no-jit", action = ArgAction::SetFalse)]
    pub jit: bool,

    /// Visits of a block entry before it is compiled
    #[arg(long, default_value_t = DEFAULT_HOT_THRESHOLD)]
    pub hot_threshold: u32,

    /// Maximum instructions per compiled block
    #[arg(long, default_value_t = DEFAULT_MAX_BLOCK_LEN)]
    pub max_block_len: usize,

    /// Compile hot blocks on a worker thread
    #[arg(long)]
    pub background_compile: bool,

    /// Base address of the trap vectors
    #[arg(long, default_value = "0", value_parser = parse_u64)]
    pub trap_vector_base: u64,

    /// Return traps to the caller instead of vectoring to the handler
    #[arg(long)]
    pub stop_on_trap: bool,

    /// Stop after this many driver steps
    #[arg(long)]
    pub max_steps: Option<u64>,
}

pub const DEFAULT_HOT_THRESHOLD: u32 = 50;
pub const DEFAULT_MAX_BLOCK_LEN: usize = 64;

impl Default for EmuOptions {
    fn default() -> Self {
        Self {
            jit: true,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            background_compile: false,
            trap_vector_base: 0,
            stop_on_trap: false,
            max_steps: None,
        }
    }
}

impl EmuOptions {
    /// Load options from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| OptionsError::Io { path: path.to_owned(), source })?;
        Self::from_toml(&content, path)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, OptionsError> {
        let options: EmuOptions = toml::from_str(content)
            .map_err(|source| OptionsError::Parse { path: path.to_owned(), source })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.hot_threshold == 0 {
            return Err(OptionsError::Zero("hot_threshold"));
        }
        if self.max_block_len == 0 {
            return Err(OptionsError::Zero("max_block_len"));
        }
        Ok(())
    }

    /// Take every value of `cli` that was given on the command line
    pub fn override_from(&mut self, cli: &EmuOptions, matches: &ArgMatches) {
        let given = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
        if given("jit") {
            self.jit = cli.jit;
        }
        if given("hot_threshold") {
            self.hot_threshold = cli.hot_threshold;
        }
        if given("max_block_len") {
            self.max_block_len = cli.max_block_len;
        }
        if given("background_compile") {
            self.background_compile = cli.background_compile;
        }
        if given("trap_vector_base") {
            self.trap_vector_base = cli.trap_vector_base;
        }
        if given("stop_on_trap") {
            self.stop_on_trap = cli.stop_on_trap;
        }
        if given("max_steps") {
            self.max_steps = cli.max_steps;
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer
pub fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let options =
            EmuOptions::from_toml("hot_threshold = 3\nstop_on_trap = true\n", Path::new("a.toml"))
                .unwrap();
        assert_eq!(options.hot_threshold, 3);
        assert!(options.stop_on_trap);
        assert!(options.jit);
        assert_eq!(options.max_block_len, DEFAULT_MAX_BLOCK_LEN);
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let path = Path::new("a.toml");
        assert!(matches!(
            EmuOptions::from_toml("max_block_len = 0", path),
            Err(OptionsError::Zero("max_block_len"))
        ));
        assert!(matches!(
            EmuOptions::from_toml("no_such_option = 1", path),
            Err(OptionsError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("0x1_0000"), Ok(0x10000));
        assert_eq!(parse_u64("42"), Ok(42));
        assert!(parse_u64("0xZZ").is_err());
    }
}
