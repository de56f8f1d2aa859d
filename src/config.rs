//! Compiler configuration threaded through code generation.

use crate::codegen::defs::major_versions;
use crate::error::{Error, Result};

/// Settings for one compilation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Class file major version to emit. Records need at least 60.
    pub target_major: u16,
    /// Emit `StackMapTable` attributes.
    pub emit_frames: bool,
    /// Emit `SourceFile` and `LineNumberTable`.
    pub debug: bool,
    /// Keep generating classes when the unit has errors; broken switch
    /// expressions and methods are replaced by code that throws.
    pub generate_on_error: bool,
    /// Name recorded in the `SourceFile` attribute.
    pub source_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_major: major_versions::JAVA_17,
            emit_frames: true,
            debug: false,
            generate_on_error: false,
            source_file: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `RECSWITCH_TARGET`, `RECSWITCH_NO_FRAMES` and
    /// `RECSWITCH_DEBUG`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(target) = std::env::var("RECSWITCH_TARGET") {
            config.target_major = parse_target(&target)?;
        }
        if std::env::var("RECSWITCH_NO_FRAMES").is_ok() {
            config.emit_frames = false;
        }
        if let Ok(flag) = std::env::var("RECSWITCH_DEBUG") {
            config.debug = flag != "0" && !flag.eq_ignore_ascii_case("false");
        }
        Ok(config)
    }

    pub fn with_target(mut self, major: u16) -> Self {
        self.target_major = major;
        self
    }

    pub fn with_source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file = Some(name.into());
        self
    }

    /// `MatchException` replaces `IncompatibleClassChangeError` as the
    /// failure of an exhaustive enum switch from Java 21 on.
    pub fn uses_match_exception(&self) -> bool {
        self.target_major >= major_versions::JAVA_21
    }
}

/// Accepts either a class file major version (`61`) or a release (`17`).
pub fn parse_target(text: &str) -> Result<u16> {
    let value: u16 = text
        .trim()
        .parse()
        .map_err(|_| Error::config_error(format!("invalid target '{}'", text)))?;
    let major = if value < 44 { value + 44 } else { value };
    if major < major_versions::JAVA_16 {
        return Err(Error::config_error(format!(
            "target {} is too old: records need class file version 60 or later",
            text
        )));
    }
    Ok(major)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_and_major_numbers_are_accepted() {
        assert_eq!(parse_target("17").unwrap(), 61);
        assert_eq!(parse_target("61").unwrap(), 61);
        assert_eq!(parse_target("21").unwrap(), 65);
    }

    #[test]
    fn old_targets_are_rejected() {
        assert!(parse_target("8").is_err());
        assert!(parse_target("seventeen").is_err());
    }

    #[test]
    fn match_exception_starts_at_java_21() {
        assert!(!Config::default().uses_match_exception());
        assert!(Config::default().with_target(65).uses_match_exception());
    }
}
