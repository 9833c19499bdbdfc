// SPDX-FileCopyrightText: 2026 Coffer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Every figment failure becomes one [`ConfigError`]. The provider that
//! supplied the failing key is read from the error's [`Metadata`]: a TOML file
//! is re-read so the key or value can be labelled in place, an environment
//! override is named by its variable.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use std::ops::Range;
use std::path::PathBuf;

use figment::error::Kind;
use figment::{Metadata, Source};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// Display name for configuration passed in as a string.
const INLINE_SOURCE_NAME: &str = "<inline>";

/// A configuration error with enough context for miette to render it.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no section declares.
    #[error("unknown key `{key}` in {}", section_label(.section))]
    #[diagnostic(
        code(coffer::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Dotted section path; empty for top-level keys.
        section: String,
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        #[label("not recognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type or outside the accepted values.
    #[error("`{key}` {problem}")]
    #[diagnostic(code(coffer::config::invalid_value), help("{origin}"))]
    InvalidValue {
        /// Dotted key path, e.g. `storage.busy_timeout_ms`.
        key: String,
        problem: String,
        /// Where the value was set.
        origin: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(coffer::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(coffer::config::other))]
    Other(String),
}

fn section_label(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// The provider a failing key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    File(PathBuf),
    Env,
    Inline,
    Unknown,
}

impl Origin {
    fn of(metadata: Option<&Metadata>) -> Self {
        let Some(md) = metadata else {
            return Origin::Unknown;
        };
        match &md.source {
            Some(Source::File(path)) => Origin::File(path.clone()),
            _ if md.name.contains("environment variable") => Origin::Env,
            _ if md.name.contains("source string") => Origin::Inline,
            _ => Origin::Unknown,
        }
    }

    fn describe(&self, path: &[String]) -> String {
        match self {
            Origin::File(file) => format!("set in {}", file.display()),
            Origin::Env => format!(
                "set by the {} environment variable",
                loader::env_var_name(path)
            ),
            Origin::Inline => "set in the inline configuration".to_string(),
            Origin::Unknown => "check where this key is set".to_string(),
        }
    }

    /// The document the key was read from, if it can be shown.
    fn document(&self, inline: Option<&str>) -> Option<(String, String)> {
        match self {
            Origin::File(file) => std::fs::read_to_string(file)
                .ok()
                .map(|content| (file.display().to_string(), content)),
            Origin::Inline => {
                inline.map(|content| (INLINE_SOURCE_NAME.to_string(), content.to_string()))
            }
            Origin::Env | Origin::Unknown => None,
        }
    }
}

/// Convert a `figment::Error` into one `ConfigError` per underlying failure.
///
/// `inline` is the TOML text when the configuration was loaded from a string;
/// file-backed errors are located by re-reading the file named in the metadata.
pub fn figment_to_config_errors(err: figment::Error, inline: Option<&str>) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert_one(&error, inline))
        .collect()
}

fn convert_one(error: &figment::Error, inline: Option<&str>) -> ConfigError {
    let origin = Origin::of(error.metadata.as_ref());
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let section = &error.path[..];
            let (span, src) = labelled(&origin, inline, section, field, |loc| loc.key);
            ConfigError::UnknownKey {
                section: section.join("."),
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::InvalidType(actual, expected) => invalid_value(
            error,
            &origin,
            inline,
            format!("has the wrong type: found {actual}, expected {expected}"),
        ),
        Kind::InvalidValue(actual, expected) => invalid_value(
            error,
            &origin,
            inline,
            format!("has an invalid value: found {actual}, expected {expected}"),
        ),
        _ => ConfigError::Other(error.to_string()),
    }
}

fn invalid_value(
    error: &figment::Error,
    origin: &Origin,
    inline: Option<&str>,
    problem: String,
) -> ConfigError {
    let (span, src) = match error.path.split_last() {
        Some((key, section)) => labelled(origin, inline, section, key, |loc| loc.value),
        None => (None, None),
    };
    ConfigError::InvalidValue {
        key: error.path.join("."),
        problem,
        origin: origin.describe(&error.path),
        span,
        src,
    }
}

/// Span and source document for `key` in `section`, choosing the key or value range with `pick`.
fn labelled(
    origin: &Origin,
    inline: Option<&str>,
    section: &[String],
    key: &str,
    pick: impl Fn(KeyLocation) -> Range<usize>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((name, content)) = origin.document(inline) else {
        return (None, None);
    };
    match locate_key(&content, section, key) {
        Some(location) => (
            Some(SourceSpan::from(pick(location))),
            Some(NamedSource::new(name, content)),
        ),
        None => (None, None),
    }
}

/// Byte ranges of one `key = value` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyLocation {
    key: Range<usize>,
    value: Range<usize>,
}

/// Find `key = ...` inside the `[section]` table of a TOML document.
///
/// Tracks the current table header line by line, so a key of the same name
/// under another table is never matched. An empty `section` means top level.
fn locate_key(content: &str, section: &[String], key: &str) -> Option<KeyLocation> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut line_start = 0;

    for line in content.split_inclusive('\n') {
        let start = line_start;
        line_start += line.len();

        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = header.trim().to_string();
            continue;
        }
        if current != wanted {
            continue;
        }

        let body = line.trim_start();
        let Some(after_key) = body.strip_prefix(key) else {
            continue;
        };
        let Some(after_eq) = after_key.trim_start().strip_prefix('=') else {
            continue;
        };

        let key_start = start + (line.len() - body.len());
        let value = after_eq.trim();
        let value_start = start + (line.len() - after_eq.trim_start().len());
        return Some(KeyLocation {
            key: key_start..key_start + key.len(),
            value: value_start..value_start + value.len(),
        });
    }
    None
}

/// Best Jaro-Winkler match for `unknown` among `valid_keys`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_config_from_path, load_config_from_str};

    fn section(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    #[test]
    fn suggests_transposed_and_misspelled_keys() {
        let vault = &["master_passphrase", "admin_token", "key_share_count"];
        assert_eq!(suggest_key("admin_tokne", vault).as_deref(), Some("admin_token"));

        let storage = &["database_path", "busy_timeout_ms"];
        assert_eq!(suggest_key("databse_path", storage).as_deref(), Some("database_path"));
        assert_eq!(suggest_key("qqqqqqqq", &["level"]), None);
    }

    #[test]
    fn locate_key_stays_inside_its_table() {
        let content = "[vault]\nlevel = 1\n\n[logging]\nlevel = \"loud\"\n";
        let loc = locate_key(content, &section("logging"), "level").unwrap();
        assert_eq!(&content[loc.key.clone()], "level");
        assert_eq!(&content[loc.value], "\"loud\"");
        assert!(loc.key.start > content.find("[logging]").unwrap());

        assert_eq!(locate_key(content, &section("storage"), "level"), None);
    }

    #[test]
    fn locate_key_does_not_match_key_prefixes() {
        let content = "[vault]\nadmin_token_old = \"a\"\n  admin_token\t=  \"b\"\n";
        let loc = locate_key(content, &section("vault"), "admin_token").unwrap();
        assert_eq!(&content[loc.value], "\"b\"");
    }

    #[test]
    fn locate_key_finds_top_level_keys() {
        let content = "server = 1\n[storage]\nserver = 2\n";
        let loc = locate_key(content, &[], "server").unwrap();
        assert_eq!(loc.key, 0..6);
        assert_eq!(&content[loc.value], "1");
    }

    #[test]
    fn inline_type_error_labels_the_value() {
        let toml = "[storage]\nbusy_timeout_ms = \"soon\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        let errors = figment_to_config_errors(err, Some(toml));

        match &errors[0] {
            ConfigError::InvalidValue {
                key,
                origin,
                span: Some(span),
                src: Some(_),
                ..
            } => {
                assert_eq!(key, "storage.busy_timeout_ms");
                assert_eq!(origin, "set in the inline configuration");
                assert_eq!(&toml[span.offset()..span.offset() + span.len()], "\"soon\"");
            }
            other => panic!("expected a located InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn file_errors_are_located_through_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coffer.toml");
        let content = "[logging]\nlevel = \"info\"\n\n[vault]\nkey_share_count = \"two\"\n";
        std::fs::write(&path, content).unwrap();

        let err = load_config_from_path(&path).unwrap_err();
        let errors = figment_to_config_errors(err, None);

        match &errors[0] {
            ConfigError::InvalidValue {
                origin,
                span: Some(span),
                src: Some(_),
                ..
            } => {
                assert!(origin.contains("coffer.toml"), "got {origin}");
                assert_eq!(&content[span.offset()..span.offset() + span.len()], "\"two\"");
            }
            other => panic!("expected a located InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn origin_describes_environment_overrides() {
        let path = vec!["storage".to_string(), "busy_timeout_ms".to_string()];
        assert_eq!(
            Origin::Env.describe(&path),
            "set by the COFFER_STORAGE_BUSY_TIMEOUT_MS environment variable"
        );
        assert_eq!(Origin::Env.document(Some("ignored")), None);
    }
}
