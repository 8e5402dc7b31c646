//! Namespaced configuration paths
//!
//! Provides [`ConfigPath`], the validated key of a configuration file within a
//! controller. The leading segments decide the [`Namespace`] and therefore which
//! validation rules apply to the file's content.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));

/// Required file extension for every configuration document
pub const CONFIG_EXTENSION: &str = "json";

/// Namespace a configuration file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// `gui/pages/<name>.json`
    Page,
    /// `gui/components/<name>.json`
    Component,
    /// `gui/config.json`
    GuiConfig,
    /// `scenes/<name>.json`
    Scene,
}

impl Namespace {
    /// Path prefix shown in diagnostics
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Page => "gui/pages/",
            Namespace::Component => "gui/components/",
            Namespace::GuiConfig => "gui/config",
            Namespace::Scene => "scenes/",
        }
    }
}

/// Path of a configuration file within a controller
///
/// Always relative, `/`-separated, free of `.`/`..` segments and confined to
/// one of the four namespaces.
///
/// # Examples
/// - `gui/pages/main.json` → [`Namespace::Page`], stem `main`
/// - `scenes/movie_night.json` → [`Namespace::Scene`], stem `movie_night`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigPath {
    raw: String,
    namespace: Namespace,
}

impl ConfigPath {
    /// Parse and validate a path
    ///
    /// # Errors
    /// Returns [`PathError`] describing the first violated rule
    pub fn parse(s: &str) -> Result<Self, PathError> {
        s.parse()
    }

    /// Build the path of a page
    ///
    /// # Errors
    /// Returns error if `name` is not a legal file name
    pub fn page(name: &str) -> Result<Self, PathError> {
        format!("gui/pages/{name}.{CONFIG_EXTENSION}").parse()
    }

    /// Build the path of a scene
    ///
    /// # Errors
    /// Returns error if `name` is not a legal file name
    pub fn scene(name: &str) -> Result<Self, PathError> {
        format!("scenes/{name}.{CONFIG_EXTENSION}").parse()
    }

    /// The GUI configuration document
    #[must_use]
    pub fn gui_config() -> Self {
        Self {
            raw: format!("gui/config.{CONFIG_EXTENSION}"),
            namespace: Namespace::GuiConfig,
        }
    }

    /// Namespace of this path
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// File name without extension
    #[must_use]
    pub fn stem(&self) -> &str {
        let file = self.raw.rsplit('/').next().unwrap_or(&self.raw);
        file.strip_suffix(".json").unwrap_or(file)
    }

    /// Path as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path segments, root to leaf
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('/')
    }
}

impl Display for ConfigPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for ConfigPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        if s.starts_with('/') {
            return Err(PathError::Absolute(s.to_string()));
        }
        if s.contains('\\') || s.contains('\0') {
            return Err(PathError::InvalidCharacters(s.to_string()));
        }

        let segments: Vec<&str> = s.split('/').collect();
        for seg in &segments {
            match *seg {
                "" => return Err(PathError::EmptySegment(s.to_string())),
                "." | ".." => return Err(PathError::Traversal(s.to_string())),
                _ => {}
            }
        }

        let file = segments.last().copied().unwrap_or_default();
        let Some(stem) = file.strip_suffix(".json") else {
            return Err(PathError::BadExtension(s.to_string()));
        };
        if !NAME_RE.is_match(stem) {
            return Err(PathError::InvalidName(stem.to_string()));
        }

        let namespace = match segments.as_slice() {
            ["gui", "pages", _] => Namespace::Page,
            ["gui", "components", _] => Namespace::Component,
            ["gui", "config.json"] => Namespace::GuiConfig,
            ["scenes", _] => Namespace::Scene,
            _ => return Err(PathError::OutsideNamespace(s.to_string())),
        };

        Ok(Self {
            raw: s.to_string(),
            namespace,
        })
    }
}

impl TryFrom<String> for ConfigPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigPath> for String {
    fn from(path: ConfigPath) -> Self {
        path.raw
    }
}

/// Errors related to configuration paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty path
    #[error("path is empty")]
    Empty,

    /// Absolute path
    #[error("path must be relative: {0}")]
    Absolute(String),

    /// Backslash or NUL in path
    #[error("path contains invalid characters: {0}")]
    InvalidCharacters(String),

    /// `a//b` style path
    #[error("path contains empty segment: {0}")]
    EmptySegment(String),

    /// `.` or `..` segment
    #[error("path traversal is not allowed: {0}")]
    Traversal(String),

    /// Not a `.json` document
    #[error("path must end in .{CONFIG_EXTENSION}: {0}")]
    BadExtension(String),

    /// File name outside `[A-Za-z0-9_-]`
    #[error("invalid file name: {0} (must be alphanumeric, '_' or '-')")]
    InvalidName(String),

    /// Not under an allowed namespace
    #[error("path outside allowed namespaces (gui/pages/*, gui/components/*, gui/config, scenes/*): {0}")]
    OutsideNamespace(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_each_namespace() {
        assert_eq!(ConfigPath::parse("gui/pages/main.json").unwrap().namespace(), Namespace::Page);
        assert_eq!(
            ConfigPath::parse("gui/components/header.json").unwrap().namespace(),
            Namespace::Component
        );
        assert_eq!(ConfigPath::parse("gui/config.json").unwrap().namespace(), Namespace::GuiConfig);
        assert_eq!(ConfigPath::parse("scenes/movie-night.json").unwrap().namespace(), Namespace::Scene);
    }

    #[test]
    fn stem_strips_directory_and_extension() {
        let path = ConfigPath::page("living_room").unwrap();
        assert_eq!(path.as_str(), "gui/pages/living_room.json");
        assert_eq!(path.stem(), "living_room");
        assert_eq!(ConfigPath::gui_config().stem(), "config");
    }

    #[test]
    fn rejects_traversal() {
        assert!(matches!(
            ConfigPath::parse("gui/pages/../../etc.json"),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(ConfigPath::parse("./scenes/a.json"), Err(PathError::Traversal(_))));
    }

    #[test]
    fn rejects_absolute_and_backslash() {
        assert!(matches!(ConfigPath::parse("/gui/pages/a.json"), Err(PathError::Absolute(_))));
        assert!(matches!(
            ConfigPath::parse("gui\\pages\\a.json"),
            Err(PathError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn rejects_wrong_extension_and_namespace() {
        assert!(matches!(ConfigPath::parse("gui/pages/a.yaml"), Err(PathError::BadExtension(_))));
        assert!(matches!(ConfigPath::parse("drivers/a.json"), Err(PathError::OutsideNamespace(_))));
        assert!(matches!(
            ConfigPath::parse("gui/pages/nested/a.json"),
            Err(PathError::OutsideNamespace(_))
        ));
        assert!(matches!(ConfigPath::parse("gui/pages/a b.json"), Err(PathError::InvalidName(_))));
        assert!(matches!(ConfigPath::parse(""), Err(PathError::Empty)));
    }

    #[test]
    fn serde_uses_plain_string() {
        let path = ConfigPath::scene("evening").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"scenes/evening.json\"");
        let back: ConfigPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<ConfigPath>("\"../x.json\"").is_err());
    }

    proptest! {
        #[test]
        fn any_dotdot_segment_is_rejected(prefix in "[a-z]{1,8}", suffix in "[a-z]{1,8}") {
            let candidate = format!("gui/{prefix}/../{suffix}.json");
            prop_assert!(matches!(ConfigPath::parse(&candidate), Err(PathError::Traversal(_))));
        }

        #[test]
        fn legal_page_names_round_trip(name in "[A-Za-z0-9_-]{1,24}") {
            let path = ConfigPath::page(&name).unwrap();
            prop_assert_eq!(path.stem(), name.as_str());
            prop_assert_eq!(ConfigPath::parse(path.as_str()).unwrap(), path);
        }
    }
}
