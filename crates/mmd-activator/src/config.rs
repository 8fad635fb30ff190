//! Static configuration handed to the diagram library.

use std::fmt;
use std::str::FromStr;

/// Visual theme of rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Default,
    Neutral,
    Dark,
    Forest,
    Base,
}

impl Theme {
    /// All themes, in the library's documentation order.
    pub const ALL: [Theme; 5] = [
        Self::Default,
        Self::Neutral,
        Self::Dark,
        Self::Forest,
        Self::Base,
    ];

    /// Name as the library spells it.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Neutral => "neutral",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Base => "base",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Theme name not known to the library.
#[derive(Debug, thiserror::Error)]
#[error("unknown theme `{0}` (expected one of: default, neutral, dark, forest, base)")]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s)
            .ok_or_else(|| UnknownTheme(s.to_owned()))
    }
}

/// Options passed to the library's `initialize` call.
///
/// Exactly two options exist:
/// - `start_on_load`: render containers present when the library starts
/// - `theme`: visual styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryConfig {
    pub start_on_load: bool,
    pub theme: Theme,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            start_on_load: true,
            theme: Theme::Default,
        }
    }
}

impl LibraryConfig {
    /// The configuration as the library's JSON object, e.g.
    /// `{"startOnLoad":true,"theme":"default"}`.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "startOnLoad": self.start_on_load,
            "theme": self.theme.as_str(),
        })
        .to_string()
    }
}
