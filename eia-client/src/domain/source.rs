use std::fmt;

use serde::{Deserialize, Serialize};

/// Generation source category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCategory {
    Solar,
    Wind,
    Hydro,
    Other,
}

impl SourceCategory {
    pub const ALL: [SourceCategory; 4] = [Self::Solar, Self::Wind, Self::Hydro, Self::Other];

    /// EIA `energy_source_code` values retrieved for this category.
    pub fn provider_codes(self) -> &'static [&'static str] {
        match self {
            Self::Solar => &["SUN"],
            Self::Wind => &["WND"],
            Self::Hydro => &["WAT"],
            Self::Other => &["GEO", "WDS", "BIO", "OBG", "OBS"],
        }
    }

    pub fn from_provider_code(code: &str) -> Self {
        match code.trim() {
            "SUN" => Self::Solar,
            "WND" => Self::Wind,
            "WAT" => Self::Hydro,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solar => "SOLAR",
            Self::Wind => "WIND",
            Self::Hydro => "HYDRO",
            Self::Other => "OTHER",
        }
    }

    /// Accepts the category name (any case) or a single-category provider code.
    pub fn parse(text: &str) -> Option<Self> {
        let upper = text.trim().to_ascii_uppercase();
        match upper.as_str() {
            "SOLAR" | "SUN" => Some(Self::Solar),
            "WIND" | "WND" => Some(Self::Wind),
            "HYDRO" | "WAT" => Some(Self::Hydro),
            "OTHER" | "OTH" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
