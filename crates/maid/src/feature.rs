use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An artifact category the audit can check for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Preview (BIF) scrubbing thumbnails.
    Bif,
    VoiceActivity,
    IntroMarker,
    CreditsMarker,
}

impl Feature {
    /// All features, in the order a run evaluates them.
    pub const ALL: [Feature; 4] = [
        Feature::Bif,
        Feature::VoiceActivity,
        Feature::IntroMarker,
        Feature::CreditsMarker,
    ];

    /// Library setting identifier that toggles generation of this artifact on the server.
    pub fn setting_id(self) -> &'static str {
        match self {
            Feature::Bif => "enableBIFGeneration",
            Feature::VoiceActivity => "enableVoiceActivityGeneration",
            Feature::IntroMarker => "enableIntroMarkerGeneration",
            Feature::CreditsMarker => "enableCreditsMarkerGeneration",
        }
    }

    /// Human-readable name used in log lines.
    pub fn describe(self) -> &'static str {
        match self {
            Feature::Bif => "preview thumbnails",
            Feature::VoiceActivity => "voice activity data",
            Feature::IntroMarker => "intro markers",
            Feature::CreditsMarker => "credits markers",
        }
    }

    /// Whether the check makes sense for a library of the given type.
    ///
    /// Photo libraries only carry clips, which have preview thumbnails but
    /// neither voice activity analysis nor markers.
    pub fn applies_to(self, library_type: LibraryType) -> bool {
        match library_type {
            LibraryType::Movie | LibraryType::Show => true,
            LibraryType::Photo => self == Feature::Bif,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The library types the audit understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    Movie,
    Show,
    Photo,
}

impl LibraryType {
    pub fn as_str(self) -> &'static str {
        match self {
            LibraryType::Movie => "movie",
            LibraryType::Show => "show",
            LibraryType::Photo => "photo",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(LibraryType::Movie),
            "show" => Ok(LibraryType::Show),
            "photo" => Ok(LibraryType::Photo),
            _ => Err(ConfigError::InvalidLibraryType(s.trim().to_string())),
        }
    }
}
