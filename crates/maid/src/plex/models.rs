use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::feature::LibraryType;

/// Every Plex JSON response wraps its payload in a `MediaContainer` object.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: T,
}

/// Payload of `GET /`, used to verify the connection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerIdentity {
    #[serde(rename = "friendlyName")]
    pub friendly_name: Option<String>,
    pub version: Option<String>,
    #[serde(rename = "machineIdentifier")]
    pub machine_identifier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionList {
    #[serde(rename = "Directory", default)]
    pub directories: Vec<Library>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataList {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingList {
    #[serde(rename = "Setting", default)]
    pub settings: Vec<Setting>,
}

/// A library section as listed by `/library/sections`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Library {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Library {
    /// The library type, or `None` for types the audit does not handle (music, ...).
    pub fn library_type(&self) -> Option<LibraryType> {
        self.kind.parse().ok()
    }
}

/// One entry of a library's settings collection.
#[derive(Debug, Clone, Deserialize)]
pub struct Setting {
    pub id: String,
    #[serde(default)]
    pub value: Value,
}

impl Setting {
    pub fn as_bool(&self) -> bool {
        value_as_bool(&self.value)
    }
}

/// Kind of a metadata item, derived from its `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Movie,
    Show,
    Episode,
    /// A photo album or a still image; albums are told apart by having no media.
    Photo,
    Clip,
    Other,
}

/// A library item: movie, show, episode, photo album, photo or clip.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "grandparentTitle")]
    pub grandparent_title: Option<String>,
    #[serde(rename = "parentIndex")]
    pub parent_index: Option<i64>,
    pub index: Option<i64>,
    #[serde(rename = "Media", default)]
    pub media: Vec<Media>,
    #[serde(rename = "Marker", default)]
    pub markers: Vec<Marker>,
}

impl Metadata {
    pub fn item_kind(&self) -> ItemKind {
        match self.kind.as_str() {
            "movie" => ItemKind::Movie,
            "show" => ItemKind::Show,
            "episode" => ItemKind::Episode,
            "photo" => ItemKind::Photo,
            "clip" => ItemKind::Clip,
            _ => ItemKind::Other,
        }
    }

    /// A photo-library entry without media of its own is an album.
    pub fn is_album(&self) -> bool {
        self.item_kind() == ItemKind::Photo && self.media.is_empty()
    }

    /// Label used in diagnostics: `Show - Episode (Season S, Episode E)` for
    /// episodes, the plain title otherwise.
    pub fn label(&self, show_title: Option<&str>) -> String {
        if self.item_kind() != ItemKind::Episode {
            return self.title.clone();
        }
        let show = show_title
            .or(self.grandparent_title.as_deref())
            .unwrap_or("Unknown show");
        format!(
            "{} - {} (Season {}, Episode {})",
            show,
            self.title,
            index_or_unknown(self.parent_index),
            index_or_unknown(self.index)
        )
    }
}

fn index_or_unknown(index: Option<i64>) -> String {
    index.map(|i| i.to_string()).unwrap_or_else(|| "?".to_string())
}

/// One encoded version of an item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Media {
    #[serde(rename = "videoResolution")]
    pub video_resolution: Option<String>,
    #[serde(rename = "hasVoiceActivity", default, deserialize_with = "flexible_bool")]
    pub has_voice_activity: bool,
    #[serde(rename = "Part", default)]
    pub parts: Vec<Part>,
}

/// A file backing a media entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    pub file: Option<String>,
    /// `sd` when the server has generated preview thumbnails for this file.
    pub indexes: Option<String>,
}

impl Part {
    pub fn has_preview_thumbnails(&self) -> bool {
        self.indexes.as_deref() == Some("sd")
    }

    pub fn display_file(&self) -> &str {
        self.file.as_deref().unwrap_or("<unknown file>")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Intro,
    Credits,
}

impl MarkerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerKind::Intro => "intro",
            MarkerKind::Credits => "credits",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Marker {
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Marker {
    pub fn marker_kind(&self) -> Option<MarkerKind> {
        match self.kind.as_str() {
            "intro" => Some(MarkerKind::Intro),
            "credits" => Some(MarkerKind::Credits),
            _ => None,
        }
    }
}

/// Interpret the loosely typed flags Plex returns (`true`, `1`, `"1"`, `"true"`).
pub fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" => true,
            "false" | "no" | "off" | "" => false,
            other => other.parse::<f64>().map(|f| f != 0.0).unwrap_or(false),
        },
        _ => false,
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_bool(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_bool() {
        assert!(value_as_bool(&json!(true)));
        assert!(value_as_bool(&json!(1)));
        assert!(value_as_bool(&json!(-1)));
        assert!(value_as_bool(&json!("1")));
        assert!(value_as_bool(&json!("True")));
        assert!(!value_as_bool(&json!(false)));
        assert!(!value_as_bool(&json!(0)));
        assert!(!value_as_bool(&json!("0")));
        assert!(!value_as_bool(&json!("")));
        assert!(!value_as_bool(&Value::Null));
    }

    #[test]
    fn test_episode_metadata_parsing() {
        let body = json!({
            "MediaContainer": {
                "size": 1,
                "Metadata": [{
                    "ratingKey": "42",
                    "type": "episode",
                    "title": "Pilot",
                    "grandparentTitle": "The Show",
                    "parentIndex": 1,
                    "index": 3,
                    "Media": [{
                        "videoResolution": "1080",
                        "hasVoiceActivity": 1,
                        "Part": [{ "file": "/tv/show/s01e03.mkv", "indexes": "sd" }]
                    }],
                    "Marker": [{ "type": "intro" }, { "type": "commercial" }]
                }]
            }
        });
        let envelope: Envelope<MetadataList> = serde_json::from_value(body).unwrap();
        let episode = &envelope.media_container.metadata[0];

        assert_eq!(episode.item_kind(), ItemKind::Episode);
        assert_eq!(episode.label(None), "The Show - Pilot (Season 1, Episode 3)");
        assert!(episode.media[0].has_voice_activity);
        assert!(episode.media[0].parts[0].has_preview_thumbnails());
        assert_eq!(episode.markers[0].marker_kind(), Some(MarkerKind::Intro));
        assert_eq!(episode.markers[1].marker_kind(), None);
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let body = json!({ "MediaContainer": { "size": 0 } });
        let sections: Envelope<SectionList> = serde_json::from_value(body.clone()).unwrap();
        assert!(sections.media_container.directories.is_empty());
        let settings: Envelope<SettingList> = serde_json::from_value(body).unwrap();
        assert!(settings.media_container.settings.is_empty());
    }

    #[test]
    fn test_album_detection() {
        let album = Metadata {
            rating_key: "1".into(),
            kind: "photo".into(),
            ..Default::default()
        };
        let image = Metadata {
            rating_key: "2".into(),
            kind: "photo".into(),
            media: vec![Media::default()],
            ..Default::default()
        };
        assert!(album.is_album());
        assert!(!image.is_album());
    }
}
