//! Presence checks for derived artifacts on already-fetched media.
//!
//! Every function returns how many artifacts are missing for its input and
//! logs one warning per miss. A missing artifact is an expected outcome,
//! never an error.

use log::warn;

use crate::plex::{Marker, MarkerKind, Media};

/// Count parts without preview thumbnails, logging each part's file.
pub fn missing_previews(label: &str, media: &[Media]) -> usize {
    let mut missing = 0;
    for part in media.iter().flat_map(|m| m.parts.iter()) {
        if !part.has_preview_thumbnails() {
            warn!(
                "{} is missing preview thumbnails: {}",
                label,
                part.display_file()
            );
            missing += 1;
        }
    }
    missing
}

/// Number of parts a preview check looks at.
pub fn part_count(media: &[Media]) -> usize {
    media.iter().map(|m| m.parts.len()).sum()
}

/// Count media entries without voice activity data.
pub fn missing_voice_activity(label: &str, media: &[Media]) -> usize {
    let mut missing = 0;
    for entry in media {
        if !entry.has_voice_activity {
            warn!(
                "{} ({}) is missing voice activity data",
                label,
                normalize_resolution(entry.video_resolution.as_deref())
            );
            missing += 1;
        }
    }
    missing
}

/// Returns 1 when no marker of `kind` exists, 0 otherwise.
///
/// Other marker kinds and the number of matching markers do not matter.
pub fn missing_marker(label: &str, markers: &[Marker], kind: MarkerKind) -> usize {
    if markers.iter().any(|m| m.marker_kind() == Some(kind)) {
        return 0;
    }
    warn!("{} has no {} marker", label, kind.as_str());
    1
}

/// Normalize a server resolution label for display.
///
/// `4k` becomes `4K`, a bare number gets a `p` suffix (`1080` -> `1080p`),
/// anything else is upper-cased (`sd` -> `SD`).
pub fn normalize_resolution(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return "unknown".to_string(),
    };
    let lower = raw.to_lowercase();

    if let Some(num) = lower.strip_suffix('k') {
        if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
            return format!("{}K", num);
        }
    }
    if let Some(num) = lower.strip_suffix('p') {
        if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
            return lower;
        }
    }
    if lower.chars().all(|c| c.is_ascii_digit()) {
        return format!("{}p", lower);
    }
    raw.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{markers, media, part, LogCapture};
    use log::Level;
    use proptest::prelude::*;

    #[test]
    fn test_missing_previews_counts_false_parts() {
        let m = vec![media(vec![
            part("/movies/a.mkv", true),
            part("/movies/b.mkv", false),
        ])];
        assert_eq!(missing_previews("Movie", &m), 1);
        assert_eq!(part_count(&m), 2);
    }

    #[test]
    fn test_each_missing_part_is_logged_with_its_file() {
        let logs = LogCapture::start();
        let m = vec![
            media(vec![part("/movies/a-cd1.mkv", false), part("/movies/a-cd2.mkv", true)]),
            media(vec![part("/movies/a-4k.mkv", false)]),
        ];
        assert_eq!(missing_previews("Alien", &m), 2);

        let warnings = logs.at(Level::Warn);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0].message,
            "Alien is missing preview thumbnails: /movies/a-cd1.mkv"
        );
        assert!(warnings[1].message.ends_with("/movies/a-4k.mkv"));
    }

    #[test]
    fn test_voice_activity_warning_names_resolution() {
        let logs = LogCapture::start();
        let mut entry = media(vec![part("/a.mkv", true)]);
        entry.has_voice_activity = false;
        entry.video_resolution = Some("sd".to_string());

        assert_eq!(missing_voice_activity("Alien", &[entry]), 1);
        let warnings = logs.at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Alien (SD) is missing voice activity data");
    }

    #[test]
    fn test_missing_previews_across_media_versions() {
        let m = vec![
            media(vec![part("/a-4k.mkv", false)]),
            media(vec![part("/a-1080.mkv", false), part("/a-1080-cd2.mkv", true)]),
        ];
        assert_eq!(missing_previews("Movie", &m), 2);
    }

    #[test]
    fn test_missing_voice_activity() {
        let mut with = media(vec![part("/a.mkv", true)]);
        with.has_voice_activity = true;
        let mut without = media(vec![part("/b.mkv", true)]);
        without.has_voice_activity = false;

        assert_eq!(missing_voice_activity("Movie", &[with.clone()]), 0);
        assert_eq!(missing_voice_activity("Movie", &[with, without]), 1);
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            missing_marker("Ep", &markers(&["intro"]), MarkerKind::Intro),
            0
        );
        assert_eq!(
            missing_marker("Ep", &markers(&["intro"]), MarkerKind::Credits),
            1
        );
        assert_eq!(missing_marker("Ep", &[], MarkerKind::Intro), 1);
        assert_eq!(
            missing_marker("Ep", &markers(&["commercial", "commercial"]), MarkerKind::Intro),
            1
        );
    }

    #[test]
    fn test_normalize_resolution() {
        assert_eq!(normalize_resolution(Some("4k")), "4K");
        assert_eq!(normalize_resolution(Some("8K")), "8K");
        assert_eq!(normalize_resolution(Some("1080")), "1080p");
        assert_eq!(normalize_resolution(Some("720p")), "720p");
        assert_eq!(normalize_resolution(Some("sd")), "SD");
        assert_eq!(normalize_resolution(Some("")), "unknown");
        assert_eq!(normalize_resolution(None), "unknown");
    }

    fn marker_kind_name() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("intro"),
            Just("credits"),
            Just("commercial"),
            Just("chapter"),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A marker check is satisfied by any single matching marker and
        /// otherwise reports exactly one miss, whatever the marker count.
        #[test]
        fn test_marker_check_is_zero_or_one(
            kinds in prop::collection::vec(marker_kind_name(), 0..12),
            want_intro in prop::bool::ANY,
        ) {
            let kind = if want_intro { MarkerKind::Intro } else { MarkerKind::Credits };
            let list = markers(&kinds);
            let has_match = kinds.iter().any(|k| *k == kind.as_str());

            let missing = missing_marker("Ep", &list, kind);
            prop_assert_eq!(missing, if has_match { 0 } else { 1 });
        }

        /// The preview count equals the number of parts flagged false.
        #[test]
        fn test_preview_count_matches_false_flags(
            flags in prop::collection::vec(prop::bool::ANY, 0..20),
        ) {
            let parts = flags
                .iter()
                .enumerate()
                .map(|(i, f)| part(&format!("/f{}.mkv", i), *f))
                .collect();
            let m = vec![media(parts)];
            let expected = flags.iter().filter(|f| !**f).count();
            prop_assert_eq!(missing_previews("Item", &m), expected);
        }
    }
}
