use std::collections::HashSet;

use log::{debug, info, warn};

use crate::error::PlexError;
use crate::feature::{Feature, LibraryType};
use crate::inspect;
use crate::plex::{ItemKind, Library, MarkerKind, MediaServer, Metadata};
use crate::settings::feature_enabled;

/// Why a library was not traversed for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The library type is in the skip-type list.
    LibraryType,
    /// The library title is in the skip-name list.
    LibraryName,
    /// The feature has no meaning for this kind of library.
    Unsupported,
    /// The server does not generate this artifact for the library.
    FeatureDisabled,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::LibraryType => "library type excluded",
            SkipReason::LibraryName => "library name excluded",
            SkipReason::Unsupported => "not applicable",
            SkipReason::FeatureDisabled => "generation disabled",
        }
    }
}

/// Result of walking one library for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Skipped(SkipReason),
    Audited {
        /// Units inspected (parts, media entries or items, depending on the feature).
        checked: usize,
        /// Units found without the artifact.
        missing: usize,
    },
}

impl WalkOutcome {
    pub fn missing(&self) -> usize {
        match self {
            WalkOutcome::Skipped(_) => 0,
            WalkOutcome::Audited { missing, .. } => *missing,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    checked: usize,
    missing: usize,
}

impl Tally {
    fn add(&mut self, other: Tally) {
        self.checked += other.checked;
        self.missing += other.missing;
    }
}

/// Traverses libraries and runs the inspector on every terminal media unit.
pub struct Walker<'a, S: ?Sized> {
    server: &'a S,
    skip_types: &'a HashSet<LibraryType>,
    skip_names: &'a HashSet<String>,
}

impl<'a, S> Walker<'a, S>
where
    S: MediaServer + ?Sized,
{
    pub fn new(
        server: &'a S,
        skip_types: &'a HashSet<LibraryType>,
        skip_names: &'a HashSet<String>,
    ) -> Self {
        Self {
            server,
            skip_types,
            skip_names,
        }
    }

    /// Audit one library for one feature.
    ///
    /// Skip checks run in a fixed order before any traversal request is
    /// made: type, name, applicability, then the library's remote setting.
    pub async fn walk(&self, library: &Library, feature: Feature) -> Result<WalkOutcome, PlexError> {
        let library_type = library.library_type();

        if let Some(t) = library_type {
            if self.skip_types.contains(&t) {
                info!("Skipping library '{}': type '{}' is excluded", library.title, t);
                return Ok(WalkOutcome::Skipped(SkipReason::LibraryType));
            }
        }

        if self.skip_names.contains(&library.title) {
            info!("Skipping library '{}': name is excluded", library.title);
            return Ok(WalkOutcome::Skipped(SkipReason::LibraryName));
        }

        let library_type = match library_type {
            Some(t) if feature.applies_to(t) => t,
            _ => {
                info!(
                    "Skipping library '{}': {} checks do not apply to '{}' libraries",
                    library.title, feature, library.kind
                );
                return Ok(WalkOutcome::Skipped(SkipReason::Unsupported));
            }
        };

        if !feature_enabled(self.server, library, feature).await? {
            info!(
                "Skipping library '{}': {} generation is disabled for this library",
                library.title, feature
            );
            return Ok(WalkOutcome::Skipped(SkipReason::FeatureDisabled));
        }

        info!("Checking library '{}' for missing {}...", library.title, feature);

        let items = self.server.library_items(library).await?;
        let tally = match library_type {
            LibraryType::Movie => self.walk_movies(&items, feature).await?,
            LibraryType::Show => self.walk_shows(&items, feature).await?,
            LibraryType::Photo => self.walk_albums(items).await?,
        };

        if tally.missing == 0 {
            info!(
                "Library '{}': no missing {} ({} checked)",
                library.title, feature, tally.checked
            );
        } else {
            warn!(
                "Library '{}': {} missing {} ({} checked)",
                library.title, tally.missing, feature, tally.checked
            );
        }

        Ok(WalkOutcome::Audited {
            checked: tally.checked,
            missing: tally.missing,
        })
    }

    async fn walk_movies(&self, items: &[Metadata], feature: Feature) -> Result<Tally, PlexError> {
        let mut tally = Tally::default();
        for movie in items {
            if movie.item_kind() != ItemKind::Movie {
                debug!("Ignoring '{}' ({}) in movie library", movie.title, movie.kind);
                continue;
            }
            let details = self.server.item_details(movie).await?;
            tally.add(inspect_item(feature, &details.label(None), &details));
        }
        Ok(tally)
    }

    async fn walk_shows(&self, items: &[Metadata], feature: Feature) -> Result<Tally, PlexError> {
        let mut tally = Tally::default();
        for show in items {
            if show.item_kind() != ItemKind::Show {
                debug!("Ignoring '{}' ({}) in show library", show.title, show.kind);
                continue;
            }
            let episodes = self.server.episodes(show).await?;
            debug!("Show '{}': {} episode(s)", show.title, episodes.len());
            for episode in &episodes {
                let details = self.server.item_details(episode).await?;
                let label = details.label(Some(show.title.as_str()));
                tally.add(inspect_item(feature, &label, &details));
            }
        }
        Ok(tally)
    }

    /// Depth-first walk over photo albums with an explicit stack.
    ///
    /// Every rating key is visited at most once, so an album that lists
    /// itself (or an ancestor) as a child cannot loop forever.
    async fn walk_albums(&self, items: Vec<Metadata>) -> Result<Tally, PlexError> {
        let mut tally = Tally::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<Metadata> = items.into_iter().rev().collect();

        while let Some(entry) = stack.pop() {
            if !visited.insert(entry.rating_key.clone()) {
                debug!("Already visited '{}' ({}), skipping", entry.title, entry.rating_key);
                continue;
            }
            match entry.item_kind() {
                ItemKind::Clip => {
                    tally.add(inspect_item(Feature::Bif, &entry.title, &entry));
                }
                ItemKind::Photo if entry.is_album() => {
                    let children = self.server.album_children(&entry).await?;
                    debug!("Album '{}': {} child(ren)", entry.title, children.len());
                    stack.extend(children.into_iter().rev());
                }
                _ => {}
            }
        }
        Ok(tally)
    }
}

/// Run the inspector matching `feature` on a fully loaded item.
fn inspect_item(feature: Feature, label: &str, item: &Metadata) -> Tally {
    match feature {
        Feature::Bif => Tally {
            checked: inspect::part_count(&item.media),
            missing: inspect::missing_previews(label, &item.media),
        },
        Feature::VoiceActivity => Tally {
            checked: item.media.len(),
            missing: inspect::missing_voice_activity(label, &item.media),
        },
        Feature::IntroMarker => Tally {
            checked: 1,
            missing: inspect::missing_marker(label, &item.markers, MarkerKind::Intro),
        },
        Feature::CreditsMarker => Tally {
            checked: 1,
            missing: inspect::missing_marker(label, &item.markers, MarkerKind::Credits),
        },
    }
}
