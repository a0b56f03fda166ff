use log::debug;

use crate::error::PlexError;
use crate::feature::Feature;
use crate::plex::{Library, MediaServer};

/// Whether the server is configured to generate `feature` for `library`.
///
/// Fetches the settings collection on every call. A setting that is absent
/// from the collection counts as disabled; a failed fetch is returned to the
/// caller.
pub async fn feature_enabled<S>(
    server: &S,
    library: &Library,
    feature: Feature,
) -> Result<bool, PlexError>
where
    S: MediaServer + ?Sized,
{
    let settings = server.library_settings(library).await?;
    let enabled = settings
        .iter()
        .find(|s| s.id == feature.setting_id())
        .map(|s| s.as_bool())
        .unwrap_or(false);
    debug!(
        "Library '{}': {} = {}",
        library.title,
        feature.setting_id(),
        enabled
    );
    Ok(enabled)
}
