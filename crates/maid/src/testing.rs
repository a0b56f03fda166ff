//! In-memory [`MediaServer`] and a log capture used by unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use log::{Level, Log, Metadata as LogMetadata, Record};
use serde_json::Value;

use crate::error::PlexError;
use crate::feature::Feature;
use crate::plex::{Library, Marker, Media, MediaServer, Metadata, Part, Setting};

/// Number of calls made per endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub libraries: usize,
    pub settings: usize,
    pub items: usize,
    pub episodes: usize,
    pub children: usize,
    pub details: usize,
}

impl Calls {
    /// Calls that only happen once a library is actually traversed.
    pub fn traversal(&self) -> usize {
        self.items + self.episodes + self.children + self.details
    }
}

#[derive(Default)]
struct State {
    libraries: Vec<Library>,
    settings: HashMap<String, Vec<Setting>>,
    failing_settings: HashSet<String>,
    failing_libraries: bool,
    items: HashMap<String, Vec<Metadata>>,
    children: HashMap<String, Vec<Metadata>>,
    details: HashMap<String, Metadata>,
    calls: Calls,
}

#[derive(Default)]
pub struct FakeServer {
    state: Mutex<State>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&self, key: &str, title: &str, kind: &str) -> Library {
        let lib = Library {
            key: key.to_string(),
            title: title.to_string(),
            kind: kind.to_string(),
        };
        self.state.lock().unwrap().libraries.push(lib.clone());
        lib
    }

    pub fn set_setting(&self, lib: &Library, id: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        let settings = state.settings.entry(lib.key.clone()).or_default();
        settings.retain(|s| s.id != id);
        settings.push(Setting {
            id: id.to_string(),
            value,
        });
    }

    pub fn enable(&self, lib: &Library, feature: Feature) {
        self.set_setting(lib, feature.setting_id(), Value::Bool(true));
    }

    pub fn fail_settings(&self, lib: &Library) {
        self.state
            .lock()
            .unwrap()
            .failing_settings
            .insert(lib.key.clone());
    }

    pub fn fail_libraries(&self) {
        self.state.lock().unwrap().failing_libraries = true;
    }

    /// Add a top-level item; it is also served by `item_details`.
    pub fn add_item(&self, lib: &Library, item: Metadata) {
        let mut state = self.state.lock().unwrap();
        state.details.insert(item.rating_key.clone(), item.clone());
        state.items.entry(lib.key.clone()).or_default().push(item);
    }

    /// Register episodes of a show or children of an album.
    pub fn add_children(&self, parent_key: &str, children: Vec<Metadata>) {
        let mut state = self.state.lock().unwrap();
        for child in &children {
            state.details.insert(child.rating_key.clone(), child.clone());
        }
        state
            .children
            .entry(parent_key.to_string())
            .or_default()
            .extend(children);
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls
    }
}

fn not_found(what: &str) -> PlexError {
    PlexError::Api {
        status: 404,
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    async fn libraries(&self) -> Result<Vec<Library>, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.libraries += 1;
        if state.failing_libraries {
            return Err(PlexError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(state.libraries.clone())
    }

    async fn library_settings(&self, library: &Library) -> Result<Vec<Setting>, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.settings += 1;
        if state.failing_settings.contains(&library.key) {
            return Err(PlexError::Api {
                status: 500,
                message: "settings unavailable".to_string(),
            });
        }
        Ok(state.settings.get(&library.key).cloned().unwrap_or_default())
    }

    async fn library_items(&self, library: &Library) -> Result<Vec<Metadata>, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.items += 1;
        Ok(state.items.get(&library.key).cloned().unwrap_or_default())
    }

    async fn episodes(&self, show: &Metadata) -> Result<Vec<Metadata>, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.episodes += 1;
        Ok(state.children.get(&show.rating_key).cloned().unwrap_or_default())
    }

    async fn album_children(&self, album: &Metadata) -> Result<Vec<Metadata>, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.children += 1;
        Ok(state.children.get(&album.rating_key).cloned().unwrap_or_default())
    }

    async fn item_details(&self, item: &Metadata) -> Result<Metadata, PlexError> {
        let mut state = self.state.lock().unwrap();
        state.calls.details += 1;
        state
            .details
            .get(&item.rating_key)
            .cloned()
            .ok_or_else(|| not_found(&item.rating_key))
    }
}

pub fn part(file: &str, has_previews: bool) -> Part {
    Part {
        file: Some(file.to_string()),
        indexes: has_previews.then(|| "sd".to_string()),
    }
}

pub fn media(parts: Vec<Part>) -> Media {
    Media {
        video_resolution: Some("1080".to_string()),
        has_voice_activity: true,
        parts,
    }
}

fn item(key: &str, kind: &str, title: &str) -> Metadata {
    Metadata {
        rating_key: key.to_string(),
        kind: kind.to_string(),
        title: title.to_string(),
        ..Default::default()
    }
}

/// A movie with a single media entry holding the given parts.
pub fn movie(key: &str, title: &str, parts: Vec<Part>) -> Metadata {
    Metadata {
        media: vec![media(parts)],
        ..item(key, "movie", title)
    }
}

pub fn show(key: &str, title: &str) -> Metadata {
    item(key, "show", title)
}

pub fn episode(key: &str, show: &str, title: &str, season: i64, number: i64, parts: Vec<Part>) -> Metadata {
    Metadata {
        grandparent_title: Some(show.to_string()),
        parent_index: Some(season),
        index: Some(number),
        media: vec![media(parts)],
        ..item(key, "episode", title)
    }
}

pub fn album(key: &str, title: &str) -> Metadata {
    item(key, "photo", title)
}

pub fn photo(key: &str, title: &str) -> Metadata {
    Metadata {
        media: vec![media(vec![part(&format!("/photos/{}.jpg", title), false)])],
        ..item(key, "photo", title)
    }
}

pub fn clip(key: &str, title: &str, has_previews: bool) -> Metadata {
    Metadata {
        media: vec![media(vec![part(&format!("/photos/{}.mp4", title), has_previews)])],
        ..item(key, "clip", title)
    }
}

pub fn markers(kinds: &[&str]) -> Vec<Marker> {
    kinds
        .iter()
        .map(|k| Marker {
            kind: k.to_string(),
        })
        .collect()
}

/// A log record as seen by [`LogCapture`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub level: Level,
    pub target: String,
    pub message: String,
}

thread_local! {
    static RECORDS: RefCell<Vec<Captured>> = const { RefCell::new(Vec::new()) };
}

/// Global logger that keeps records per thread, so parallel tests do not
/// see each other's output.
struct ThreadLogger;

impl Log for ThreadLogger {
    fn enabled(&self, _: &LogMetadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| {
            r.borrow_mut().push(Captured {
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            })
        });
    }

    fn flush(&self) {}
}

static LOGGER: ThreadLogger = ThreadLogger;
static INSTALL: Once = Once::new();

/// Records logged on the current thread since [`LogCapture::start`].
///
/// Only valid for code that runs on the test thread (`#[tokio::test]` uses a
/// current-thread runtime).
pub struct LogCapture;

impl LogCapture {
    pub fn start() -> Self {
        INSTALL.call_once(|| {
            log::set_logger(&LOGGER).expect("no other logger in unit tests");
            log::set_max_level(log::LevelFilter::Trace);
        });
        RECORDS.with(|r| r.borrow_mut().clear());
        LogCapture
    }

    pub fn records(&self) -> Vec<Captured> {
        RECORDS.with(|r| r.borrow().clone())
    }

    /// Records emitted from `module` (e.g. `maid::walker`).
    pub fn from(&self, module: &str) -> Vec<Captured> {
        self.records()
            .into_iter()
            .filter(|c| c.target == module)
            .collect()
    }

    pub fn at(&self, level: Level) -> Vec<Captured> {
        self.records()
            .into_iter()
            .filter(|c| c.level == level)
            .collect()
    }
}
