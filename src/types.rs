use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record that can live in the log.
///
/// The store only ever inspects three things about a record: its
/// identifier, its timestamp, and its deleted flag. Everything else is
/// opaque payload, carried through serde_json untouched.
///
/// Implementations must keep the identifier nil until the store assigns
/// one; [`Logbook::create`](crate::Logbook::create) rejects records that
/// arrive with an identifier already set.
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// The record's identifier, or [`Uuid::nil`] before assignment.
    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    /// Timestamp used for ordering and year aggregation.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Whether this record is a tombstone.
    fn is_deleted(&self) -> bool;

    /// A deleted marker for `id` with no meaningful payload. Appended by
    /// [`Logbook::delete_by_id`](crate::Logbook::delete_by_id).
    fn tombstone(id: Uuid) -> Self;
}

/// The content-management record the store was built for: an article with
/// a publish date and a soft-delete flag.
///
/// Only `id`, `published` and `is_deleted` mean anything to the store; the
/// remaining fields ride along as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let slug = slugify(&title);

        Self {
            id: Uuid::nil(),
            title,
            slug,
            excerpt: String::new(),
            content: content.into(),
            published,
            is_deleted: false,
        }
    }
}

impl Record for Article {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.published
    }

    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn tombstone(id: Uuid) -> Self {
        Self {
            id,
            title: String::new(),
            slug: String::new(),
            excerpt: String::new(),
            content: String::new(),
            published: Utc::now(),
            is_deleted: true,
        }
    }
}

/// Lowercased, hyphen-separated form of a title, for stable article URLs.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_was_hyphen = true;

    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Live-record count and on-disk size of a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub live_records: u64,
    pub file_size_bytes: u64,
}

/// Controls how aggressively appends are flushed to durable storage.
///
/// Higher durability means lower risk of data loss on crash but reduced
/// write throughput (due to per-append `fsync`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurabilityMode {
    /// `flush()` + `sync_all()` after every append.
    /// Safest: data reaches durable storage before the operation returns.
    #[default]
    Fsync,

    /// `flush()` only — data reaches the OS page cache but may be lost
    /// on power failure. Good balance of safety and throughput.
    FlushOnly,

    /// No explicit flush or sync. Fastest, but data may be lost on
    /// crash or power failure. Suitable for bulk seeding or ephemeral data.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filename of the log within the store directory.
    pub file_name: String,
    /// Controls write durability. See [`DurabilityMode`] for details.
    pub durability: DurabilityMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_name: crate::constants::LOG_FILENAME.to_string(),
            durability: DurabilityMode::default(),
        }
    }
}
