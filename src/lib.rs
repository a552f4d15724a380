//! # Logbook
//!
//! A minimal embedded record store: one append-only text log file holding
//! versioned, soft-deletable records, with an in-memory index accelerating
//! point lookups by identifier.
//!
//! Logbook is the persistence layer underneath a content-management use
//! case — articles with a publish date and a soft-delete flag — but its
//! logic is domain-agnostic: store, retrieve, enumerate, and tombstone any
//! JSON-serializable record keyed by a store-assigned unique identifier.
//!
//! ## Key properties
//!
//! - **Append-only** — every write, deletes included, is an append to the
//!   tail of the log. Nothing is ever modified in place, so the full
//!   history of every record stays in the file.
//! - **Soft deletes** — deleting appends a tombstone frame; the identifier
//!   disappears from every read operation while its frames remain.
//! - **Indexed point reads** — an in-memory identifier → byte-offset map,
//!   rebuilt by a linear scan at open, lets `get_by_id` seek straight to a
//!   record instead of replaying the log.
//! - **Last-write-wins scans** — listing and year enumeration replay the
//!   whole log in file order, so the newest frame per identifier decides
//!   the current state.
//! - **Multi-process safe** — a `flock(2)` advisory lock plus an
//!   in-process mutex serialize every operation against the file.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use chrono::{TimeZone, Utc};
//! use logbook::{Article, Logbook};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), logbook::Error> {
//! let store: Logbook<Article> = Logbook::open(Path::new("./content"))?;
//!
//! let published = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
//! let id = store.create(Article::new("Hello, world", "First post.", published))?;
//!
//! if let Some(article) = store.get_by_id(id)? {
//!     println!("{} ({})", article.title, article.published.date_naive());
//! }
//!
//! for year in store.list_years()? {
//!     println!("{year}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage format
//!
//! A store is a directory containing:
//!
//! | File           | Purpose                           |
//! |----------------|-----------------------------------|
//! | `records.log`  | Append-only UTF-8 text log        |
//! | `logbook.lock` | Advisory file lock                |
//!
//! The log is a sequence of frames, each three lines: a separator token, the
//! record identifier, and the serde_json payload (which embeds the same
//! identifier — a mismatch between the two is how corruption is detected):
//!
//! ```text
//! --%0b7c9e4a1f!frame!--
//! 1f0c5a2e-7d4b-4e9a-b1c8-3d6f2a9e8b07
//! {"id":"1f0c5a2e-7d4b-4e9a-b1c8-3d6f2a9e8b07","title":"Hello, world",...}
//! ```
//!
//! The index is ephemeral — rebuilt from `records.log` on each open — and
//! is never written to disk.

pub mod api;
mod constants;
pub mod error;
pub mod storage;
pub mod types;

pub use api::Logbook;
pub use error::{lock_mutex, Error, Result};
pub use types::{Article, Config, DurabilityMode, Record, StoreStats};

#[cfg(test)]
mod tests {
    use super::{Article, Config, DurabilityMode, Error, Logbook};
    use crate::constants::{FRAME_SEPARATOR, LOG_FILENAME};
    use crate::storage::LineReader;
    use chrono::{DateTime, TimeZone, Utc};
    use std::fs::OpenOptions;
    use std::io::{Cursor, Write};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn temp_store() -> (TempDir, Logbook<Article>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Logbook::open(dir.path()).unwrap();
        (dir, store)
    }

    fn log_path(dir: &TempDir) -> PathBuf {
        dir.path().join(LOG_FILENAME)
    }

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn article(title: &str, year: i32) -> Article {
        Article::new(title, format!("{title} body"), date(year, 6, 15))
    }

    /// Append a frame directly to the log file, bypassing the store. Used
    /// to simulate out-of-band writers, corruption, and interrupted
    /// appends.
    fn append_raw_frame(log_path: &Path, id_line: &str, payload: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .unwrap();
        writeln!(file, "{FRAME_SEPARATOR}").unwrap();
        writeln!(file, "{id_line}").unwrap();
        writeln!(file, "{payload}").unwrap();
    }

    // -- line reader ---------------------------------------------------

    #[test]
    fn line_reader_counts_only_consumed_bytes() {
        let data = b"alpha\nbeta\r\ngamma";
        let mut reader = LineReader::new(Cursor::new(&data[..]));

        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("alpha"));
        assert_eq!(reader.position(), 6);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("beta"));
        assert_eq!(reader.position(), 12);

        // A final line without a newline still counts its bytes.
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("gamma"));
        assert_eq!(reader.position(), 17);
        assert!(reader.read_line().unwrap().is_none());
        assert_eq!(reader.position(), 17);
    }

    #[test]
    fn line_reader_seek_discards_read_ahead() {
        let data = b"alpha\nbeta\ngamma\n";
        let mut reader = LineReader::new(Cursor::new(&data[..]));

        // The first read buffers the whole stream internally, but the
        // buffered bytes must not leak into the position or survive a seek.
        reader.read_line().unwrap();
        assert_eq!(reader.position(), 6);

        reader.seek(11).unwrap();
        assert_eq!(reader.position(), 11);
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("gamma"));
        assert_eq!(reader.position(), 17);

        // Seeking backwards works the same way.
        reader.seek(6).unwrap();
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("beta"));
    }

    // -- create / point read -------------------------------------------

    #[test]
    fn create_assigns_identifier_and_round_trips() {
        let (_dir, store) = temp_store();

        let id = store.create(article("A", 2024)).unwrap();
        assert!(!id.is_nil());

        let fetched = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.title, "A");
        assert_eq!(fetched.content, "A body");
        assert_eq!(fetched.published, date(2024, 6, 15));
        assert!(!fetched.is_deleted);
    }

    #[test]
    fn create_rejects_preassigned_identifier_before_io() {
        let (dir, store) = temp_store();

        let mut preset = article("preset", 2024);
        preset.id = Uuid::new_v4();

        let err = store.create(preset).unwrap_err();
        assert!(matches!(err, Error::IdentifierPreassigned(_)));

        // Rejected before any I/O: the log file was never even created.
        assert!(!log_path(&dir).exists());
    }

    #[test]
    fn get_by_id_unknown_returns_none_without_touching_file() {
        let (dir, store) = temp_store();

        assert!(store.get_by_id(Uuid::new_v4()).unwrap().is_none());
        assert!(!log_path(&dir).exists());
    }

    #[test]
    fn identifiers_are_unique_across_creates() {
        let (_dir, store) = temp_store();

        let a = store.create(article("one", 2024)).unwrap();
        let b = store.create(article("two", 2024)).unwrap();
        assert_ne!(a, b);
    }

    // -- delete --------------------------------------------------------

    #[test]
    fn delete_makes_record_invisible_but_keeps_frames() {
        let (dir, store) = temp_store();

        let id = store.create(article("doomed", 2024)).unwrap();
        store.delete_by_id(id).unwrap();

        assert!(store.get_by_id(id).unwrap().is_none());
        assert!(store.list().unwrap().is_empty());

        // The original frame is still physically present in the log.
        let contents = std::fs::read_to_string(log_path(&dir)).unwrap();
        assert!(contents.contains("doomed"));
        assert!(contents.matches(&id.to_string()).count() >= 2);
    }

    #[test]
    fn tombstone_survives_reopen() {
        let (dir, store) = temp_store();

        let kept = store.create(article("kept", 2024)).unwrap();
        let gone = store.create(article("gone", 2023)).unwrap();
        store.delete_by_id(gone).unwrap();
        drop(store);

        let reopened: Logbook<Article> = Logbook::open(dir.path()).unwrap();
        assert!(reopened.get_by_id(kept).unwrap().is_some());
        assert!(reopened.get_by_id(gone).unwrap().is_none());
        assert_eq!(reopened.list().unwrap().len(), 1);
    }

    // -- list / list_years ---------------------------------------------

    #[test]
    fn list_orders_by_timestamp_descending() {
        let (_dir, store) = temp_store();

        store
            .create(Article::new("middle", "m", date(2023, 3, 1)))
            .unwrap();
        store
            .create(Article::new("newest", "n", date(2024, 8, 1)))
            .unwrap();
        store
            .create(Article::new("oldest", "o", date(2021, 1, 1)))
            .unwrap();

        let listed = store.list().unwrap();
        let titles: Vec<&str> = listed.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["newest", "middle", "oldest"]);
    }

    #[test]
    fn list_where_filters_live_records_only() {
        let (_dir, store) = temp_store();

        store.create(article("keep me", 2024)).unwrap();
        store.create(article("drop me", 2023)).unwrap();
        let deleted = store.create(article("keep me too", 2022)).unwrap();
        store.delete_by_id(deleted).unwrap();

        let kept = store.list_where(|a| a.title.starts_with("keep")).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "keep me");

        // Tombstones never reach the predicate, even one asking for them.
        let ghosts = store.list_where(|a| a.is_deleted).unwrap();
        assert!(ghosts.is_empty());
    }

    #[test]
    fn list_years_distinct_descending() {
        let (_dir, store) = temp_store();

        store.create(article("a", 2023)).unwrap();
        store.create(article("b", 2024)).unwrap();
        store.create(article("c", 2024)).unwrap();

        assert_eq!(store.list_years().unwrap(), vec![2024, 2023]);
    }

    #[test]
    fn list_years_tombstone_removes_year() {
        let (_dir, store) = temp_store();

        store.create(article("stays", 2023)).unwrap();
        let solo_2024 = store.create(article("goes", 2024)).unwrap();
        assert_eq!(store.list_years().unwrap(), vec![2024, 2023]);

        store.delete_by_id(solo_2024).unwrap();
        assert_eq!(store.list_years().unwrap(), vec![2023]);
    }

    // -- last write wins -----------------------------------------------

    #[test]
    fn later_frame_overrides_earlier_one() {
        let (dir, store) = temp_store();

        let id = store.create(article("first version", 2024)).unwrap();

        let mut updated = store.get_by_id(id).unwrap().unwrap();
        updated.title = "second version".to_string();
        append_raw_frame(
            &log_path(&dir),
            &id.to_string(),
            &serde_json::to_string(&updated).unwrap(),
        );

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "second version");

        // A fresh index points at the newest frame too.
        let reopened: Logbook<Article> = Logbook::open(dir.path()).unwrap();
        let fetched = reopened.get_by_id(id).unwrap().unwrap();
        assert_eq!(fetched.title, "second version");
    }

    // -- index reconstruction ------------------------------------------

    #[test]
    fn rebuilt_index_matches_incrementally_maintained_one() {
        let (dir, store) = temp_store();

        let a = store.create(article("a", 2022)).unwrap();
        let b = store.create(article("b", 2023)).unwrap();
        let c = store.create(article("c", 2024)).unwrap();
        store.delete_by_id(b).unwrap();

        let reopened: Logbook<Article> = Logbook::open(dir.path()).unwrap();

        assert_eq!(
            store.stats().unwrap().live_records,
            reopened.stats().unwrap().live_records
        );
        for id in [a, c] {
            assert_eq!(
                store.get_by_id(id).unwrap(),
                reopened.get_by_id(id).unwrap()
            );
        }
        assert!(reopened.get_by_id(b).unwrap().is_none());
    }

    #[test]
    fn multi_line_payload_decodes_as_one_record() {
        let (dir, store) = temp_store();
        drop(store);

        // A payload that spans several visually distinct lines is still one
        // logical data unit between the identifier line and the next
        // separator.
        let mut pretty = article("pretty printed", 2022);
        pretty.id = Uuid::new_v4();
        append_raw_frame(
            &log_path(&dir),
            &pretty.id.to_string(),
            &serde_json::to_string_pretty(&pretty).unwrap(),
        );

        let store: Logbook<Article> = Logbook::open(dir.path()).unwrap();
        let fetched = store.get_by_id(pretty.id).unwrap().unwrap();
        assert_eq!(fetched.title, "pretty printed");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    // -- initialize ----------------------------------------------------

    #[test]
    fn initialize_truncates_and_reseeds() {
        let (_dir, store) = temp_store();

        store.create(article("wiped", 2020)).unwrap();

        let mut preset = article("kept preset", 2021);
        let preset_id = Uuid::new_v4();
        preset.id = preset_id;

        store
            .initialize(vec![preset, article("assigned fresh", 2022)])
            .unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(store.list_years().unwrap(), vec![2022, 2021]);

        // A pre-set identifier survives initialize; the other input got a
        // fresh one.
        let kept = store.get_by_id(preset_id).unwrap().unwrap();
        assert_eq!(kept.title, "kept preset");
        assert!(listed.iter().all(|a| !a.id.is_nil()));
    }

    // -- error handling ------------------------------------------------

    #[test]
    fn missing_file_is_an_empty_store() {
        let (dir, store) = temp_store();

        assert!(store.list().unwrap().is_empty());
        assert!(store.list_years().unwrap().is_empty());
        assert!(store.verify().unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.live_records, 0);
        assert_eq!(stats.file_size_bytes, 0);
        assert!(!log_path(&dir).exists());
    }

    #[test]
    fn truncated_trailing_frame_is_skipped() {
        let (dir, store) = temp_store();

        store.create(article("one", 2023)).unwrap();
        let two = store.create(article("two", 2024)).unwrap();

        // Simulate an interrupted append: a separator and identifier line
        // made it to disk, the payload did not.
        let mut file = OpenOptions::new()
            .append(true)
            .open(log_path(&dir))
            .unwrap();
        write!(file, "{FRAME_SEPARATOR}\n{}\n", Uuid::new_v4()).unwrap();
        drop(file);

        assert_eq!(store.list().unwrap().len(), 2);
        assert!(store.get_by_id(two).unwrap().is_some());

        // Rebuilding the index over the truncated tail works too.
        let reopened: Logbook<Article> = Logbook::open(dir.path()).unwrap();
        assert_eq!(reopened.stats().unwrap().live_records, 2);
    }

    #[test]
    fn identifier_mismatch_is_a_fatal_corruption_error() {
        let (dir, store) = temp_store();

        store.create(article("fine", 2023)).unwrap();

        // A complete frame whose identifier line disagrees with the
        // identifier embedded in its payload.
        let mut rogue = article("rogue", 2024);
        rogue.id = Uuid::new_v4();
        append_raw_frame(
            &log_path(&dir),
            &Uuid::new_v4().to_string(),
            &serde_json::to_string(&rogue).unwrap(),
        );

        let err = store.list().unwrap_err();
        assert!(matches!(err, Error::Corruption { .. }));

        assert!(!store.verify().unwrap());
    }

    #[test]
    fn leading_separator_opens_no_frame() {
        let (dir, store) = temp_store();
        drop(store);

        std::fs::write(log_path(&dir), format!("{FRAME_SEPARATOR}\n")).unwrap();
        let store: Logbook<Article> = Logbook::open(dir.path()).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    // -- supplements ---------------------------------------------------

    #[test]
    fn stats_counts_live_records_and_bytes() {
        let (_dir, store) = temp_store();

        store.create(article("a", 2024)).unwrap();
        let b = store.create(article("b", 2024)).unwrap();
        store.delete_by_id(b).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.live_records, 1);
        assert!(stats.file_size_bytes > 0);
    }

    #[test]
    fn relaxed_durability_still_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            durability: DurabilityMode::FlushOnly,
            ..Config::default()
        };
        let store: Logbook<Article> = Logbook::open_with_config(dir.path(), config).unwrap();

        let id = store.create(article("relaxed", 2024)).unwrap();
        assert_eq!(store.get_by_id(id).unwrap().unwrap().title, "relaxed");
    }

    #[test]
    fn article_slug_derived_from_title() {
        let a = Article::new("Hello, World! Again", "body", date(2024, 1, 1));
        assert_eq!(a.slug, "hello-world-again");
    }
}
