//! SQLite-based feed storage with zstd-compressed story bodies

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use rusqlite_migration::{M, Migrations};

use super::traits::{FeedStore, STORY_RETENTION_DAYS};
use crate::models::{
    Feed, FeedId, FeedSet, Folder, Intelligence, ReadFilter, SocialFeed, Story, StoryHash,
    StoryOrder,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE feeds (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                address TEXT NOT NULL DEFAULT '',
                favicon_url TEXT,
                positive_count INTEGER NOT NULL DEFAULT 0,
                neutral_count INTEGER NOT NULL DEFAULT 0,
                negative_count INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE folders (
                name TEXT PRIMARY KEY,
                position INTEGER NOT NULL DEFAULT 0
            );

            -- Folder membership (many-to-many: a feed may sit in several folders)
            CREATE TABLE folder_feeds (
                folder_name TEXT NOT NULL,
                feed_id TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (folder_name, feed_id),
                FOREIGN KEY (folder_name) REFERENCES folders(name) ON DELETE CASCADE
            );

            CREATE TABLE social_feeds (
                user_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                title TEXT NOT NULL,
                photo_url TEXT,
                positive_count INTEGER NOT NULL DEFAULT 0,
                neutral_count INTEGER NOT NULL DEFAULT 0,
                negative_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE stories (
                hash TEXT PRIMARY KEY,
                feed_id TEXT NOT NULL,
                title TEXT NOT NULL,
                permalink TEXT NOT NULL,
                content BLOB NOT NULL,  -- zstd compressed
                authors TEXT NOT NULL,
                timestamp INTEGER NOT NULL,  -- millis since epoch
                read INTEGER NOT NULL DEFAULT 0,
                starred INTEGER NOT NULL DEFAULT 0,
                image_urls TEXT NOT NULL DEFAULT '[]',
                shared_by TEXT NOT NULL DEFAULT '[]',
                intelligence INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_stories_feed ON stories(feed_id);
            CREATE INDEX idx_stories_timestamp ON stories(timestamp DESC);

            CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        ),
        // Migration 2: Speed up unread scans and cleanup
        M::up(
            r#"
            CREATE INDEX idx_stories_read_starred ON stories(read, starred);
            "#,
        ),
    ])
}

const STARRED_COUNT_KEY: &str = "starred_count";

/// Raw story columns, decoded outside the rusqlite row callback
struct StoryRow {
    hash: String,
    feed_id: String,
    title: String,
    permalink: String,
    content: Vec<u8>,
    authors: String,
    timestamp: i64,
    read: bool,
    starred: bool,
    image_urls: String,
    shared_by: String,
    intelligence: i32,
}

const STORY_COLUMNS: &str = "hash, feed_id, title, permalink, content, authors, timestamp,
     read, starred, image_urls, shared_by, intelligence";

impl StoryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hash: row.get(0)?,
            feed_id: row.get(1)?,
            title: row.get(2)?,
            permalink: row.get(3)?,
            content: row.get(4)?,
            authors: row.get(5)?,
            timestamp: row.get(6)?,
            read: row.get(7)?,
            starred: row.get(8)?,
            image_urls: row.get(9)?,
            shared_by: row.get(10)?,
            intelligence: row.get(11)?,
        })
    }

    fn into_story(self) -> Result<Story> {
        let content = zstd::decode_all(self.content.as_slice())
            .with_context(|| format!("Failed to decompress story {}", self.hash))?;
        let image_urls: Vec<String> = serde_json::from_str(&self.image_urls)?;
        let shared_by: Vec<String> = serde_json::from_str(&self.shared_by)?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp).unwrap_or_default();

        Ok(Story::builder(self.hash, self.feed_id)
            .title(self.title)
            .permalink(self.permalink)
            .content(String::from_utf8_lossy(&content).into_owned())
            .authors(self.authors)
            .timestamp(timestamp)
            .read(self.read)
            .starred(self.starred)
            .image_urls(image_urls)
            .shared_by(shared_by)
            .intelligence(self.intelligence)
            .build())
    }
}

fn counter_column(bucket: Intelligence) -> &'static str {
    match bucket {
        Intelligence::Positive => "positive_count",
        Intelligence::Neutral => "neutral_count",
        Intelligence::Negative => "negative_count",
    }
}

/// Flip one story's read flag and move its feed and sharer counters; false if unchanged
fn set_read_in(conn: &Connection, hash: &str, read: bool) -> Result<bool> {
    let current: Option<(String, bool, i32, String)> = conn
        .query_row(
            "SELECT feed_id, read, intelligence, shared_by FROM stories WHERE hash = ?",
            [hash],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((feed_id, was_read, intelligence, shared_by)) = current else {
        return Ok(false);
    };
    if was_read == read {
        return Ok(false);
    }

    conn.execute("UPDATE stories SET read = ? WHERE hash = ?", params![read, hash])?;

    let column = counter_column(Intelligence::from_score(intelligence));
    let delta = if read { -1 } else { 1 };
    conn.execute(
        &format!("UPDATE feeds SET {column} = MAX(0, {column} + ?) WHERE id = ?"),
        params![delta, feed_id],
    )?;

    let shared_by: Vec<String> = serde_json::from_str(&shared_by)?;
    for user_id in &shared_by {
        conn.execute(
            &format!("UPDATE social_feeds SET {column} = MAX(0, {column} + ?) WHERE user_id = ?"),
            params![delta, user_id],
        )?;
    }
    Ok(true)
}

/// SQLite-based feed storage
pub struct SqliteFeedStore {
    conn: Mutex<Option<Connection>>,
    compression_level: i32,
}

impl SqliteFeedStore {
    /// Open (or create) the store at `db_path` and bring the schema up to date
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL lets the UI read while the sync worker writes; foreign keys
        // are needed for the folder_feeds cascade.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            compression_level: 3,
        })
    }

    /// Run `f` against the open connection
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_mut().context("Feed store is closed")?;
        f(conn)
    }

    fn query_stories(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Story>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), StoryRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(StoryRow::into_story).collect()
    }
}

impl FeedStore for SqliteFeedStore {
    fn replace_feeds_folders(
        &self,
        feeds: &[Feed],
        folders: &[Folder],
        social_feeds: &[SocialFeed],
    ) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM folder_feeds; DELETE FROM folders; DELETE FROM feeds; DELETE FROM social_feeds;",
            )?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO feeds
                     (id, title, address, favicon_url, positive_count, neutral_count, negative_count, active)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )?;
                for feed in feeds {
                    stmt.execute(params![
                        feed.id.as_str(),
                        feed.title,
                        feed.address,
                        feed.favicon_url,
                        feed.positive_count,
                        feed.neutral_count,
                        feed.negative_count,
                        feed.active,
                    ])?;
                }

                let mut folder_stmt =
                    tx.prepare("INSERT OR IGNORE INTO folders (name, position) VALUES (?, ?)")?;
                let mut member_stmt = tx.prepare(
                    "INSERT OR IGNORE INTO folder_feeds (folder_name, feed_id, position) VALUES (?, ?, ?)",
                )?;
                for (i, folder) in folders.iter().enumerate() {
                    folder_stmt.execute(params![folder.name, i as i64])?;
                    for (j, feed_id) in folder.feed_ids.iter().enumerate() {
                        member_stmt.execute(params![folder.name, feed_id.as_str(), j as i64])?;
                    }
                }

                let mut social_stmt = tx.prepare(
                    "INSERT OR REPLACE INTO social_feeds
                     (user_id, username, title, photo_url, positive_count, neutral_count, negative_count)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )?;
                for social in social_feeds {
                    social_stmt.execute(params![
                        social.user_id,
                        social.username,
                        social.title,
                        social.photo_url,
                        social.positive_count,
                        social.neutral_count,
                        social.negative_count,
                    ])?;
                }
            }

            tx.commit()?;
            Ok(())
        })
        .context("Failed to replace feeds and folders")
    }

    fn insert_stories(&self, stories: &[Story]) -> Result<()> {
        let level = self.compression_level;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO stories
                     (hash, feed_id, title, permalink, content, authors, timestamp,
                      read, starred, image_urls, shared_by, intelligence)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(hash) DO UPDATE SET
                        title = excluded.title,
                        permalink = excluded.permalink,
                        content = excluded.content,
                        authors = excluded.authors,
                        timestamp = excluded.timestamp,
                        read = excluded.read,
                        starred = excluded.starred,
                        image_urls = excluded.image_urls,
                        shared_by = excluded.shared_by,
                        intelligence = excluded.intelligence",
                )?;

                for story in stories {
                    let content = zstd::encode_all(story.content.as_bytes(), level)
                        .context("Failed to compress story content")?;
                    stmt.execute(params![
                        story.hash.as_str(),
                        story.feed_id.as_str(),
                        story.title,
                        story.permalink,
                        content,
                        story.authors,
                        story.timestamp.timestamp_millis(),
                        story.read,
                        story.starred,
                        serde_json::to_string(&story.image_urls)?,
                        serde_json::to_string(&story.shared_by)?,
                        story.intelligence,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn unread_story_hashes(&self) -> Result<Vec<StoryHash>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT hash FROM stories WHERE read = 0")?;
            let hashes = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|h| h.map(StoryHash::new))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(hashes)
        })
    }

    fn story_hashes_for_feed(&self, feed_id: &FeedId) -> Result<Vec<StoryHash>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT hash FROM stories WHERE feed_id = ?")?;
            let hashes = stmt
                .query_map([feed_id.as_str()], |row| row.get::<_, String>(0))?
                .map(|h| h.map(StoryHash::new))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(hashes)
        })
    }

    fn mark_stories_read(&self, hashes: &[StoryHash]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for hash in hashes {
                if set_read_in(&tx, hash.as_str(), true)? {
                    changed += 1;
                }
            }
            tx.commit()?;
            debug!("Marked {} of {} stories read", changed, hashes.len());
            Ok(())
        })
    }

    fn set_story_read(&self, hash: &StoryHash, read: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let changed = set_read_in(&tx, hash.as_str(), read)?;
            tx.commit()?;
            Ok(changed)
        })
    }

    fn set_story_starred(&self, hash: &StoryHash, starred: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE stories SET starred = ? WHERE hash = ?",
                params![starred, hash.as_str()],
            )?;
            Ok(())
        })
    }

    fn update_starred_count(&self, count: u32) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![STARRED_COUNT_KEY, count.to_string()],
            )?;
            Ok(())
        })
    }

    fn starred_count(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = ?",
                    [STARRED_COUNT_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
        })
    }

    fn cleanup(&self, keep_old_stories: bool) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = if keep_old_stories {
                let cutoff = Utc::now() - chrono::Duration::days(STORY_RETENTION_DAYS);
                conn.execute(
                    "DELETE FROM stories WHERE read = 1 AND starred = 0 AND timestamp < ?",
                    [cutoff.timestamp_millis()],
                )?
            } else {
                conn.execute("DELETE FROM stories WHERE read = 1 AND starred = 0", [])?
            };

            // Fold the WAL back into the main file
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE); PRAGMA optimize;")?;
            info!("Storage cleanup removed {} stories", deleted);
            Ok(())
        })
        .context("Failed to clean up story storage")
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| e)
                .context("Failed to close database")?;
        }
        Ok(())
    }

    fn list_feeds(&self) -> Result<Vec<Feed>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, address, favicon_url, positive_count, neutral_count,
                        negative_count, active
                 FROM feeds ORDER BY title COLLATE NOCASE",
            )?;
            let feeds = stmt
                .query_map([], |row| {
                    Ok(Feed {
                        id: FeedId::new(row.get::<_, String>(0)?),
                        title: row.get(1)?,
                        address: row.get(2)?,
                        favicon_url: row.get(3)?,
                        positive_count: row.get(4)?,
                        neutral_count: row.get(5)?,
                        negative_count: row.get(6)?,
                        active: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(feeds)
        })
    }

    fn list_folders(&self) -> Result<Vec<Folder>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM folders ORDER BY position")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut member_stmt = conn.prepare(
                "SELECT feed_id FROM folder_feeds WHERE folder_name = ? ORDER BY position",
            )?;
            let mut folders = Vec::with_capacity(names.len());
            for name in names {
                let feed_ids = member_stmt
                    .query_map([&name], |row| row.get::<_, String>(0))?
                    .map(|id| id.map(FeedId::new))
                    .collect::<Result<Vec<_>, _>>()?;
                folders.push(Folder::new(name, feed_ids));
            }
            Ok(folders)
        })
    }

    fn list_social_feeds(&self) -> Result<Vec<SocialFeed>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, username, title, photo_url, positive_count, neutral_count,
                        negative_count
                 FROM social_feeds ORDER BY username COLLATE NOCASE",
            )?;
            let feeds = stmt
                .query_map([], |row| {
                    Ok(SocialFeed {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        title: row.get(2)?,
                        photo_url: row.get(3)?,
                        positive_count: row.get(4)?,
                        neutral_count: row.get(5)?,
                        negative_count: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(feeds)
        })
    }

    fn get_feed(&self, id: &FeedId) -> Result<Option<Feed>> {
        Ok(self
            .list_feeds()?
            .into_iter()
            .find(|feed| &feed.id == id))
    }

    fn get_story(&self, hash: &StoryHash) -> Result<Option<Story>> {
        let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE hash = ?");
        let mut stories = self.query_stories(&sql, vec![Value::Text(hash.0.clone())])?;
        Ok(stories.pop())
    }

    fn has_story(&self, hash: &StoryHash) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM stories WHERE hash = ?)",
                [hash.as_str()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    fn list_stories(
        &self,
        feed_set: &FeedSet,
        order: StoryOrder,
        filter: ReadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Story>> {
        let mut values: Vec<Value> = Vec::new();
        let selection = match feed_set {
            FeedSet::Feed(id) => {
                values.push(Value::Text(id.0.clone()));
                "feed_id = ?".to_string()
            }
            FeedSet::Folder { feeds, .. } => {
                if feeds.is_empty() {
                    return Ok(Vec::new());
                }
                values.extend(feeds.iter().map(|id| Value::Text(id.0.clone())));
                let placeholders = vec!["?"; feeds.len()].join(", ");
                format!("feed_id IN ({placeholders})")
            }
            FeedSet::AllFeeds => "1 = 1".to_string(),
            FeedSet::Social(user_id) => {
                values.push(Value::Text(user_id.clone()));
                "EXISTS (SELECT 1 FROM json_each(stories.shared_by) WHERE value = ?)".to_string()
            }
            FeedSet::AllSocial => "json_array_length(shared_by) > 0".to_string(),
            FeedSet::Saved => "starred = 1".to_string(),
        };

        let read_clause = match filter {
            ReadFilter::All => "",
            ReadFilter::Unread => " AND read = 0",
        };
        let direction = match order {
            StoryOrder::Newest => "DESC",
            StoryOrder::Oldest => "ASC",
        };

        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT {STORY_COLUMNS} FROM stories
             WHERE {selection}{read_clause}
             ORDER BY timestamp {direction}
             LIMIT ? OFFSET ?"
        );
        self.query_stories(&sql, values)
    }

    fn count_stories(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    fn delete_feed(&self, id: &FeedId) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM folder_feeds WHERE feed_id = ?", [id.as_str()])?;
            tx.execute("DELETE FROM stories WHERE feed_id = ?", [id.as_str()])?;
            tx.execute("DELETE FROM feeds WHERE id = ?", [id.as_str()])?;
            tx.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteFeedStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteFeedStore::new(dir.path().join("feeds.db")).unwrap();
        (store, dir)
    }

    fn story(hash: &str, feed: &str, age_hours: i64) -> Story {
        Story::builder(hash, feed)
            .title(format!("Story {}", hash))
            .content("<p>".repeat(50))
            .timestamp(Utc::now() - chrono::Duration::hours(age_hours))
            .image_urls(vec!["https://example.com/a.png".to_string()])
            .build()
    }

    #[test]
    fn test_story_crud() {
        let (store, _dir) = create_test_store();
        let s = story("100:abc", "100", 1);
        store.insert_stories(&[s.clone()]).unwrap();

        let loaded = store.get_story(&s.hash).unwrap().unwrap();
        assert_eq!(loaded.title, s.title);
        assert_eq!(loaded.content, s.content);
        assert_eq!(loaded.image_urls, s.image_urls);
        assert_eq!(loaded.timestamp.timestamp_millis(), s.timestamp.timestamp_millis());
        assert!(store.has_story(&s.hash).unwrap());
        assert!(!store.has_story(&StoryHash::new("100:zzz")).unwrap());
    }

    #[test]
    fn test_insert_takes_server_state() {
        let (store, _dir) = create_test_store();
        let mut s = story("100:abc", "100", 1);
        store.insert_stories(&[s.clone()]).unwrap();
        s.read = true;
        store.insert_stories(&[s.clone()]).unwrap();

        assert_eq!(store.count_stories().unwrap(), 1);
        assert!(store.get_story(&s.hash).unwrap().unwrap().read);
    }

    #[test]
    fn test_replace_feeds_folders() {
        let (store, _dir) = create_test_store();
        store
            .replace_feeds_folders(
                &[Feed::new("100", "Hacker News"), Feed::new("101", "Lobsters")],
                &[Folder::new("Tech", vec![FeedId::new("100"), FeedId::new("101")])],
                &[SocialFeed::new("42", "alice")],
            )
            .unwrap();
        store
            .replace_feeds_folders(
                &[Feed::new("100", "Hacker News")],
                &[Folder::new("Tech", vec![FeedId::new("100")])],
                &[],
            )
            .unwrap();

        let feeds = store.list_feeds().unwrap();
        assert_eq!(feeds.len(), 1);
        let folders = store.list_folders().unwrap();
        assert_eq!(folders, vec![Folder::new("Tech", vec![FeedId::new("100")])]);
        assert!(store.list_social_feeds().unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_adjusts_counts() {
        let (store, _dir) = create_test_store();
        store
            .replace_feeds_folders(&[Feed::new("100", "HN").with_counts(3, 0, 0)], &[], &[])
            .unwrap();
        let mut s = story("100:abc", "100", 1);
        s.intelligence = 1;
        store.insert_stories(&[s.clone()]).unwrap();

        store.mark_stories_read(&[s.hash.clone()]).unwrap();
        // Already read: no further decrement
        store.mark_stories_read(&[s.hash.clone()]).unwrap();

        let feed = store.get_feed(&FeedId::new("100")).unwrap().unwrap();
        assert_eq!(feed.positive_count, 2);
        assert!(store.unread_story_hashes().unwrap().is_empty());

        assert!(store.set_story_read(&s.hash, false).unwrap());
        let feed = store.get_feed(&FeedId::new("100")).unwrap().unwrap();
        assert_eq!(feed.positive_count, 3);
    }

    #[test]
    fn test_mark_read_adjusts_social_counts() {
        let (store, _dir) = create_test_store();
        let mut alice = SocialFeed::new("42", "alice");
        alice.neutral_count = 2;
        let mut bob = SocialFeed::new("43", "bob");
        bob.neutral_count = 2;
        store
            .replace_feeds_folders(&[Feed::new("100", "HN").with_counts(0, 2, 0)], &[], &[alice, bob])
            .unwrap();
        let mut s = story("100:abc", "100", 1);
        s.shared_by = vec!["42".to_string()];
        store.insert_stories(&[s.clone()]).unwrap();

        store.mark_stories_read(&[s.hash.clone()]).unwrap();
        let neutral = |user_id: &str| {
            store
                .list_social_feeds()
                .unwrap()
                .into_iter()
                .find(|f| f.user_id == user_id)
                .unwrap()
                .neutral_count
        };
        assert_eq!(neutral("42"), 1);
        assert_eq!(neutral("43"), 2);

        assert!(store.set_story_read(&s.hash, false).unwrap());
        assert_eq!(neutral("42"), 2);
    }

    #[test]
    fn test_list_stories_by_feed_set() {
        let (store, _dir) = create_test_store();
        let mut shared = story("200:b", "200", 1);
        shared.shared_by = vec!["42".to_string()];
        let mut starred = story("300:c", "300", 3);
        starred.starred = true;
        store
            .insert_stories(&[story("100:a", "100", 2), shared, starred])
            .unwrap();

        let folder = FeedSet::folder("Tech", ["100", "200"]);
        let list = store
            .list_stories(&folder, StoryOrder::Newest, ReadFilter::All, 10, 0)
            .unwrap();
        let hashes: Vec<&str> = list.iter().map(|s| s.hash.as_str()).collect();
        assert_eq!(hashes, vec!["200:b", "100:a"]);

        let social = store
            .list_stories(&FeedSet::social("42"), StoryOrder::Newest, ReadFilter::All, 10, 0)
            .unwrap();
        assert_eq!(social.len(), 1);

        let saved = store
            .list_stories(&FeedSet::Saved, StoryOrder::Oldest, ReadFilter::All, 10, 0)
            .unwrap();
        assert_eq!(saved[0].hash.as_str(), "300:c");

        let paged = store
            .list_stories(&FeedSet::AllFeeds, StoryOrder::Oldest, ReadFilter::All, 1, 1)
            .unwrap();
        assert_eq!(paged[0].hash.as_str(), "100:a");
    }

    #[test]
    fn test_cleanup() {
        let (store, _dir) = create_test_store();
        let mut old_read = story("100:old", "100", 24 * 60);
        old_read.read = true;
        let mut new_read = story("100:new", "100", 1);
        new_read.read = true;
        store
            .insert_stories(&[old_read, new_read, story("100:unread", "100", 24 * 60)])
            .unwrap();

        store.cleanup(true).unwrap();
        assert_eq!(store.count_stories().unwrap(), 2);

        store.cleanup(false).unwrap();
        assert_eq!(store.count_stories().unwrap(), 1);
        assert!(store.has_story(&StoryHash::new("100:unread")).unwrap());
    }

    #[test]
    fn test_starred_count_and_close() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.starred_count().unwrap(), 0);
        store.update_starred_count(12).unwrap();
        assert_eq!(store.starred_count().unwrap(), 12);

        store.close().unwrap();
        assert!(store.count_stories().is_err());
        // Closing twice is harmless
        store.close().unwrap();
    }

    #[test]
    fn test_delete_feed() {
        let (store, _dir) = create_test_store();
        store
            .replace_feeds_folders(
                &[Feed::new("100", "HN")],
                &[Folder::new("Tech", vec![FeedId::new("100")])],
                &[],
            )
            .unwrap();
        store.insert_stories(&[story("100:a", "100", 1)]).unwrap();

        store.delete_feed(&FeedId::new("100")).unwrap();
        assert!(store.list_feeds().unwrap().is_empty());
        assert!(store.list_folders().unwrap()[0].feed_ids.is_empty());
        assert_eq!(store.count_stories().unwrap(), 0);
    }
}
