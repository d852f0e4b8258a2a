use crate::index::{Row, UrlIndex};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tinylink_core::repository::{Record, Repository, Result, Saved};
use tinylink_core::{ShortCode, StorageError};
use tracing::{debug, info, warn};

/// One line of the log.
///
/// `owner` is optional on read so logs written without ownership replay
/// with an empty owner.
#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    hash: String,
    url: String,
    #[serde(default)]
    owner: String,
}

impl From<&Record> for LogEntry {
    fn from(record: &Record) -> Self {
        Self {
            hash: record.code.to_string(),
            url: record.original_url.clone(),
            owner: record.owner_id.clone(),
        }
    }
}

impl From<LogEntry> for Record {
    fn from(entry: LogEntry) -> Self {
        Record::new(ShortCode::new_unchecked(entry.hash), entry.url, entry.owner)
    }
}

#[derive(Debug)]
struct State {
    index: UrlIndex,
    log: File,
    /// The log ends in a partial line, so the next append starts a new one.
    torn_tail: bool,
}

impl State {
    /// Appends the record to the log, then to the index.
    ///
    /// The line goes out in a single `write_all`; if it fails the index is
    /// left untouched and whatever part of the line reached the file is cut
    /// off again.
    fn append(&mut self, record: Record) -> Result<()> {
        let mut line = Vec::new();
        if self.torn_tail {
            line.push(b'\n');
        }
        serde_json::to_writer(&mut line, &LogEntry::from(&record))
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        line.push(b'\n');

        let offset = self.log.metadata()?.len();
        if let Err(err) = self.log.write_all(&line) {
            self.discard_from(offset);
            return Err(err.into());
        }

        self.torn_tail = false;
        self.index.insert(record);
        Ok(())
    }

    /// Truncates the log back to `offset`. If that fails as well, the next
    /// append is moved onto a fresh line instead.
    fn discard_from(&mut self, offset: u64) {
        if let Err(err) = self.log.set_len(offset) {
            warn!(offset, error = %err, "could not truncate partial log line");
            self.torn_tail = true;
        }
    }
}

/// File-backed implementation of the Repository trait.
///
/// Keeps the same index as [`InMemoryRepository`](crate::InMemoryRepository)
/// and mirrors every write to an append-only log of JSON lines:
///
/// ```text
/// {"hash":"Xk3pQ9aZ","url":"https://ya.ru","owner":"user1"}
/// ```
///
/// Opening the repository replays the log from the start; for a code written
/// more than once the last line wins. A batch whose code is already taken
/// writes nothing; an I/O failure part way through a batch keeps the rows
/// written before it. The log is never compacted, and writes are not fsynced.
#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    state: RwLock<State>,
}

impl FileRepository {
    /// Opens (or creates) the log at `path` and rebuilds the index from it.
    ///
    /// Missing parent directories are created. Lines that fail to decode are
    /// skipped with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let log = OpenOptions::new().create(true).append(true).open(&path)?;
        let (index, torn_tail) = replay(&path)?;
        info!(path = %path.display(), records = index.len(), torn_tail, "replayed url log");

        Ok(Self {
            path,
            state: RwLock::new(State {
                index,
                log,
                torn_tail,
            }),
        })
    }

    /// Path of the backing log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the index.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rebuilds the index from the log. The flag reports a last line with no
/// trailing newline, which is what an interrupted append leaves behind.
fn replay(path: &Path) -> Result<(UrlIndex, bool)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut index = UrlIndex::new();
    let mut buf = Vec::new();
    let mut number = 0usize;
    let mut torn_tail = false;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        number += 1;
        torn_tail = buf.last() != Some(&b'\n');

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => index.overwrite(entry.into()),
            Err(err) => {
                warn!(path = %path.display(), line = number, error = %err, "skipping undecodable log line");
            }
        }
    }

    Ok((index, torn_tail))
}

#[async_trait]
impl Repository for FileRepository {
    async fn save(&self, record: Record) -> Result<ShortCode> {
        let mut state = self.state.write();
        state.index.check(&record)?;

        let code = record.code.clone();
        state.append(record)?;
        debug!(code = %code, "appended record to url log");
        Ok(code)
    }

    async fn save_batch(&self, records: Vec<Record>) -> Result<Vec<Saved>> {
        let mut state = self.state.write();
        let rows = state.index.plan_batch(records)?;
        let mut saved = Vec::with_capacity(rows.len());

        for row in rows {
            match row {
                Row::Insert(record) => {
                    let code = record.code.clone();
                    state.append(record)?;
                    saved.push(Saved::Created(code));
                }
                Row::Existing(code) => saved.push(Saved::Existing(code)),
            }
        }

        Ok(saved)
    }

    async fn get(&self, code: &ShortCode) -> Result<Record> {
        self.state
            .read()
            .index
            .get(code)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    async fn get_all(&self, owner_id: &str) -> Result<HashMap<ShortCode, String>> {
        Ok(self.state.read().index.owned_by(owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn record(c: &str, url: &str, owner: &str) -> Record {
        Record::new(code(c), url, owner)
    }

    fn log_path(dir: &TempDir) -> PathBuf {
        dir.path().join("urls.log")
    }

    #[tokio::test]
    async fn open_creates_missing_file_and_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/urls.log");

        let repo = FileRepository::open(&path).unwrap();

        assert!(path.exists());
        assert!(repo.is_empty());
        assert_eq!(repo.path(), path.as_path());
    }

    #[tokio::test]
    async fn save_appends_one_json_line() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(log_path(&dir)).unwrap();

        repo.save(record("abc12345", "https://ya.ru", "user1"))
            .await
            .unwrap();

        let contents = fs::read_to_string(log_path(&dir)).unwrap();
        assert_eq!(
            contents,
            "{\"hash\":\"abc12345\",\"url\":\"https://ya.ru\",\"owner\":\"user1\"}\n"
        );
    }

    #[tokio::test]
    async fn reopen_recovers_every_record() {
        let dir = TempDir::new().unwrap();

        {
            let repo = FileRepository::open(log_path(&dir)).unwrap();
            for i in 0..50 {
                repo.save(record(
                    &format!("code{:04}", i),
                    &format!("https://example.com/{i}"),
                    if i % 2 == 0 { "even" } else { "odd" },
                ))
                .await
                .unwrap();
            }
        }

        let reopened = FileRepository::open(log_path(&dir)).unwrap();
        assert_eq!(reopened.len(), 50);

        for i in 0..50 {
            let got = reopened.get(&code(&format!("code{:04}", i))).await.unwrap();
            assert_eq!(got.original_url, format!("https://example.com/{i}"));
        }
        assert_eq!(reopened.get_all("even").await.unwrap().len(), 25);
    }

    #[tokio::test]
    async fn replay_keeps_last_line_for_a_code() {
        let dir = TempDir::new().unwrap();
        fs::write(
            log_path(&dir),
            concat!(
                "{\"hash\":\"dup00000\",\"url\":\"https://old.example\"}\n",
                "{\"hash\":\"dup00000\",\"url\":\"https://new.example\"}\n",
            ),
        )
        .unwrap();

        let repo = FileRepository::open(log_path(&dir)).unwrap();

        let got = repo.get(&code("dup00000")).await.unwrap();
        assert_eq!(got.original_url, "https://new.example");
        assert_eq!(got.owner_id, "");
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn replay_skips_blank_and_garbage_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            log_path(&dir),
            concat!(
                "{\"hash\":\"good0001\",\"url\":\"https://one.example\",\"owner\":\"u\"}\n",
                "\n",
                "not json at all\n",
                "{\"hash\":\"good0002\",\"url\":\"https://two.example\",\"owner\":\"u\"}\n",
                "{\"hash\":\"torn",
            ),
        )
        .unwrap();

        let repo = FileRepository::open(log_path(&dir)).unwrap();

        assert_eq!(repo.len(), 2);
        assert_eq!(repo.get_all("u").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn append_after_torn_tail_starts_on_a_new_line() {
        let dir = TempDir::new().unwrap();
        fs::write(
            log_path(&dir),
            "{\"hash\":\"good0001\",\"url\":\"https://one.example\"}\n{\"hash\":\"to",
        )
        .unwrap();

        {
            let repo = FileRepository::open(log_path(&dir)).unwrap();
            repo.save(record("good0002", "https://two.example", "u"))
                .await
                .unwrap();
        }

        let reopened = FileRepository::open(log_path(&dir)).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get(&code("good0002")).await.is_ok());
    }

    #[tokio::test]
    async fn conflicts_are_not_written_to_the_log() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(log_path(&dir)).unwrap();

        repo.save(record("first000", "https://ya.ru", "user1"))
            .await
            .unwrap();
        let url_err = repo
            .save(record("second00", "https://ya.ru", "user2"))
            .await
            .unwrap_err();
        let code_err = repo
            .save(record("first000", "https://other.example", "user2"))
            .await
            .unwrap_err();

        assert!(matches!(url_err, StorageError::UrlConflict { ref existing } if existing.as_str() == "first000"));
        assert!(matches!(code_err, StorageError::HashConflict(_)));
        assert_eq!(fs::read_to_string(log_path(&dir)).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn save_batch_survives_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let repo = FileRepository::open(log_path(&dir)).unwrap();
            let saved = repo
                .save_batch(vec![
                    record("batch001", "https://one.example", "u"),
                    record("batch002", "https://one.example", "u"),
                    record("batch003", "https://two.example", "u"),
                ])
                .await
                .unwrap();

            assert_eq!(
                saved,
                vec![
                    Saved::Created(code("batch001")),
                    Saved::Existing(code("batch001")),
                    Saved::Created(code("batch003")),
                ]
            );
        }

        let reopened = FileRepository::open(log_path(&dir)).unwrap();
        let owned = reopened.get_all("u").await.unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned["batch003"], "https://two.example");
    }

    #[tokio::test]
    async fn save_batch_with_taken_code_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(log_path(&dir)).unwrap();
        repo.save(record("taken000", "https://a.example", "u"))
            .await
            .unwrap();

        let err = repo
            .save_batch(vec![
                record("free0000", "https://b.example", "u"),
                record("taken000", "https://c.example", "u"),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::HashConflict(_)));
        assert_eq!(repo.len(), 1);
        assert_eq!(fs::read_to_string(log_path(&dir)).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn failed_append_does_not_swallow_later_records() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let repo = FileRepository::open(&path).unwrap();
        repo.save(record("good0001", "https://one.example", "u"))
            .await
            .unwrap();

        // a read-only handle fails the write and cannot be truncated either
        let writable = std::mem::replace(&mut repo.state.write().log, File::open(&path).unwrap());
        let err = repo
            .save(record("lost0001", "https://lost.example", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(repo.get(&code("lost0001")).await.is_err());

        // the fragment an interrupted write leaves behind
        OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"hash\":\"part")
            .unwrap();
        repo.state.write().log = writable;

        repo.save(record("good0002", "https://two.example", "u"))
            .await
            .unwrap();
        drop(repo);

        let reopened = FileRepository::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get(&code("good0001")).await.is_ok());
        assert!(reopened.get(&code("good0002")).await.is_ok());
    }

    #[tokio::test]
    async fn get_unknown_code_is_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = FileRepository::open(log_path(&dir)).unwrap();

        assert!(matches!(
            repo.get(&code("missing0")).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
