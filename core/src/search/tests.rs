//! End-to-end searcher tests against an in-memory session

use super::*;
use crate::config::Settings;
use crate::driver::Flavor;
use crate::error::{Error, Result};
use crate::io::{FileType, Mount};
use crate::session::{AccessMode, CommandResult, Session};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Complete,
    Timeout,
    CorruptGzip,
    /// gzip exits non-zero and leaves the raw file in place
    GzipFails,
    /// The compressed output cannot be read back
    CopyFails,
}

/// A remote host whose filesystem is a map and whose shell understands
/// just enough to run searches through the relay
struct MockSession {
    delimiter: char,
    temp_dir: &'static str,
    search_output: Vec<u8>,
    behavior: Behavior,
    replies: HashMap<String, String>,
    missing_dirs: Vec<String>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    modules: Mutex<Vec<String>>,
    executions: AtomicUsize,
    searches: AtomicUsize,
    deletes: AtomicUsize,
}

impl MockSession {
    fn unix(output: &str) -> Self {
        Self {
            delimiter: '/',
            temp_dir: "/var/tmp",
            search_output: output.as_bytes().to_vec(),
            behavior: Behavior::Complete,
            replies: HashMap::new(),
            missing_dirs: Vec::new(),
            files: Mutex::new(HashMap::new()),
            modules: Mutex::new(Vec::new()),
            executions: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    fn windows(output: Vec<u8>) -> Self {
        Self {
            delimiter: '\\',
            temp_dir: "C:\\Temp\\",
            search_output: output,
            ..Self::unix("")
        }
    }

    fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn with_reply(mut self, command: &str, stdout: &str) -> Self {
        self.replies.insert(command.to_string(), stdout.to_string());
        self
    }

    fn without_dir(mut self, path: &str) -> Self {
        self.missing_dirs.push(path.to_string());
        self
    }

    fn put_file(&self, path: &str, bytes: &[u8]) {
        self.files.lock().insert(path.to_string(), bytes.to_vec());
    }

    fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    fn modules(&self) -> Vec<String> {
        self.modules.lock().clone()
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

fn unquote(text: &str) -> String {
    text.trim().trim_matches('\'').to_string()
}

fn redirect_target(command: &str) -> Option<String> {
    command
        .rsplit_once(" > ")
        .or_else(|| command.rsplit_once(" -FilePath "))
        .map(|(_, target)| unquote(target))
}

fn compress_target(command: &str) -> Option<String> {
    command
        .strip_prefix("gzip -f ")
        .or_else(|| command.strip_prefix("Gzip-File "))
        .map(unquote)
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[async_trait]
impl Session for MockSession {
    fn hostname(&self) -> &str {
        "mock-host"
    }

    fn delimiter(&self) -> char {
        self.delimiter
    }

    async fn temp_dir(&self) -> Result<String> {
        Ok(self.temp_dir.to_string())
    }

    async fn load_module(&self, name: &str, source: &str) -> Result<()> {
        assert!(!source.is_empty());
        self.modules.lock().push(name.to_string());
        Ok(())
    }

    async fn execute(&self, command: &str, _timeout: Duration) -> Result<CommandResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if let Some(path) = redirect_target(command) {
            self.searches.fetch_add(1, Ordering::SeqCst);
            let timed_out = self.behavior == Behavior::Timeout;
            let bytes = if timed_out {
                self.search_output[..self.search_output.len() / 2].to_vec()
            } else {
                self.search_output.clone()
            };
            self.files.lock().insert(path, bytes);
            return Ok(CommandResult {
                exit_code: if timed_out { -1 } else { 0 },
                duration_ms: 5,
                timed_out,
                ..Default::default()
            });
        }

        if let Some(path) = compress_target(command) {
            if self.behavior == Behavior::GzipFails {
                return Ok(CommandResult {
                    exit_code: 1,
                    stderr: "gzip: No space left on device".to_string(),
                    ..Default::default()
                });
            }
            let raw = self
                .files
                .lock()
                .remove(&path)
                .ok_or_else(|| Error::transport(command, "no such file"))?;
            let mut compressed = gzip(&raw);
            if self.behavior == Behavior::CorruptGzip {
                compressed.truncate(compressed.len() / 2);
            }
            self.files.lock().insert(format!("{}.gz", path), compressed);
            return Ok(CommandResult::default());
        }

        Ok(CommandResult {
            stdout: self.replies.get(command).cloned().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn exists(&self, path: &str, _mode: AccessMode) -> Result<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    async fn length(&self, path: &str, _mode: AccessMode) -> Result<u64> {
        self.files
            .lock()
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| Error::transport(path, "no such file"))
    }

    async fn is_directory(&self, path: &str, _mode: AccessMode) -> Result<bool> {
        Ok(!self.files.lock().contains_key(path) && !self.missing_dirs.iter().any(|d| d == path))
    }

    async fn open(&self, path: &str, _mode: AccessMode) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        if self.behavior == Behavior::CopyFails && path.ends_with(".gz") {
            return Err(Error::transport(path, "connection reset"));
        }
        let bytes = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::transport(path, "no such file"))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        match self.files.lock().remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::transport(path, "no such file")),
        }
    }
}

fn searcher(session: &Arc<MockSession>, flavor: Flavor) -> Searcher {
    Searcher::builder(session.clone(), flavor)
        .with_settings(Settings::from_pairs([("watchdog_interval", "50")]))
        .build()
        .unwrap()
}

fn ls_lines(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "-rw-r--r-- 1 0 0 {} 2024-01-15 10:30:00.000000000 +0000 /data/file{}.txt\n",
                i * 7,
                i
            )
        })
        .collect()
}

fn paths(handles: &[crate::io::ResourceHandle]) -> Vec<String> {
    handles.iter().map(|h| h.path().to_string()).collect()
}

#[tokio::test]
async fn test_repeated_search_runs_once() {
    let session = Arc::new(MockSession::unix(&ls_lines(2)));
    let searcher = searcher(&session, Flavor::Linux);
    let conditions = [Condition::from_root("/data")];

    let first = searcher.search(&conditions).await.unwrap();
    let second = searcher.search(&conditions).await.unwrap();

    assert_eq!(session.searches(), 1);
    assert_eq!(paths(&first), vec!["/data/file0.txt", "/data/file1.txt"]);
    assert_eq!(paths(&first), paths(&second));
    assert!(first[0].cached_metadata().is_some());
    assert!(second[0].cached_metadata().is_none());

    let stats = searcher.stats();
    assert_eq!(stats.executions(), 1);
    assert_eq!(stats.cache_hits(), 1);
    assert_eq!(stats.cleanups(), 1);
    assert_eq!(searcher.cache().len(), 1);
}

#[tokio::test]
async fn test_concurrent_searches_agree() {
    let session = Arc::new(MockSession::unix(&ls_lines(5)));
    let searcher = searcher(&session, Flavor::Linux);
    let conditions = [Condition::from_root("/data")];

    let results = futures::future::join_all((0..4).map(|_| searcher.search(&conditions))).await;

    let first = paths(results[0].as_ref().unwrap());
    assert_eq!(first.len(), 5);
    for result in &results {
        assert_eq!(paths(result.as_ref().unwrap()), first);
    }
    assert_eq!(searcher.cache().len(), 1);
    assert_eq!(searcher.stats().cleanups(), searcher.stats().executions());
    assert_eq!(session.file_count(), 0);
}

#[tokio::test]
async fn test_absent_fs_type_skips_remote_execution() {
    let session = Arc::new(MockSession::unix(&ls_lines(1)));
    let searcher = Searcher::builder(session.clone(), Flavor::Linux)
        .with_settings(Settings::default())
        .with_mounts(vec![Mount::new("/", "ext4")])
        .build()
        .unwrap();

    let conditions = [
        Condition::from_root("/data"),
        condition(Field::FsType, Comparison::Equality, "nfs").unwrap(),
    ];
    let results = searcher.search(&conditions).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(session.executions(), 0);
    assert_eq!(searcher.stats().executions(), 0);
    assert_eq!(searcher.stats().cleanups(), 0);
}

#[tokio::test]
async fn test_mounts_are_listed_once_and_admit_searches() {
    let session = Arc::new(
        MockSession::unix(&ls_lines(1)).with_reply(
            "cat /proc/mounts",
            "/dev/sda1 / ext4 rw 0 0\nserver:/export /mnt/share nfs rw 0 0\n",
        ),
    );
    let searcher = searcher(&session, Flavor::Linux);

    let nfs = Regex::new("^nfs").unwrap();
    let remote = searcher.mounts_filtered(&nfs, true).await.unwrap();
    assert_eq!(remote, vec![Mount::new("/mnt/share", "nfs")]);
    let local = searcher.mounts_filtered(&nfs, false).await.unwrap();
    assert_eq!(local, vec![Mount::new("/", "ext4")]);
    assert_eq!(session.executions(), 1);

    let conditions = [
        Condition::from_root("/mnt"),
        condition(Field::FsType, Comparison::Equality, "nfs").unwrap(),
    ];
    let results = searcher.search(&conditions).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(session.searches(), 1);
}

#[tokio::test]
async fn test_setup_exe_search_on_aix() {
    let session = Arc::new(MockSession::unix(
        "-rwxr-xr-x    1 0        0          81920 Mar 14 2019  /opt/setup.exe\n",
    ));
    let searcher = searcher(&session, Flavor::Aix);

    let conditions = [
        condition(Field::Basename, Comparison::Equality, "setup.exe").unwrap(),
        condition(Field::From, Comparison::Equality, "/opt").unwrap(),
    ];
    let results = searcher.search(&conditions).await.unwrap();

    assert_eq!(results.len(), 1);
    let metadata = results[0].cached_metadata().unwrap();
    assert_eq!(metadata.file_type(), FileType::File);
    assert_eq!(metadata.path(), "/opt/setup.exe");
    let perms = metadata.unix().unwrap().permissions;
    assert!(perms.user_read() && perms.user_write() && perms.user_exec());
    assert!(!perms.group_write());
}

#[tokio::test]
async fn test_cleanup_after_success() {
    let session = Arc::new(MockSession::unix(&ls_lines(3)));
    let searcher = searcher(&session, Flavor::Linux);

    searcher.search(&[Condition::from_root("/data")]).await.unwrap();

    assert_eq!(searcher.stats().cleanups(), 1);
    assert_eq!(session.deletes(), 1);
    assert_eq!(session.file_count(), 0);
}

#[tokio::test]
async fn test_timeout_propagates_and_cleans_up() {
    let session = Arc::new(MockSession::unix(&ls_lines(10)).with_behavior(Behavior::Timeout));
    let searcher = searcher(&session, Flavor::Linux);

    let err = searcher
        .search(&[Condition::from_root("/data")])
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(searcher.stats().cleanups(), 1);
    assert_eq!(session.deletes(), 1);
    assert_eq!(session.file_count(), 0);
    assert!(searcher.cache().is_empty());
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let mut output = ls_lines(1);
    output.push_str("this is not an ls line\n");
    output.push_str("-rw-r--r-- 1 0 0 notasize 2024-01-15 10:30:00.0 +0000 /data/bad\n");
    output.push_str(&ls_lines(2).lines().nth(1).map(|l| format!("{}\n", l)).unwrap());
    let session = Arc::new(MockSession::unix(&output));
    let searcher = searcher(&session, Flavor::Linux);

    let results = searcher.search(&[Condition::from_root("/data")]).await.unwrap();

    assert_eq!(paths(&results), vec!["/data/file0.txt", "/data/file1.txt"]);
    assert_eq!(searcher.stats().skipped_records(), 2);
    assert_eq!(searcher.stats().cleanups(), 1);
    assert_eq!(session.file_count(), 0);
}

#[tokio::test]
async fn test_broken_stream_returns_partial_results_uncached() {
    let session = Arc::new(MockSession::unix(&ls_lines(2000)).with_behavior(Behavior::CorruptGzip));
    let searcher = searcher(&session, Flavor::Linux);
    let conditions = [Condition::from_root("/data")];

    let results = searcher.search(&conditions).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.len() < 2000);
    assert_eq!(results[0].path(), "/data/file0.txt");
    assert!(searcher.cache().is_empty());
    assert_eq!(session.file_count(), 0);

    searcher.search(&conditions).await.unwrap();
    assert_eq!(session.searches(), 2);
    assert_eq!(searcher.stats().cleanups(), 2);
}

#[tokio::test]
async fn test_failed_compression_cleans_up_raw_output() {
    let session = Arc::new(MockSession::unix(&ls_lines(3)).with_behavior(Behavior::GzipFails));
    let searcher = searcher(&session, Flavor::Linux);
    let conditions = [Condition::from_root("/data")];

    let results = searcher.search(&conditions).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(searcher.stats().cleanups(), 1);
    assert_eq!(session.deletes(), 1);
    assert_eq!(session.file_count(), 0);
    assert!(searcher.cache().is_empty());

    searcher.search(&conditions).await.unwrap();
    assert_eq!(session.searches(), 2);
}

#[tokio::test]
async fn test_failed_copy_returns_empty_uncached() {
    let session = Arc::new(MockSession::unix(&ls_lines(3)).with_behavior(Behavior::CopyFails));
    let searcher = searcher(&session, Flavor::Linux);

    let results = searcher.search(&[Condition::from_root("/data")]).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(searcher.stats().executions(), 1);
    assert_eq!(searcher.stats().cleanups(), 1);
    assert_eq!(session.file_count(), 0);
    assert!(searcher.cache().is_empty());
}

#[tokio::test]
async fn test_missing_root_finds_nothing() {
    let session = Arc::new(MockSession::unix(&ls_lines(2)).without_dir("/nowhere"));
    session.put_file("/etc/motd", b"hello");
    let searcher = searcher(&session, Flavor::Linux);

    for root in ["/nowhere", "/etc/motd"] {
        let results = searcher.search(&[Condition::from_root(root)]).await.unwrap();
        assert!(results.is_empty());
    }

    assert_eq!(session.executions(), 0);
    assert_eq!(session.searches(), 0);
    assert_eq!(searcher.stats().executions(), 0);
    assert!(searcher.cache().is_empty());
}

#[tokio::test]
async fn test_unsupported_condition_costs_nothing() {
    let session = Arc::new(MockSession::windows(Vec::new()));
    let searcher = searcher(&session, Flavor::Windows);
    let conditions = [
        Condition::from_root("C:\\Users"),
        condition(Field::FollowLinks, Comparison::Equality, true).unwrap(),
    ];

    let err = searcher.search(&conditions).await.unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(session.executions(), 0);
    assert!(session.modules().is_empty());
}

fn windows_records(paths: &[&str]) -> String {
    let mut text = String::new();
    for (i, path) in paths.iter().enumerate() {
        text.push_str(&format!(
            "{{\r\nType: File\r\nPath: {}\r\nMtime: 133000000000000000\r\nLength: {}\r\n}}\r\n",
            STANDARD.encode(path),
            i
        ));
    }
    text
}

fn windows_output(paths: &[&str]) -> Vec<u8> {
    let text = windows_records(paths);
    let mut bytes = vec![0xFF, 0xFE];
    bytes.extend(text.encode_utf16().flat_map(|unit| unit.to_le_bytes()));
    bytes
}

#[tokio::test]
async fn test_windows_search_folds_cache_key() {
    let output = windows_output(&["C:\\Program Files\\App\\setup.exe", "C:\\Program Files\\Old\\setup.exe"]);
    let session = Arc::new(MockSession::windows(output));
    let searcher = searcher(&session, Flavor::Windows);

    let first = searcher
        .search(&[
            Condition::from_root("C:\\Program Files"),
            Condition::basename_is("setup.exe"),
        ])
        .await
        .unwrap();
    let second = searcher
        .search(&[
            Condition::basename_is("SETUP.EXE"),
            Condition::from_root("c:\\program files"),
        ])
        .await
        .unwrap();

    assert_eq!(session.searches(), 1);
    assert_eq!(
        paths(&first),
        vec!["C:\\Program Files\\App\\setup.exe", "C:\\Program Files\\Old\\setup.exe"]
    );
    assert_eq!(paths(&first), paths(&second));
    assert_eq!(first[1].cached_metadata().unwrap().size(), 1);
    assert_eq!(session.file_count(), 0);
}

#[tokio::test]
async fn test_helper_module_loads_once_per_searcher() {
    let stat = "Get-Item -LiteralPath 'C:\\boot.ini' -Force | Print-FileInfo";
    let session = Arc::new(
        MockSession::windows(windows_output(&["C:\\Temp\\a.log"]))
            .with_reply(stat, &windows_records(&["C:\\boot.ini"])),
    );
    let searcher = searcher(&session, Flavor::Windows);

    let handle = searcher.file("C:\\boot.ini", AccessMode::ReadOnly);
    assert_eq!(handle.metadata().await.unwrap().path(), "C:\\boot.ini");
    searcher.search(&[Condition::from_root("C:\\Temp")]).await.unwrap();
    searcher
        .search(&[Condition::from_root("C:\\Temp"), Condition::basename_is("a.log")])
        .await
        .unwrap();

    assert_eq!(session.searches(), 2);
    assert_eq!(session.modules(), vec!["FileSearcher".to_string()]);

    let unix = Arc::new(MockSession::unix(&ls_lines(1)));
    self::searcher(&unix, Flavor::Linux)
        .search(&[Condition::from_root("/data")])
        .await
        .unwrap();
    assert!(unix.modules().is_empty());
}

#[tokio::test]
async fn test_handles_stat_lazily() {
    let stat = "ls -dn --full-time /etc/hosts";
    let line = "-rw-r--r-- 1 0 0 220 2024-01-15 10:30:00.000000000 +0000 /etc/hosts";
    let session = Arc::new(MockSession::unix("").with_reply(stat, line));
    let searcher = searcher(&session, Flavor::Linux);

    let cached = searcher.file("/etc/hosts", AccessMode::ReadOnly);
    assert!(cached.cached_metadata().is_none());
    assert_eq!(cached.metadata().await.unwrap().size(), 220);
    assert_eq!(cached.metadata().await.unwrap().size(), 220);
    assert_eq!(session.executions(), 1);

    let volatile = searcher.file("/etc/hosts", AccessMode::ReadVolatile);
    volatile.metadata().await.unwrap();
    volatile.metadata().await.unwrap();
    assert_eq!(session.executions(), 3);

    let missing = searcher.file("/etc/none", AccessMode::ReadOnly);
    assert!(missing.metadata().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_handle_file_operations() {
    let session = Arc::new(MockSession::unix(""));
    session.put_file("/etc/motd", b"hello");
    let searcher = searcher(&session, Flavor::Linux);

    let read_only = searcher.file("/etc/motd", AccessMode::ReadOnly);
    assert!(read_only.exists().await.unwrap());
    assert_eq!(read_only.length().await.unwrap(), 5);
    assert!(!read_only.is_directory().await.unwrap());

    let mut content = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut read_only.open().await.unwrap(), &mut content)
        .await
        .unwrap();
    assert_eq!(content, b"hello");

    let err = read_only.delete().await.unwrap_err();
    assert!(err.to_string().contains("not writable"));
    assert!(read_only.exists().await.unwrap());

    searcher
        .file("/etc/motd", AccessMode::ReadWrite)
        .delete()
        .await
        .unwrap();
    assert!(!read_only.exists().await.unwrap());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_local_linux_search() {
    use crate::session::LocalSession;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
    std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
    std::fs::write(dir.path().join("sub/b.txt"), b"bb").unwrap();
    std::fs::write(dir.path().join("sub/deep/c.log"), b"ccc").unwrap();
    let root = dir.path().to_string_lossy().into_owned();

    let session: Arc<dyn Session> = Arc::new(LocalSession::new());
    let searcher = Searcher::builder(session, Flavor::Linux)
        .with_settings(Settings::embedded(&Flavor::Linux.config_chain()).unwrap())
        .build()
        .unwrap();

    let txt = condition(Field::Basename, Comparison::Pattern, Regex::new(r"\.txt$").unwrap()).unwrap();
    let mut found = paths(
        &searcher
            .search(&[Condition::from_root(root.clone()), txt.clone()])
            .await
            .unwrap(),
    );
    found.sort();
    assert_eq!(found, vec![format!("{}/a.txt", root), format!("{}/sub/b.txt", root)]);

    let shallow = searcher
        .search(&[Condition::from_root(root.clone()), txt, Condition::depth(1).unwrap()])
        .await
        .unwrap();
    assert_eq!(paths(&shallow), vec![format!("{}/a.txt", root)]);
    assert_eq!(shallow[0].cached_metadata().unwrap().size(), 1);
    assert_eq!(searcher.stats().cleanups(), 2);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_local_dirname_depth_counts_per_directory() {
    use crate::driver::{Dialect, UnixDriver};
    use crate::session::LocalSession;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("a/sub/deep")).unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("a/sub/it's \"here\".txt"), b"q").unwrap();
    std::fs::write(dir.path().join("a/sub/deep/far.txt"), b"far").unwrap();
    std::fs::write(dir.path().join("sub/near.txt"), b"n").unwrap();
    let root = dir.path().to_string_lossy().into_owned();

    let conditions = [
        Condition::from_root(root.clone()),
        condition(Field::Dirname, Comparison::Pattern, Regex::new("/sub$").unwrap()).unwrap(),
        Condition::depth(1).unwrap(),
    ];
    let expected = vec![
        format!("{}/a/sub/it's \"here\".txt", root),
        format!("{}/sub/near.txt", root),
    ];

    let emulated = Dialect {
        native_depth: false,
        ..Dialect::LINUX
    };
    for dialect in [Dialect::LINUX, emulated] {
        let session: Arc<dyn Session> = Arc::new(LocalSession::new());
        let searcher = Searcher::builder(session, Flavor::Linux)
            .with_driver(Arc::new(UnixDriver::new(dialect)))
            .with_settings(Settings::embedded(&Flavor::Linux.config_chain()).unwrap())
            .build()
            .unwrap();
        let mut found = paths(&searcher.search(&conditions).await.unwrap());
        found.sort();
        assert_eq!(found, expected, "native_depth = {}", dialect.native_depth);
    }
}
