//! # Row Store
//!
//! Flat-file table of fixed-arity string rows, used for the credential file
//! (`username,salt,hash`) and the optional peer whitelist (`ip`).
//!
//! ## Format
//! - one row per line, fields separated by a single delimiter byte
//! - a backslash escapes the delimiter or another backslash
//! - rows with the wrong number of fields are skipped
//!
//! ## Atomicity
//! Updates and inserts write a complete replacement to `<file>.tmp` and rename
//! it over the original, so readers never observe a partially written file.
//!
//! Access is ordinary blocking file I/O; callers on the reactor thread accept
//! that cost because operations are small and infrequent.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{constants, ProtocolError, Result};

/// Default field delimiter
pub const DEFAULT_DELIMITER: u8 = b',';

/// One row of `N` columns
pub type Row<const N: usize> = [String; N];

/// Contract the login flow and tooling rely on
pub trait RowStore<const N: usize> {
    /// First row matching `predicate`
    fn find<P>(&self, predicate: P) -> Result<Option<Row<N>>>
    where
        P: Fn(&Row<N>) -> bool;

    /// Rewrite every row through `transform`.
    ///
    /// Returns `Ok(false)` without touching the file when no row changed.
    fn update<F>(&self, transform: F) -> Result<bool>
    where
        F: Fn(&Row<N>) -> Row<N>;

    /// Append `row` after the existing rows
    fn insert(&self, row: Row<N>) -> Result<bool>;
}

/// Delimited text file implementation of [`RowStore`]
#[derive(Debug, Clone)]
pub struct FlatFileStore<const N: usize> {
    path: PathBuf,
    delimiter: u8,
}

/// Credential table: `username, salt, hash`
pub type CredentialStore = FlatFileStore<3>;

/// Whitelist table: one peer IP per row
pub type Whitelist = FlatFileStore<1>;

impl<const N: usize> FlatFileStore<N> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_delimiter(path, DEFAULT_DELIMITER)
    }

    pub fn with_delimiter(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Every well-formed row, in file order. A missing file has no rows.
    pub fn rows(&self) -> Result<Vec<Row<N>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(parse_rows(&bytes, self.delimiter)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ProtocolError::StoreError(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn replace_with(&self, rows: &[Row<N>]) -> Result<()> {
        let mut encoded = Vec::new();
        for row in rows {
            encode_row(row, self.delimiter, &mut encoded)?;
        }

        let temp = self.temp_path();
        let _ = fs::remove_file(&temp);
        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&temp)?;
            file.write_all(&encoded)?;
            file.sync_all()
        };
        write().map_err(|e| {
            ProtocolError::StoreError(format!("failed to write {}: {e}", temp.display()))
        })?;

        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            ProtocolError::StoreError(format!("{}: {e}", constants::ERR_STORE_RENAME))
        })
    }
}

impl<const N: usize> RowStore<N> for FlatFileStore<N> {
    fn find<P>(&self, predicate: P) -> Result<Option<Row<N>>>
    where
        P: Fn(&Row<N>) -> bool,
    {
        Ok(self.rows()?.into_iter().find(|row| predicate(row)))
    }

    #[instrument(skip(self, transform), fields(path = %self.path.display()))]
    fn update<F>(&self, transform: F) -> Result<bool>
    where
        F: Fn(&Row<N>) -> Row<N>,
    {
        let rows = self.rows()?;
        let mut changed = 0usize;
        let updated: Vec<Row<N>> = rows
            .iter()
            .map(|row| {
                let next = transform(row);
                if &next != row {
                    changed += 1;
                }
                next
            })
            .collect();

        if changed == 0 {
            debug!("Update matched no rows");
            return Ok(false);
        }

        self.replace_with(&updated)?;
        debug!(changed, "Store updated");
        Ok(true)
    }

    #[instrument(skip(self, row), fields(path = %self.path.display()))]
    fn insert(&self, row: Row<N>) -> Result<bool> {
        let mut rows = self.rows()?;
        rows.push(row);
        self.replace_with(&rows)?;
        debug!(rows = rows.len(), "Row inserted");
        Ok(true)
    }
}

fn parse_rows<const N: usize>(bytes: &[u8], delimiter: u8) -> Vec<Row<N>> {
    let mut rows = Vec::new();
    let mut fields: Vec<String> = Vec::with_capacity(N);
    let mut current = Vec::new();
    let mut escaped = false;

    let mut finish_line = |fields: &mut Vec<String>, current: &mut Vec<u8>| {
        if fields.is_empty() && current.is_empty() {
            return;
        }
        if fields.len() + 1 == N {
            fields.push(String::from_utf8_lossy(current).into_owned());
            if let Ok(row) = <Row<N>>::try_from(std::mem::take(fields)) {
                rows.push(row);
            }
        }
        fields.clear();
        current.clear();
    };

    for &byte in bytes {
        match byte {
            b'\\' if !escaped => escaped = true,
            b'\r' | b'\n' => {
                finish_line(&mut fields, &mut current);
                escaped = false;
            }
            b if b == delimiter && !escaped => {
                fields.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            }
            b => {
                current.push(b);
                escaped = false;
            }
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        finish_line(&mut fields, &mut current);
    }
    rows
}

fn encode_row<const N: usize>(row: &Row<N>, delimiter: u8, out: &mut Vec<u8>) -> Result<()> {
    for (i, field) in row.iter().enumerate() {
        if field.contains(['\n', '\r']) {
            return Err(ProtocolError::StoreError(
                "fields cannot contain line breaks".to_string(),
            ));
        }
        if i > 0 {
            out.push(delimiter);
        }
        for &byte in field.as_bytes() {
            if byte == b'\\' || byte == delimiter {
                out.push(b'\\');
            }
            out.push(byte);
        }
    }
    out.push(b'\n');
    Ok(())
}

/// Named view of a credential row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub salt: String,
    pub hash: String,
}

impl From<Row<3>> for Credential {
    fn from([username, salt, hash]: Row<3>) -> Self {
        Self {
            username,
            salt,
            hash,
        }
    }
}

impl From<Credential> for Row<3> {
    fn from(credential: Credential) -> Self {
        [credential.username, credential.salt, credential.hash]
    }
}

impl CredentialStore {
    /// Exact-match lookup by username
    pub fn find_user(&self, username: &str) -> Result<Option<Credential>> {
        Ok(self.find(|row| row[0] == username)?.map(Credential::from))
    }
}

impl Whitelist {
    /// Whether `ip` appears as a row
    pub fn allows(&self, ip: &str) -> Result<bool> {
        Ok(self.find(|row| row[0] == ip)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(a: &str, b: &str, c: &str) -> Row<3> {
        [a.to_string(), b.to_string(), c.to_string()]
    }

    #[test]
    fn test_missing_file_has_no_rows() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        assert!(store.rows().expect("rows").is_empty());
        assert!(store.find_user("alice").expect("find").is_none());
    }

    #[test]
    fn test_insert_then_find() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        assert!(store.insert(row("alice", "salt1", "hash1")).expect("insert"));
        assert!(store.insert(row("bob", "salt2", "hash2")).expect("insert"));

        let bob = store.find_user("bob").expect("find").expect("bob exists");
        assert_eq!(bob.salt, "salt2");
        assert_eq!(bob.hash, "hash2");
        assert!(store.find_user("bo").expect("find").is_none());
        assert!(!dir.path().join("passwd.tmp").exists());
    }

    #[test]
    fn test_update_rewrites_matching_rows_only() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        store.insert(row("alice", "s", "old")).expect("insert");
        store.insert(row("bob", "s", "keep")).expect("insert");

        let changed = store
            .update(|r| {
                if r[0] == "alice" {
                    row(&r[0], &r[1], "new")
                } else {
                    r.clone()
                }
            })
            .expect("update");
        assert!(changed);
        assert_eq!(store.find_user("alice").expect("find").map(|c| c.hash), Some("new".into()));
        assert_eq!(store.find_user("bob").expect("find").map(|c| c.hash), Some("keep".into()));
    }

    #[test]
    fn test_update_without_match_reports_failure() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        store.insert(row("alice", "s", "h")).expect("insert");
        assert!(!store.update(|r| r.clone()).expect("update"));
    }

    #[test]
    fn test_escaped_delimiters_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        store.insert(row("a,b", "back\\slash", "h")).expect("insert");

        let raw = fs::read_to_string(store.path()).expect("read");
        assert_eq!(raw, "a\\,b,back\\\\slash,h\n");
        let found = store.find_user("a,b").expect("find").expect("present");
        assert_eq!(found.salt, "back\\slash");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("passwd");
        fs::write(&path, "short,row\nalice,s,h\r\ntoo,many,fields,here\ncarol,s2,h2").expect("write");
        let store = CredentialStore::new(&path);
        let rows = store.rows().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "alice");
        assert_eq!(rows[1][0], "carol");
    }

    #[test]
    fn test_line_breaks_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("passwd"));
        assert!(store.insert(row("ev\nil", "s", "h")).is_err());
    }

    #[test]
    fn test_whitelist_lookup() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("whitelist");
        fs::write(&path, "127.0.0.1\n10.0.0.7\n").expect("write");
        let whitelist = Whitelist::new(&path);
        assert!(whitelist.allows("127.0.0.1").expect("lookup"));
        assert!(!whitelist.allows("192.168.1.1").expect("lookup"));
    }
}
