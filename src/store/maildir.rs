//! Maildir-backed mail store.
//!
//! Each folder is a directory with `new/`, `cur/` and `tmp/`. A message file
//! is named `<unique>[:2,<flags>]`; it is unread while its flags lack `S`.
//! Message handles have the form `<folder>/<unique>`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::MailStore;
use crate::error::{DraftError, Result};
use crate::model::draft::DraftRequest;
use crate::model::item::InboundItem;
use crate::parser::message;

/// Separator between the unique part of a file name and its info section.
const INFO_SEPARATOR: &str = ":2,";

/// Monotonic counter making draft file names unique within one process.
static DELIVERY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A tree of Maildir folders under one root directory.
#[derive(Debug, Clone)]
pub struct MaildirStore {
    root: PathBuf,
    drafts_folder: String,
    max_body_chars: usize,
}

impl MaildirStore {
    /// Open the Maildir tree at `root`.
    ///
    /// Fails with [`DraftError::CollaboratorUnavailable`] if `root` is not a
    /// directory.
    pub fn open(root: impl AsRef<Path>, drafts_folder: &str, max_body_chars: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DraftError::CollaboratorUnavailable(root));
        }
        Ok(Self {
            root,
            drafts_folder: drafts_folder.to_string(),
            max_body_chars,
        })
    }

    /// Path of a folder below the root.
    pub fn folder_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }

    /// Create `new/`, `cur/` and `tmp/` for `folder` if missing.
    pub fn ensure_folder(&self, folder: &str) -> Result<PathBuf> {
        let dir = self.folder_path(folder);
        for sub in ["new", "cur", "tmp"] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path).map_err(|e| DraftError::io(&path, e))?;
        }
        Ok(dir)
    }

    /// Find the file behind a `<folder>/<unique>` handle.
    fn locate(&self, id: &str) -> Result<(String, PathBuf)> {
        let (folder, unique) = id
            .rsplit_once('/')
            .ok_or_else(|| DraftError::MessageNotFound(id.to_string()))?;
        let dir = self.folder_path(folder);

        for sub in ["new", "cur"] {
            let sub_dir = dir.join(sub);
            let entries = match std::fs::read_dir(&sub_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(DraftError::io(&sub_dir, e)),
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if split_name(&name).0 == unique {
                    return Ok((folder.to_string(), entry.path()));
                }
            }
        }
        Err(DraftError::MessageNotFound(id.to_string()))
    }

    /// Read and decode one message file.
    fn load(&self, folder: &str, path: &Path) -> Result<(InboundItem, DateTime<Utc>)> {
        let raw = std::fs::read(path).map_err(|e| DraftError::io(path, e))?;
        let parsed = message::parse_message(&raw);

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (unique, flags) = split_name(&name);

        let received = parsed.date.unwrap_or_else(|| file_time(path));
        let item = InboundItem {
            id: format!("{folder}/{unique}"),
            subject: parsed.subject,
            sender: parsed.from,
            body: parsed.text.chars().take(self.max_body_chars).collect(),
            is_unread: !flags.contains('S'),
            message_id: parsed.message_id,
        };
        Ok((item, received))
    }
}

impl MailStore for MaildirStore {
    fn list_unread(&self, folder: &str) -> Result<Vec<InboundItem>> {
        let dir = self.folder_path(folder);
        if !dir.is_dir() {
            warn!(folder, "Folder not found");
            return Ok(Vec::new());
        }

        let mut found: Vec<(InboundItem, DateTime<Utc>)> = Vec::new();
        for sub in ["new", "cur"] {
            let sub_dir = dir.join(sub);
            let entries = match std::fs::read_dir(&sub_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(DraftError::io(&sub_dir, e)),
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || split_name(&name).1.contains('S') {
                    continue;
                }
                match self.load(folder, &path) {
                    Ok(loaded) => found.push(loaded),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable message"),
                }
            }
        }

        found.sort_by(|a, b| b.1.cmp(&a.1));
        if found.is_empty() {
            debug!(folder, "No unread messages");
        } else {
            info!(folder, count = found.len(), "Unread messages found");
        }
        Ok(found.into_iter().map(|(item, _)| item).collect())
    }

    fn read(&self, id: &str) -> Result<InboundItem> {
        let (folder, path) = self.locate(id)?;
        self.load(&folder, &path).map(|(item, _)| item)
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        let (folder, path) = self.locate(id)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (unique, flags) = split_name(&name);
        if flags.contains('S') {
            return Ok(());
        }

        let mut new_flags: Vec<char> = flags.chars().chain(['S']).collect();
        new_flags.sort_unstable();
        new_flags.dedup();
        let new_flags: String = new_flags.into_iter().collect();

        let cur_dir = self.folder_path(&folder).join("cur");
        std::fs::create_dir_all(&cur_dir).map_err(|e| DraftError::io(&cur_dir, e))?;
        let target = cur_dir.join(format!("{unique}{INFO_SEPARATOR}{new_flags}"));
        std::fs::rename(&path, &target).map_err(|e| DraftError::io(&path, e))?;

        debug!(id, "Marked as read");
        Ok(())
    }

    fn save_draft(&self, draft: &DraftRequest) -> Result<()> {
        let dir = self.ensure_folder(&self.drafts_folder)?;
        let unique = unique_name();
        let content = render_draft(draft, &unique, Utc::now());

        let tmp_path = dir.join("tmp").join(&unique);
        std::fs::write(&tmp_path, content).map_err(|e| DraftError::io(&tmp_path, e))?;
        let target = dir.join("cur").join(format!("{unique}{INFO_SEPARATOR}D"));
        std::fs::rename(&tmp_path, &target).map_err(|e| DraftError::io(&target, e))?;

        info!(
            subject = %draft.subject,
            path = %target.display(),
            "Draft saved"
        );
        Ok(())
    }
}

/// Split a Maildir file name into `(unique, flags)`.
fn split_name(name: &str) -> (&str, &str) {
    match name.split_once(INFO_SEPARATOR) {
        Some((unique, flags)) => (unique, flags),
        None => (name.split(':').next().unwrap_or(name), ""),
    }
}

/// `<secs>.<nanos>_<counter>.P<pid>.replydraft`
fn unique_name() -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let n = DELIVERY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}.{:09}_{n}.P{}.replydraft",
        now.as_secs(),
        now.subsec_nanos(),
        std::process::id()
    )
}

fn file_time(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Render a draft as an RFC 5322 message with UTF-8 headers.
fn render_draft(draft: &DraftRequest, unique: &str, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", draft.send_as));
    out.push_str(&format!("To: {}\r\n", draft.target_recipient));
    out.push_str(&format!("Subject: {}\r\n", one_line(&draft.subject)));
    out.push_str(&format!("Date: {}\r\n", now.to_rfc2822()));
    out.push_str(&format!("Message-ID: <{unique}@replydraft>\r\n"));
    if let Some(parent) = &draft.in_reply_to {
        out.push_str(&format!("In-Reply-To: {parent}\r\n"));
        out.push_str(&format!("References: {parent}\r\n"));
    }
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: 8bit\r\n");
    out.push_str("\r\n");
    for line in draft.body.lines() {
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

/// Collapse line breaks so a value cannot inject extra headers.
fn one_line(value: &str) -> String {
    value.split(['\r', '\n']).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn deliver(root: &Path, folder: &str, sub: &str, name: &str, subject: &str, date: &str) {
        let dir = root.join(folder).join(sub);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(name),
            format!(
                "From: Alice <alice@example.com>\nTo: me@example.net\nSubject: {subject}\n\
                 Date: {date}\nMessage-ID: <{name}@example.com>\n\nHello there.\n"
            ),
        )
        .unwrap();
    }

    fn store(root: &Path) -> MaildirStore {
        MaildirStore::open(root, "Drafts", 1000).unwrap()
    }

    #[test]
    fn test_open_missing_root_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = MaildirStore::open(tmp.path().join("nope"), "Drafts", 1000).unwrap_err();
        assert!(matches!(err, DraftError::CollaboratorUnavailable(_)));
    }

    #[test]
    fn test_list_unread_newest_first_and_skips_seen() {
        let tmp = tempfile::tempdir().unwrap();
        deliver(tmp.path(), "AI", "new", "100.a", "Older", "Mon, 01 Jan 2024 10:00:00 +0000");
        deliver(tmp.path(), "AI", "cur", "200.b:2,F", "Newer", "Tue, 02 Jan 2024 10:00:00 +0000");
        deliver(tmp.path(), "AI", "cur", "300.c:2,S", "Seen", "Wed, 03 Jan 2024 10:00:00 +0000");

        let items = store(tmp.path()).list_unread("AI").unwrap();
        let subjects: Vec<&str> = items.iter().map(|i| i.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Newer", "Older"]);
        assert_eq!(items[0].id, "AI/200.b");
        assert_eq!(items[0].sender, "alice@example.com");
        assert!(items[0].is_unread);
        assert!(items[0].body.contains("Hello there."));
    }

    #[test]
    fn test_list_missing_folder_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(store(tmp.path()).list_unread("Missing").unwrap().is_empty());
    }

    #[test]
    fn test_list_folder_with_only_seen_mail_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        deliver(tmp.path(), "AI", "cur", "300.c:2,S", "Seen", "Wed, 03 Jan 2024 10:00:00 +0000");
        let store = store(tmp.path());
        store.ensure_folder("AI").unwrap();
        assert!(store.list_unread("AI").unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_moves_to_cur_with_seen_flag() {
        let tmp = tempfile::tempdir().unwrap();
        deliver(tmp.path(), "AI", "new", "100.a", "Hi", "Mon, 01 Jan 2024 10:00:00 +0000");
        let store = store(tmp.path());

        store.mark_read("AI/100.a").unwrap();

        assert!(tmp.path().join("AI/cur/100.a:2,S").exists());
        assert!(!tmp.path().join("AI/new/100.a").exists());
        assert!(!store.read("AI/100.a").unwrap().is_unread);
        assert!(store.list_unread("AI").unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_keeps_existing_flags() {
        let tmp = tempfile::tempdir().unwrap();
        deliver(tmp.path(), "AI", "cur", "100.a:2,F", "Hi", "Mon, 01 Jan 2024 10:00:00 +0000");
        store(tmp.path()).mark_read("AI/100.a").unwrap();
        assert!(tmp.path().join("AI/cur/100.a:2,FS").exists());
    }

    #[test]
    fn test_mark_read_unknown_id() {
        let tmp = tempfile::tempdir().unwrap();
        let err = store(tmp.path()).mark_read("AI/404").unwrap_err();
        assert!(matches!(err, DraftError::MessageNotFound(_)));
    }

    #[test]
    fn test_save_draft_writes_parseable_message() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let draft = DraftRequest {
            target_recipient: "alice@example.com".into(),
            subject: "RE: Grüße".into(),
            body: "Hallo Alice,\nbis Dienstag.".into(),
            send_as: "me@example.net".into(),
            in_reply_to: Some("<100.a@example.com>".into()),
        };
        store.save_draft(&draft).unwrap();

        let cur = tmp.path().join("Drafts").join("cur");
        let files: Vec<_> = std::fs::read_dir(&cur).unwrap().flatten().collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].file_name().to_string_lossy().ends_with(":2,D"));

        let parsed = message::parse_message(&std::fs::read(files[0].path()).unwrap());
        assert_eq!(parsed.subject, "RE: Grüße");
        assert_eq!(parsed.from, "me@example.net");
        assert_eq!(parsed.to, "alice@example.com");
        assert!(parsed.text.contains("bis Dienstag."));
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("123.abc:2,RS"), ("123.abc", "RS"));
        assert_eq!(split_name("123.abc"), ("123.abc", ""));
    }

    #[test]
    fn test_one_line_strips_breaks() {
        assert_eq!(one_line("a\r\nBcc: x"), "a  Bcc: x");
    }
}
