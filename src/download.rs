use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{DriveEntry, EntryKind, FileContent};

/// Local file name for a downloaded entry
///
/// Path separators are replaced, and exported native documents get the
/// extension of their export format when the name lacks it.
pub fn local_file_name(entry: &DriveEntry) -> String {
    let mut name: String = entry
        .name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        name = entry.id.clone();
    }

    if let EntryKind::Native(native) = entry.kind() {
        let extension = native.extension();
        let has_extension = Path::new(&name)
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if !has_extension {
            name.push('.');
            name.push_str(extension);
        }
    }

    name
}

/// Same name with the entry id appended to the stem, `Report (id).pdf`
fn qualified_file_name(entry: &DriveEntry, name: &str) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, entry.id, ext.to_string_lossy()),
        None => format!("{} ({})", stem, entry.id),
    }
}

/// Write downloaded content next to other downloads in `dir`
///
/// An existing file is never replaced by another entry. On a name clash the
/// content goes to the id-qualified name instead.
pub async fn save_download(dir: &Path, entry: &DriveEntry, file: &FileContent) -> Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let name = local_file_name(entry);
    let path = dir.join(&name);

    let created = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await;
    let path = match created {
        Ok(mut out) => {
            out.write_all(&file.content).await?;
            out.flush().await?;
            path
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let qualified = dir.join(qualified_file_name(entry, &name));
            warn!(
                taken = %path.display(),
                path = %qualified.display(),
                "file name already taken, saving under the entry id"
            );
            fs::write(&qualified, &file.content).await?;
            qualified
        }
        Err(e) => return Err(e.into()),
    };

    debug!(path = %path.display(), bytes = file.content.len(), "wrote download");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, mime_type: &str) -> DriveEntry {
        DriveEntry {
            id: "id-1".to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: Vec::new(),
            web_view_link: None,
        }
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name(&entry("a.pdf", "application/pdf")), "a.pdf");
        assert_eq!(local_file_name(&entry("1/2 plan", "text/plain")), "1_2 plan");
        assert_eq!(local_file_name(&entry("..", "text/plain")), "id-1");
        assert_eq!(
            local_file_name(&entry("Minutes", "application/vnd.google-apps.document")),
            "Minutes.pdf"
        );
        assert_eq!(
            local_file_name(&entry("Budget", "application/vnd.google-apps.spreadsheet")),
            "Budget.xlsx"
        );
        assert_eq!(
            local_file_name(&entry("Slides.PDF", "application/vnd.google-apps.presentation")),
            "Slides.PDF"
        );
    }

    #[test]
    fn test_save_download() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileContent {
            content: bytes::Bytes::from("hello"),
            id: "id-1".to_string(),
            mime_type: None,
        };
        let target = dir.path().join("out");

        let path = tokio_test::block_on(save_download(&target, &entry("note.txt", "text/plain"), &file)).unwrap();
        assert_eq!(path, target.join("note.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_same_name_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let content = |id: &str, body: &'static str| FileContent {
            content: bytes::Bytes::from(body),
            id: id.to_string(),
            mime_type: None,
        };
        let mut first = entry("Report.pdf", "application/pdf");
        first.id = "a".to_string();
        let mut second = entry("Report.pdf", "application/pdf");
        second.id = "b".to_string();

        let saved_a = tokio_test::block_on(save_download(dir.path(), &first, &content("a", "AAA"))).unwrap();
        let saved_b = tokio_test::block_on(save_download(dir.path(), &second, &content("b", "BBB"))).unwrap();

        assert_eq!(saved_a, dir.path().join("Report.pdf"));
        assert_eq!(saved_b, dir.path().join("Report (b).pdf"));
        assert_eq!(std::fs::read_to_string(saved_a).unwrap(), "AAA");
        assert_eq!(std::fs::read_to_string(saved_b).unwrap(), "BBB");
    }

    #[test]
    fn test_qualified_file_name() {
        let mut e = entry("Budget.xlsx", "application/pdf");
        e.id = "x1".to_string();
        assert_eq!(qualified_file_name(&e, "Budget.xlsx"), "Budget (x1).xlsx");
        assert_eq!(qualified_file_name(&e, "notes"), "notes (x1)");
    }
}
