//! Upload files and transaction headers for contract submissions.

use bridge_traits::http::FilePart;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SimbaError};

/// A local file to attach to a multipart request.
///
/// The file is not opened here; the transport opens it right before the
/// request goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub name: String,
    pub mime: String,
}

impl UploadFile {
    /// Upload `path`, naming the part after the file and guessing its MIME
    /// type from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                SimbaError::Config(format!(
                    "A name must be provided for upload path {}",
                    path.display()
                ))
            })?;
        let mime = guess_mime(Path::new(&name));
        Ok(Self { path, name, mime })
    }

    /// Upload `path` under an explicit part name.
    pub fn named(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        let name = name.into();
        let mime = guess_mime(Path::new(&name));
        Self {
            path: path.into(),
            name,
            mime,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    fn to_part(&self) -> FilePart {
        FilePart {
            field_name: self.name.clone(),
            file_name: self.name.clone(),
            mime_type: self.mime.clone(),
            path: self.path.clone(),
        }
    }
}

fn guess_mime(name: &Path) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Files sent together with one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<UploadFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file: UploadFile) -> Self {
        self.add(file);
        self
    }

    /// Add a file. Files with an empty name are ignored.
    pub fn add(&mut self, file: UploadFile) {
        if !file.name.is_empty() {
            self.files.push(file);
        }
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub(crate) fn parts(&self) -> Vec<FilePart> {
        self.files.iter().map(UploadFile::to_part).collect()
    }
}

impl FromIterator<UploadFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = UploadFile>>(iter: I) -> Self {
        let mut set = FileSet::new();
        for file in iter {
            set.add(file);
        }
        set
    }
}

/// Optional `txn-*` headers controlling how a transaction is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnHeaders {
    pub dynamic_pricing: Option<String>,
    pub external: Option<String>,
    pub run_local: Option<String>,
    pub delegate: Option<String>,
    pub nonce: Option<String>,
    pub sender_token: Option<String>,
    pub sender: Option<String>,
    pub value: Option<String>,
}

impl TxnHeaders {
    /// Header map containing only the values that are set and non-empty.
    pub fn as_headers(&self) -> HashMap<String, String> {
        [
            ("txn-dynamic-pricing", &self.dynamic_pricing),
            ("txn-external", &self.external),
            ("txn-force-run-local", &self.run_local),
            ("txn-delegate", &self.delegate),
            ("txn-nonce", &self.nonce),
            ("txn-sender-token", &self.sender_token),
            ("txn-sender", &self.sender),
            ("txn-value", &self.value),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_derives_name_and_mime() {
        let file = UploadFile::new("/tmp/reports/summary.json").unwrap();
        assert_eq!(file.name, "summary.json");
        assert_eq!(file.mime, "application/json");

        let file = UploadFile::new("/tmp/blob.unknownext").unwrap();
        assert_eq!(file.mime, "application/octet-stream");

        let file = UploadFile::named("/tmp/x", "photo.png");
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.with_mime("image/x-custom").mime, "image/x-custom");
    }

    #[test]
    fn test_upload_file_requires_a_name() {
        assert!(matches!(UploadFile::new("/"), Err(SimbaError::Config(_))));
    }

    #[test]
    fn test_file_set_parts() {
        let set: FileSet = vec![
            UploadFile::named("/tmp/a.txt", "a.txt"),
            UploadFile::named("/tmp/b", ""),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.files().len(), 1);
        let parts = set.parts();
        assert_eq!(parts[0].field_name, "a.txt");
        assert_eq!(parts[0].mime_type, "text/plain");
        assert_eq!(parts[0].path, PathBuf::from("/tmp/a.txt"));
    }

    #[test]
    fn test_txn_headers_skip_unset_values() {
        let headers = TxnHeaders {
            nonce: Some("7".to_string()),
            sender: Some("0xabc".to_string()),
            value: Some(String::new()),
            ..Default::default()
        }
        .as_headers();

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["txn-nonce"], "7");
        assert_eq!(headers["txn-sender"], "0xabc");
        assert!(TxnHeaders::default().as_headers().is_empty());
    }
}
