//! `multipart/form-data` parsing and uploaded-file storage.
//!
//! Parts are parsed from a fully buffered body. File parts are copied into an
//! [`UploadFile`] that keeps small payloads in memory and spools larger ones to
//! an anonymous temporary file; the file is removed when the last `Arc` to it
//! is dropped, whichever path the request takes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tracing::debug;

/// `name="..."` and `filename="..."` parameters of a Content-Disposition header.
#[allow(clippy::expect_used)]
static DISPOSITION_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(name|filename)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;\s]+))"#)
        .expect("Content-Disposition regex should be valid")
});

enum Storage {
    Memory(Vec<u8>),
    Spooled(File),
}

/// An uploaded file part.
pub struct UploadFile {
    filename: Option<String>,
    content_type: Option<String>,
    size: usize,
    storage: Storage,
}

impl UploadFile {
    /// Store `data`, spooling to a temp file when it exceeds `spool_threshold` bytes.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from creating or writing the temp file.
    pub fn new(
        filename: Option<String>,
        content_type: Option<String>,
        data: &[u8],
        spool_threshold: usize,
    ) -> io::Result<Self> {
        let storage = if data.len() > spool_threshold {
            let mut file = tempfile::tempfile()?;
            file.write_all(data)?;
            file.flush()?;
            debug!(size = data.len(), "Upload spooled to temporary file");
            Storage::Spooled(file)
        } else {
            Storage::Memory(data.to_vec())
        };
        Ok(Self {
            filename,
            content_type,
            size: data.len(),
            storage,
        })
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_spooled(&self) -> bool {
        matches!(self.storage, Storage::Spooled(_))
    }

    /// Read the whole payload.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the spooled file.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        match &self.storage {
            Storage::Memory(data) => Ok(data.clone()),
            Storage::Spooled(file) => {
                let mut handle = file;
                handle.seek(SeekFrom::Start(0))?;
                let mut out = Vec::with_capacity(self.size);
                handle.read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    /// JSON summary used wherever a file has to appear as a plain value.
    #[must_use]
    pub fn describe(&self) -> Value {
        json!({
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.size,
        })
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("spooled", &self.is_spooled())
            .finish()
    }
}

/// One form entry: a text value or a file.
#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File(Arc<UploadFile>),
}

/// Why a multipart body was rejected.
#[derive(Debug)]
pub enum MultipartError {
    MissingBoundary,
    Malformed(&'static str),
    /// A text part named `name` is not valid UTF-8.
    InvalidText { name: String },
    TooManyParts(usize),
    Io(io::Error),
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::MissingBoundary => write!(f, "multipart body without boundary"),
            MultipartError::Malformed(what) => write!(f, "malformed multipart body: {}", what),
            MultipartError::InvalidText { name } => write!(f, "form field '{}' is not valid UTF-8", name),
            MultipartError::TooManyParts(max) => write!(f, "too many form parts, maximum is {}", max),
            MultipartError::Io(e) => write!(f, "failed to store upload: {}", e),
        }
    }
}

impl std::error::Error for MultipartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MultipartError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MultipartError {
    fn from(e: io::Error) -> Self {
        MultipartError::Io(e)
    }
}

/// Extract the `boundary` parameter from a content-type value.
#[must_use]
pub fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

struct PartHeaders {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
}

fn parse_part_headers(raw: &str) -> PartHeaders {
    let mut out = PartHeaders {
        name: None,
        filename: None,
        content_type: None,
    };
    for line in raw.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for caps in DISPOSITION_PARAM.captures_iter(value) {
                let param = caps.get(1).map(|m| m.as_str().to_ascii_lowercase());
                let val = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().replace("\\\"", "\""));
                match param.as_deref() {
                    Some("name") => out.name = val,
                    Some("filename") => out.filename = val,
                    _ => {}
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            out.content_type = Some(value.trim().to_string());
        }
    }
    out
}

/// Parse a buffered multipart body into ordered `(name, value)` entries.
///
/// A part with a `filename` parameter becomes a [`FormValue::File`].
///
/// # Errors
///
/// Fails on a missing boundary, malformed framing, more than `max_parts`
/// parts, or an I/O error while spooling a file.
pub fn parse_multipart(
    body: &[u8],
    content_type: &str,
    max_parts: usize,
    spool_threshold: usize,
) -> Result<Vec<(String, FormValue)>, MultipartError> {
    let boundary = boundary(content_type).ok_or(MultipartError::MissingBoundary)?;
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut entries = Vec::new();

    let mut pos = find(body, &delimiter, 0).ok_or(MultipartError::Malformed("no opening boundary"))?
        + delimiter.len();
    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(MultipartError::Malformed("boundary not followed by CRLF"));
        }
        pos += 2;

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(MultipartError::Malformed("unterminated part headers"))?;
        let headers = parse_part_headers(&String::from_utf8_lossy(&body[pos..header_end]));
        let data_start = header_end + 4;

        let mut closing = b"\r\n".to_vec();
        closing.extend_from_slice(&delimiter);
        let data_end = find(body, &closing, data_start).ok_or(MultipartError::Malformed("unterminated part"))?;
        let data = &body[data_start..data_end];

        if entries.len() >= max_parts {
            return Err(MultipartError::TooManyParts(max_parts));
        }
        let name = headers.name.ok_or(MultipartError::Malformed("part without a name"))?;
        let value = match headers.filename {
            Some(filename) => FormValue::File(Arc::new(UploadFile::new(
                Some(filename),
                headers.content_type,
                data,
                spool_threshold,
            )?)),
            None => match std::str::from_utf8(data) {
                Ok(text) => FormValue::Text(text.to_string()),
                Err(_) => return Err(MultipartError::InvalidText { name }),
            },
        };
        entries.push((name, value));
        pos = data_end + closing.len();
    }

    debug!(parts = entries.len(), "Multipart body parsed");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut out = String::new();
        for (name, filename, data) in parts {
            out.push_str(&format!("--{}\r\n", boundary));
            match filename {
                Some(f) => out.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                    name, f
                )),
                None => out.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)),
            }
            out.push_str(data);
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{}--\r\n", boundary));
        out.into_bytes()
    }

    #[test]
    fn test_boundary_param() {
        assert_eq!(boundary("multipart/form-data; boundary=\"abc\"").as_deref(), Some("abc"));
        assert_eq!(boundary("multipart/form-data"), None);
    }

    #[test]
    fn test_parse_text_and_file_parts() {
        let raw = body("xyz", &[("title", None, "hello"), ("doc", Some("a.txt"), "file body")]);
        let entries = parse_multipart(&raw, "multipart/form-data; boundary=xyz", 10, 1024).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0].1, FormValue::Text(t) if t == "hello"));
        match &entries[1].1 {
            FormValue::File(f) => {
                assert_eq!(f.filename(), Some("a.txt"));
                assert_eq!(f.read_all().unwrap(), b"file body");
                assert!(!f.is_spooled());
            }
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn test_large_file_is_spooled() {
        let payload = "x".repeat(64);
        let raw = body("b", &[("doc", Some("big.bin"), &payload)]);
        let entries = parse_multipart(&raw, "multipart/form-data; boundary=b", 10, 16).unwrap();
        let FormValue::File(f) = &entries[0].1 else {
            panic!("expected file");
        };
        assert!(f.is_spooled());
        assert_eq!(f.size(), 64);
        assert_eq!(f.read_all().unwrap(), payload.as_bytes());
    }

    #[test]
    fn test_invalid_utf8_text_part_is_rejected() {
        let mut raw = b"--b\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x66, 0xff, 0x6f]);
        raw.extend_from_slice(b"\r\n--b--\r\n");
        let err = parse_multipart(&raw, "multipart/form-data; boundary=b", 10, 16).unwrap_err();
        assert!(matches!(err, MultipartError::InvalidText { ref name } if name == "note"));
    }

    #[test]
    fn test_too_many_parts() {
        let raw = body("b", &[("a", None, "1"), ("b", None, "2")]);
        let err = parse_multipart(&raw, "multipart/form-data; boundary=b", 1, 16).unwrap_err();
        assert!(matches!(err, MultipartError::TooManyParts(1)));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_multipart(b"garbage", "multipart/form-data; boundary=b", 10, 16).unwrap_err();
        assert!(matches!(err, MultipartError::Malformed(_)));
    }
}
