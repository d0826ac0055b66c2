//! Input sniffing: classify a source file before any collaborator runs.
//!
//! ## Why sniff at all?
//!
//! docling takes seconds to load its models before it notices that a `.pdf`
//! is really an HTML error page or a truncated download. Checking the
//! extension against the supported set and validating the header here turns
//! those cases into a precise per-file failure in microseconds.

use crate::error::FileError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Extensions (lowercase, without the dot) the conversion collaborator accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "pptx", "xlsx", "html", "htm", "md", "csv", "adoc", "asciidoc", "png", "jpg",
    "jpeg", "tif", "tiff", "bmp",
];

/// Image extensions the OCR collaborator is run on.
pub const OCR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Broad kind of a sniffed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image,
    /// Office, markup or tabular document; only checked for being non-empty.
    Document,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Whether the conversion collaborator accepts files with this path's extension.
pub fn is_supported(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Whether OCR applies to this path (`.jpg`, `.jpeg`, `.png`, any case).
pub fn is_ocr_eligible(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|e| OCR_EXTENSIONS.contains(&e.as_str()))
}

/// Classify `path` and validate that its contents match its extension.
pub fn sniff(path: &Path) -> Result<InputKind, FileError> {
    let ext = lowercase_extension(path).unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(FileError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: if ext.is_empty() { "(none)".to_string() } else { ext },
        });
    }

    let corrupt = |detail: String| FileError::CorruptInput {
        path: path.to_path_buf(),
        detail,
    };

    let len = std::fs::metadata(path)
        .map_err(|e| corrupt(format!("cannot stat: {e}")))?
        .len();
    if len == 0 {
        return Err(corrupt("file is empty".into()));
    }

    let kind = if ext == "pdf" {
        let mut magic = [0u8; 4];
        let mut f = std::fs::File::open(path).map_err(|e| corrupt(format!("cannot open: {e}")))?;
        if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
            return Err(corrupt(format!(
                "missing %PDF header (starts with {:02x?})",
                &magic[..(len.min(4) as usize)]
            )));
        }
        InputKind::Pdf
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        let (w, h) = image::ImageReader::open(path)
            .map_err(|e| corrupt(format!("cannot open: {e}")))?
            .with_guessed_format()
            .map_err(|e| corrupt(format!("cannot read header: {e}")))?
            .into_dimensions()
            .map_err(|e| corrupt(format!("not a decodable image: {e}")))?;
        debug!("{}: {w}x{h} image", path.display());
        InputKind::Image
    } else {
        InputKind::Document
    };

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_eligibility_is_case_insensitive() {
        assert!(is_ocr_eligible(Path::new("scan.PNG")));
        assert!(is_ocr_eligible(Path::new("a/b/photo.jpeg")));
        assert!(!is_ocr_eligible(Path::new("scan.tiff")));
        assert!(!is_ocr_eligible(Path::new("doc.pdf")));
        assert!(!is_ocr_eligible(Path::new("README")));
    }

    #[test]
    fn supported_set() {
        assert!(is_supported(Path::new("x.DOCX")));
        assert!(is_supported(Path::new("x.tif")));
        assert!(!is_supported(Path::new("x.xyz")));
        assert!(!is_supported(Path::new("Makefile")));
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let err = sniff(Path::new("/does/not/exist/notes.xyz")).unwrap_err();
        match err {
            FileError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "xyz"),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn valid_pdf_header() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.pdf");
        std::fs::write(&p, b"%PDF-1.4\n%%EOF\n").unwrap();
        assert_eq!(sniff(&p).unwrap(), InputKind::Pdf);
    }

    #[test]
    fn pdf_without_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.pdf");
        std::fs::write(&p, b"not a pdf").unwrap();
        assert!(matches!(sniff(&p), Err(FileError::CorruptInput { .. })));
    }

    #[test]
    fn empty_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty.docx");
        std::fs::write(&p, b"").unwrap();
        let err = sniff(&p).unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {err}");
    }

    #[test]
    fn real_png_is_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("b.png");
        image::RgbImage::new(4, 4).save(&p).unwrap();
        assert_eq!(sniff(&p).unwrap(), InputKind::Image);
    }

    #[test]
    fn garbage_png_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("b.png");
        std::fs::write(&p, b"definitely not an image").unwrap();
        assert!(matches!(sniff(&p), Err(FileError::CorruptInput { .. })));
    }

    #[test]
    fn documents_only_need_content() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.md");
        std::fs::write(&p, b"# Notes\n").unwrap();
        assert_eq!(sniff(&p).unwrap(), InputKind::Document);
    }
}
