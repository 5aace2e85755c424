use std::path::Path;
use tracing::{info, warn};

use super::BLOOD_TEST_REPORT_READER;

/// Prefix carried by every failed read so downstream code can tell it from report text
pub const READ_ERROR_MARKER: &str = "[document-read-error]";

/// Reads the text of a blood test report PDF.
///
/// Reading never fails: on any I/O or parse error the returned text is a
/// marked, human readable error message, which the pipeline then treats as
/// the document content.
#[derive(Debug, Clone, Default)]
pub struct DocumentReader;

impl DocumentReader {
    pub const NAME: &'static str = BLOOD_TEST_REPORT_READER;
    pub const DESCRIPTION: &'static str =
        "Reads and extracts data from a blood test report PDF file.";

    pub fn new() -> Self {
        Self
    }

    pub async fn read(&self, file_path: impl AsRef<Path>) -> String {
        let path = file_path.as_ref().to_path_buf();
        info!("Reading PDF: {}", path.display());

        let extracted = tokio::task::spawn_blocking({
            let path = path.clone();
            move || extract_text(&path)
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r);

        match extracted {
            Ok(text) => {
                info!(chars = text.len(), "Extracted text from {}", path.display());
                text
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                read_error_text(&e)
            }
        }
    }
}

pub fn is_read_error(text: &str) -> bool {
    text.starts_with(READ_ERROR_MARKER)
}

fn read_error_text(err: &str) -> String {
    format!(
        "{READ_ERROR_MARKER} Error reading PDF file: {err}. Please ensure the file path is correct and the file is a valid PDF."
    )
}

fn extract_text(path: &Path) -> Result<String, String> {
    let doc = lopdf::Document::load(path).map_err(|e| e.to_string())?;

    let mut report = String::new();
    for (page_num, _) in doc.get_pages() {
        let page_text = doc
            .extract_text(&[page_num])
            .map_err(|e| format!("page {page_num}: {e}"))?;
        report.push_str(&page_text);
        report.push('\n');
    }

    Ok(collapse_blank_lines(&report))
}

/// Collapse every run of consecutive newlines into a single newline
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_newline = false;
    for c in text.chars() {
        if c == '\n' {
            if previous_newline {
                continue;
            }
            previous_newline = true;
        } else {
            previous_newline = false;
        }
        out.push(c);
    }
    out
}
