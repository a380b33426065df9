//! Page-by-page text extraction from PDF bytes.

use crate::error::ProcessError;

/// Extracts the text of every page, in page order.
///
/// A page whose text cannot be decoded yields an empty string so that page
/// numbers in the output stay aligned with the document.
pub fn extract_pages(pdf_bytes: &[u8]) -> Result<Vec<String>, ProcessError> {
    let _span = tracing::info_span!("extraction.pages", bytes = pdf_bytes.len()).entered();

    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());

    for (page_num, _) in pages {
        match doc.extract_text(&[page_num]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                tracing::warn!(page = page_num, "Failed to extract page text: {}", e);
                texts.push(String::new());
            }
        }
    }

    tracing::debug!(pages = texts.len(), "Extracted PDF text");
    Ok(texts)
}

/// Frames a page's text with start/end markers. `page_num` is 1-based.
pub fn format_page_text(page_num: usize, text: &str) -> String {
    format!(
        "=== PAGE {n} START ===\n{text}\n=== PAGE {n} END ===\n",
        n = page_num,
        text = text
    )
}

/// File name of a page's text file: `page_001.txt`, `page_002.txt`, ...
pub fn page_file_name(page_num: usize) -> String {
    format!("page_{:03}.txt", page_num)
}
