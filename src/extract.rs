//! Per-format text extraction for uploaded files.
//!
//! Dispatches on file extension and returns either plain text (fed to the
//! chunker downstream) or pre-formed chunks (CSV row batches, which bypass
//! the chunker and are never re-split). The ingestion layer treats any
//! extraction error as "nothing extracted" for that file so one malformed
//! upload cannot sink the whole batch.

use std::io::Read;

/// Rows per CSV batch when the caller does not override it.
pub const DEFAULT_CSV_ROWS_PER_CHUNK: usize = 20;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction output: chunker input or pre-formed chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// Full-document text, to be chunked later.
    Text(String),
    /// Pre-formed chunks (CSV row batches) that bypass the chunker.
    Chunks(Vec<String>),
}

#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Pdf(String),
    Docx(String),
    Csv(String),
    Encoding(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(ext) => write!(f, "unsupported file type: {}", ext),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
            ExtractError::Csv(e) => write!(f, "CSV extraction failed: {}", e),
            ExtractError::Encoding(e) => write!(f, "text decoding failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract text from an uploaded file, dispatching on its extension.
pub fn extract_file(
    name: &str,
    bytes: &[u8],
    csv_rows_per_chunk: usize,
) -> Result<Extracted, ExtractError> {
    match extension(name).as_deref() {
        Some("txt") => extract_txt(bytes).map(Extracted::Text),
        Some("pdf") => extract_pdf(bytes).map(Extracted::Text),
        Some("docx") => extract_docx(bytes).map(Extracted::Text),
        Some("csv") => extract_csv(bytes, csv_rows_per_chunk).map(Extracted::Chunks),
        other => Err(ExtractError::Unsupported(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

fn extension(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Encoding(e.to_string()))
}

/// Page-level text in page order, concatenated into one string.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Paragraph texts from `word/document.xml`, joined with newlines.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraphs(&doc_xml)
}

/// Walk `w:p` paragraphs collecting their `w:t` runs.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

/// Group CSV rows into fixed-size batches, prepending the header line to
/// every batch. Each batch is one retrieval unit; batches are never re-split.
fn extract_csv(bytes: &[u8], rows_per_chunk: usize) -> Result<Vec<String>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let header = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .iter()
        .collect::<Vec<_>>()
        .join(", ");

    let mut rows: Vec<String> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        rows.push(record.iter().collect::<Vec<_>>().join(", "));
    }

    let chunks = rows
        .chunks(rows_per_chunk.max(1))
        .map(|batch| format!("{}\n{}", header, batch.join("\n")))
        .collect();

    Ok(chunks)
}
