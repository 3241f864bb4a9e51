//! Multi-format extraction of Markdown from downloaded documents.
//!
//! The format is chosen from the file extension. Files whose extension says
//! nothing useful (the `bin` fallback) are sniffed by their leading bytes.
//! Every function here is synchronous and CPU-bound; callers run it on the
//! blocking pool (see [`crate::converter`]).

use std::io::Read;
use thiserror::Error;

/// Extensions the bundled converter understands. Also the default allow-list.
/// `bin` is what extension-less URLs get; its content is sniffed.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "pptx", "xlsx", "html", "htm", "csv", "json", "txt", "md", "markdown", "xml",
    "bin",
];

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Last addressable spreadsheet column (`XFD`), zero-based.
const XLSX_MAX_COLUMN_INDEX: usize = 16_383;
/// Maximum cells in a rendered sheet table, counting empty padding.
const XLSX_MAX_TABLE_CELLS: usize = 1_000_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("document is not valid UTF-8 text")]
    NotUtf8,
}

/// Document formats the extractor can turn into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Html,
    Csv,
    Json,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "txt" | "text" | "md" | "markdown" | "xml" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Picks a format from the extension, falling back to content sniffing.
pub fn detect_format(extension: &str, bytes: &[u8]) -> Result<DocumentFormat, ExtractError> {
    if let Some(format) = DocumentFormat::from_extension(extension) {
        return Ok(format);
    }
    sniff_format(bytes).ok_or_else(|| ExtractError::UnsupportedFormat(format!(".{}", extension)))
}

fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    if bytes.starts_with(b"%PDF") {
        return Some(DocumentFormat::Pdf);
    }
    if bytes.starts_with(b"PK\x03\x04") {
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).ok()?;
        let mut names = archive.file_names();
        return names.find_map(|name| {
            if name == "word/document.xml" {
                Some(DocumentFormat::Docx)
            } else if name.starts_with("ppt/slides/") {
                Some(DocumentFormat::Pptx)
            } else if name.starts_with("xl/worksheets/") {
                Some(DocumentFormat::Xlsx)
            } else {
                None
            }
        });
    }
    let text = std::str::from_utf8(bytes).ok()?;
    let head: String = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(64)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        Some(DocumentFormat::Html)
    } else {
        Some(DocumentFormat::Text)
    }
}

/// Converts document bytes of a known format to Markdown.
pub fn extract_markdown(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Xlsx => extract_xlsx(bytes),
        DocumentFormat::Html => Ok(html2md::parse_html(decode_utf8(bytes)?)),
        DocumentFormat::Csv => Ok(csv_to_markdown(decode_utf8(bytes)?)),
        DocumentFormat::Json => Ok(json_to_markdown(decode_utf8(bytes)?)),
        DocumentFormat::Text => Ok(decode_utf8(bytes)?.to_string()),
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<&str, ExtractError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)?;
    Ok(text.trim_start_matches('\u{feff}'))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

// ── OOXML ────────────────────────────────────────────────────────────────

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ExtractError::Ooxml(format!("{} not found", name)),
        other => ExtractError::Ooxml(other.to_string()),
    })?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Names matching `prefix<N>.xml`, ordered by `N`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn xml_err(e: quick_xml::Error) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == local {
            a.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

fn heading_level(style: &str) -> Option<usize> {
    let lower = style.to_ascii_lowercase();
    let rest = lower.strip_prefix("heading")?;
    let level: usize = rest.trim().parse().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    use quick_xml::events::Event;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut heading: Option<usize> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => {
                    current.clear();
                    heading = None;
                }
                b"pStyle" => heading = attr_value(&e, b"val").as_deref().and_then(heading_level),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"pStyle" => heading = attr_value(&e, b"val").as_deref().and_then(heading_level),
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Event::Text(te) if in_text => {
                current.push_str(&te.unescape().map_err(xml_err)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(match heading {
                            Some(level) => format!("{} {}", "#".repeat(level), text),
                            None => text.to_string(),
                        });
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs.join("\n\n"))
}

/// Text of each `<a:p>` in a DrawingML part, one entry per non-empty paragraph.
fn drawingml_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::Text(te) if in_text => current.push_str(&te.unescape().map_err(xml_err)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(lines)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide");
    let mut sections = Vec::new();
    for (idx, name) in slide_names.iter().enumerate() {
        let xml = read_zip_entry_bounded(&mut archive, name, MAX_XML_ENTRY_BYTES)?;
        let lines = drawingml_paragraphs(&xml)?;
        let mut section = format!("<!-- Slide number: {} -->", idx + 1);
        for line in lines {
            section.push('\n');
            section.push_str(&line);
        }
        sections.push(section);
    }
    Ok(sections.join("\n\n"))
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = numbered_entries(&archive, "xl/worksheets/sheet");
    let mut sections = Vec::new();
    for (idx, name) in sheet_names.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let rows = read_sheet_rows(&sheet_xml, &shared_strings)?;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.len().saturating_mul(width) > XLSX_MAX_TABLE_CELLS {
            return Err(ExtractError::Ooxml(format!(
                "sheet exceeds {} table cells",
                XLSX_MAX_TABLE_CELLS
            )));
        }
        let mut section = format!("## Sheet{}", idx + 1);
        if !rows.is_empty() {
            section.push_str("\n\n");
            section.push_str(&markdown_table(&rows));
        }
        sections.push(section);
    }
    Ok(sections.join("\n\n"))
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;

    use quick_xml::events::Event;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(te) if in_text => current.push_str(&te.unescape().map_err(xml_err)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `AB12`.
///
/// `None` for references without letters or past column `XFD`.
fn column_index(cell_ref: &str) -> Option<usize> {
    let mut idx = 0usize;
    let mut letters = 0;
    for c in cell_ref.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = (c.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        idx = idx.checked_mul(26)?.checked_add(digit)?;
        letters += 1;
    }
    if letters == 0 || idx - 1 > XLSX_MAX_COLUMN_INDEX {
        return None;
    }
    Some(idx - 1)
}

fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    use quick_xml::events::Event;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type: Option<String> = None;
    let mut cell_col: Option<usize> = None;
    let mut bad_ref = false;
    let mut padded_cells = 0usize;
    let mut value = String::new();
    let mut in_value = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type = attr_value(&e, b"t");
                    match attr_value(&e, b"r") {
                        Some(r) => {
                            cell_col = column_index(&r);
                            bad_ref = cell_col.is_none();
                        }
                        None => {
                            cell_col = None;
                            bad_ref = false;
                        }
                    }
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Text(te) if in_value => value.push_str(&te.unescape().map_err(xml_err)?),
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" if bad_ref => {
                    cell_count += 1;
                    cell_type = None;
                    bad_ref = false;
                }
                b"c" => {
                    let raw = value.trim();
                    let text = match cell_type.as_deref() {
                        Some("s") => raw
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i))
                            .cloned()
                            .unwrap_or_default(),
                        _ => raw.to_string(),
                    };
                    let col = cell_col.unwrap_or(row.len()).min(XLSX_MAX_COLUMN_INDEX);
                    if row.len() <= col {
                        padded_cells += col + 1 - row.len();
                        if padded_cells > XLSX_MAX_TABLE_CELLS {
                            return Err(ExtractError::Ooxml(format!(
                                "sheet exceeds {} table cells",
                                XLSX_MAX_TABLE_CELLS
                            )));
                        }
                        row.resize(col + 1, String::new());
                    }
                    row[col] = text;
                    cell_count += 1;
                    cell_type = None;
                    cell_col = None;
                }
                b"row" => {
                    if row.iter().any(|c| !c.is_empty()) {
                        rows.push(std::mem::take(&mut row));
                    }
                    row.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

// ── Plain-text formats ───────────────────────────────────────────────────

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Renders rows as a Markdown table, using the first row as the header.
fn markdown_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    let render = |row: &Vec<String>| {
        let cells: Vec<String> = (0..width)
            .map(|i| escape_cell(row.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        format!("| {} |", cells.join(" | "))
    };
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(rows[1..].iter().map(render));
    lines.join("\n")
}

/// Splits CSV text into records. Handles quoted fields, doubled quotes and
/// newlines inside quotes.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
        .into_iter()
        .filter(|r| r.iter().any(|f| !f.is_empty()))
        .collect()
}

fn csv_to_markdown(text: &str) -> String {
    markdown_table(&parse_csv(text))
}

fn json_to_markdown(text: &str) -> String {
    let body = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string()),
        Err(_) => text.trim_end().to_string(),
    };
    format!("```json\n{}\n```", body)
}
