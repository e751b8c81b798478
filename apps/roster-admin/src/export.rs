//! Spreadsheet export of projected rows.
//!
//! Rows are flattened into ordered records, laid out as a single-sheet
//! workbook and packed into an Office Open XML (`.xlsx`) container.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tracing::info;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::error::{AppError, SerializationError};

pub const EXTENSION: &str = "xlsx";
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MAX_SHEET_NAME_LEN: usize = 31;
const MAX_CELL_CHARS: usize = 32_767;
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Column name to scalar value, in column order.
pub type Record = Map<String, Value>;

/// A serialized workbook ready to be handed to a [`SaveBytes`] sink.
#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Host primitive that stores an exported buffer under a file name.
pub trait SaveBytes {
    fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf>;
}

/// Saves exports into a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveBytes for FileSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

pub fn export_file_name(name: &str) -> String {
    format!("{}.{}", name, EXTENSION)
}

/// Flattens each row into a [`Record`]. Every row must serialize to an object.
pub fn to_records<T: Serialize>(rows: &[T]) -> Result<Vec<Record>, SerializationError> {
    rows.iter()
        .enumerate()
        .map(|(row, item)| match serde_json::to_value(item)? {
            Value::Object(map) => Ok(map),
            _ => Err(SerializationError::NotARecord { row }),
        })
        .collect()
}

/// Serializes `rows` into an `.xlsx` document whose only sheet is named `name`.
pub fn build_export<T: Serialize>(rows: &[T], name: &str) -> Result<Export, SerializationError> {
    let records = to_records(rows)?;
    let bytes = write_workbook(&records, name)?;
    Ok(Export {
        file_name: export_file_name(name),
        bytes,
    })
}

/// Builds the export and passes it to `sink`.
pub fn export_rows<T, S>(rows: &[T], name: &str, sink: &S) -> Result<PathBuf, AppError>
where
    T: Serialize,
    S: SaveBytes + ?Sized,
{
    let export = build_export(rows, name)?;
    let path = sink
        .save(&export.file_name, &export.bytes)
        .map_err(|source| AppError::Save {
            file_name: export.file_name.clone(),
            source,
        })?;
    info!(
        "Exported {} rows ({} bytes) to {}",
        rows.len(),
        export.bytes.len(),
        path.display()
    );
    Ok(path)
}

/// Header is the first record's keys in order, followed by keys that only
/// appear in later records. Empty input produces an empty sheet.
pub fn header(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

pub fn validate_sheet_name(name: &str) -> Result<(), SerializationError> {
    let len = name.chars().count();
    let valid = len > 0
        && len <= MAX_SHEET_NAME_LEN
        && !name.contains(FORBIDDEN_SHEET_CHARS)
        && !name.chars().any(is_xml_forbidden)
        && !name.starts_with('\'')
        && !name.ends_with('\'');
    if valid {
        Ok(())
    } else {
        Err(SerializationError::InvalidSheetName(name.to_string()))
    }
}

pub fn write_workbook(records: &[Record], sheet_name: &str) -> Result<Vec<u8>, SerializationError> {
    validate_sheet_name(sheet_name)?;
    let sheet = sheet_xml(records)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, String); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", ROOT_RELS_XML.to_string()),
        ("xl/workbook.xml", workbook_xml(sheet_name)),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/styles.xml", STYLES_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet),
    ];
    for (path, contents) in parts {
        zip.start_file(path, options)?;
        zip.write_all(contents.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

fn sheet_xml(records: &[Record]) -> Result<String, SerializationError> {
    let columns = header(records);
    let mut xml = String::from(XML_DECL);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);

    if columns.is_empty() {
        xml.push_str("<sheetData/></worksheet>");
        return Ok(xml);
    }

    xml.push_str("<sheetData>");
    push_row(&mut xml, 1, columns.iter().map(|c| Some(Cell::Text(c.as_str()))));

    for (idx, record) in records.iter().enumerate() {
        let cells = columns
            .iter()
            .map(|column| cell_for(idx, column, record.get(column)))
            .collect::<Result<Vec<_>, _>>()?;
        push_row(&mut xml, idx + 2, cells.into_iter());
    }

    xml.push_str("</sheetData></worksheet>");
    Ok(xml)
}

enum Cell<'a> {
    Text(&'a str),
    Number(String),
    Bool(bool),
}

fn cell_for<'a>(
    row: usize,
    column: &str,
    value: Option<&'a Value>,
) -> Result<Option<Cell<'a>>, SerializationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(Cell::Bool(*b))),
        Some(Value::Number(n)) => Ok(Some(Cell::Number(n.to_string()))),
        Some(Value::String(s)) => {
            if s.chars().count() > MAX_CELL_CHARS {
                return Err(SerializationError::CellTooLong {
                    row,
                    column: column.to_string(),
                    max: MAX_CELL_CHARS,
                });
            }
            Ok(Some(Cell::Text(s)))
        }
        Some(Value::Array(_)) | Some(Value::Object(_)) => Err(SerializationError::NonScalar {
            row,
            column: column.to_string(),
        }),
    }
}

fn push_row<'a>(xml: &mut String, row: usize, cells: impl Iterator<Item = Option<Cell<'a>>>) {
    xml.push_str(&format!(r#"<row r="{}">"#, row));
    for (col, cell) in cells.enumerate() {
        let Some(cell) = cell else { continue };
        let reference = format!("{}{}", column_letter(col), row);
        let element = match cell {
            Cell::Text(s) => format!(
                r#"<c r="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                reference,
                escape_xml(&escape_cell_text(s))
            ),
            Cell::Number(n) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n),
            Cell::Bool(b) => format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, reference, u8::from(b)),
        };
        xml.push_str(&element);
    }
    xml.push_str("</row>");
}

/// Zero-based column index to spreadsheet letters (`0` → `A`, `26` → `AA`).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Characters XML 1.0 cannot carry: C0 controls other than tab and line
/// breaks, plus the non-characters U+FFFE and U+FFFF.
fn is_xml_forbidden(ch: char) -> bool {
    matches!(ch, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Applies the OOXML `_xHHHH_` escape to characters XML cannot carry. An
/// underscore that would otherwise read as the start of an escape is itself
/// escaped as `_x005F_`.
fn escape_cell_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (idx, ch) in raw.char_indices() {
        if is_xml_forbidden(ch) {
            out.push_str(&format!("_x{:04X}_", ch as u32));
        } else if ch == '_' && looks_like_escape(&raw[idx..]) {
            out.push_str("_x005F_");
        } else {
            out.push(ch);
        }
    }
    out
}

fn looks_like_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
        ),
        escape_xml(sheet_name)
    )
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#
);

const WORKBOOK_RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#
);
