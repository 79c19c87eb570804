//! XML Metadata Parser Module
//!
//! XLSX内部のXMLファイルから、calamineで取得できないセル単位の
//! Number Format Stringと1904年エポック判定を抽出するモジュール。
//! 日時セルとBase64セルの判別はこの情報に依存します。

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::XlsDataError;
use crate::security::{validate_zip_path, SecurityConfig};

/// XLSXメタデータパーサー
#[derive(Debug, Clone, Default)]
pub(crate) struct XlsxMetadataParser {
    /// numFmtId -> formatCode のマッピング（カスタム書式のみ）
    num_formats: HashMap<u32, String>,
    /// styleId（cellXfsの位置）-> numFmtId
    cell_xfs: Vec<u32>,
    /// シート名 -> セル座標 -> styleId
    sheet_styles: HashMap<String, HashMap<(u32, u32), u32>>,
    /// シート名 -> `<row>`要素が存在する行（0始まり）
    sheet_rows: HashMap<String, HashSet<u32>>,
    /// 1904年エポックを使用するかどうか
    is_1904: bool,
}

impl XlsxMetadataParser {
    /// XLSXファイル（ZIPアーカイブ）からメタデータを解析
    pub fn new<R: Read + Seek>(xlsx_reader: R) -> Result<Self, XlsDataError> {
        let security_config = SecurityConfig::default();

        let mut archive =
            ZipArchive::new(xlsx_reader).map_err(|e| XlsDataError::Zip(e.to_string()))?;

        security_config.check_entry_count(archive.len())?;

        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| XlsDataError::Zip(e.to_string()))?;
            validate_zip_path(file.name()).map_err(|e| {
                XlsDataError::SecurityViolation(format!("Invalid ZIP path: {}", e))
            })?;
            total_decompressed_size =
                security_config.check_entry_size(file.name(), file.size(), total_decompressed_size)?;
        }

        // 1. xl/styles.xml
        let (num_formats, cell_xfs) = match read_part(&mut archive, "xl/styles.xml")? {
            Some(xml) => parse_styles(&xml)?,
            None => (HashMap::new(), Vec::new()),
        };

        // 2. xl/workbook.xml と リレーションシップ
        let (is_1904, sheets) = match read_part(&mut archive, "xl/workbook.xml")? {
            Some(xml) => parse_workbook(&xml)?,
            None => (false, Vec::new()),
        };
        let relationships = match read_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        // 3. シートごとのセルスタイル
        let mut sheet_styles = HashMap::new();
        let mut sheet_rows = HashMap::new();
        for (sheet_name, relationship_id) in sheets {
            let Some(target) = relationships.get(&relationship_id) else {
                continue;
            };
            let part_name = resolve_part_name(target);
            if let Some(xml) = read_part(&mut archive, &part_name)? {
                let layout = parse_worksheet_layout(&xml)?;
                sheet_rows.insert(sheet_name.clone(), layout.rows);
                sheet_styles.insert(sheet_name, layout.styles);
            }
        }

        Ok(Self {
            num_formats,
            cell_xfs,
            sheet_styles,
            sheet_rows,
            is_1904,
        })
    }

    /// styleIdからNumber Format Stringを取得
    pub fn get_format_string(&self, style_id: u32) -> Option<&str> {
        let num_fmt_id = *self.cell_xfs.get(style_id as usize)?;
        if num_fmt_id < 164 {
            get_builtin_format(num_fmt_id)
        } else {
            self.num_formats.get(&num_fmt_id).map(String::as_str)
        }
    }

    /// シート内の全セルのNumber Format Stringを解決する
    pub fn cell_formats(&self, sheet_name: &str) -> HashMap<(u32, u32), String> {
        self.sheet_styles
            .get(sheet_name)
            .map(|styles| {
                styles
                    .iter()
                    .filter_map(|(coord, &style_id)| {
                        self.get_format_string(style_id)
                            .map(|fmt| (*coord, fmt.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// シート内で`<row>`要素が存在する行の集合
    pub fn present_rows(&self, sheet_name: &str) -> Option<HashSet<u32>> {
        self.sheet_rows.get(sheet_name).cloned()
    }

    /// 1904年エポックを使用するかどうか
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, XlsDataError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(XlsDataError::Zip(e.to_string())),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// リレーションシップのTargetをZIP内のパート名へ変換
///
/// `worksheets/sheet1.xml` -> `xl/worksheets/sheet1.xml`、
/// `/xl/worksheets/sheet1.xml` -> `xl/worksheets/sheet1.xml`
fn resolve_part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn attribute(e: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, XlsDataError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XlsDataError::Xml(format!("XML attribute error: {}", e)))?;
        if attr.key.local_name().as_ref() == local_name {
            let raw = std::str::from_utf8(&attr.value)?;
            let value = quick_xml::escape::unescape(raw)
                .map_err(|e| XlsDataError::Xml(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `<numFmts>` と `<cellXfs>` を解析
fn parse_styles(xml: &[u8]) -> Result<(HashMap<u32, String>, Vec<u32>), XlsDataError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut num_formats = HashMap::new();
    let mut cell_xfs = Vec::new();
    let mut in_num_fmts = false;
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"numFmts" => in_num_fmts = true,
                b"cellXfs" => in_cell_xfs = true,
                b"numFmt" if in_num_fmts => insert_num_format(&e, &mut num_formats)?,
                // <xf ...><alignment/></xf>
                b"xf" if in_cell_xfs => cell_xfs.push(xf_num_fmt_id(&e)?),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                // <numFmt numFmtId="164" formatCode="[Base64]"/>
                b"numFmt" if in_num_fmts => insert_num_format(&e, &mut num_formats)?,
                // <xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0"/>
                b"xf" if in_cell_xfs => cell_xfs.push(xf_num_fmt_id(&e)?),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"numFmts" => in_num_fmts = false,
                b"cellXfs" => in_cell_xfs = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsDataError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok((num_formats, cell_xfs))
}

fn insert_num_format(
    e: &BytesStart<'_>,
    num_formats: &mut HashMap<u32, String>,
) -> Result<(), XlsDataError> {
    let id = attribute(e, b"numFmtId")?;
    let code = attribute(e, b"formatCode")?;
    if let (Some(id), Some(code)) = (id, code) {
        num_formats.insert(id.parse()?, code);
    }
    Ok(())
}

fn xf_num_fmt_id(e: &BytesStart<'_>) -> Result<u32, XlsDataError> {
    match attribute(e, b"numFmtId")? {
        Some(id) => Ok(id.parse()?),
        None => Ok(0),
    }
}

/// `<workbookPr date1904>` と `<sheet name r:id>` を解析
fn parse_workbook(xml: &[u8]) -> Result<(bool, Vec<(String, String)>), XlsDataError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut is_1904 = false;
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    if let Some(value) = attribute(&e, b"date1904")? {
                        is_1904 = value == "1" || value == "true";
                    }
                }
                b"sheet" => {
                    if let (Some(name), Some(id)) = (attribute(&e, b"name")?, attribute(&e, b"id")?)
                    {
                        sheets.push((name, id));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsDataError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok((is_1904, sheets))
}

/// リレーションシップファイルを解析（Id -> Target）
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, XlsDataError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    if let (Some(id), Some(target)) =
                        (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                    {
                        relationships.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsDataError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// ワークシートXMLから読み取ったセルスタイルと行の存在情報
#[derive(Debug, Default)]
struct WorksheetLayout {
    /// セル座標 -> styleId（既定スタイル0は除く）
    styles: HashMap<(u32, u32), u32>,
    /// `<row>`要素が存在する行（0始まり）
    rows: HashSet<u32>,
}

/// ワークシートXMLから `<row r>` と `<c r s>` を収集
///
/// `r`属性が省略された行・セルは直前の行の次・直前のセルの右隣として扱います。
fn parse_worksheet_layout(xml: &[u8]) -> Result<WorksheetLayout, XlsDataError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut layout = WorksheetLayout::default();
    let mut current_row: u32 = 0;
    let mut next_col: u32 = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"row" => {
                current_row = row_index(&e)?.unwrap_or(current_row);
                layout.rows.insert(current_row);
                next_col = 0;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                current_row = row_index(&e)?.unwrap_or(current_row);
                layout.rows.insert(current_row);
                current_row += 1;
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let (row, col) = match attribute(&e, b"r")?.as_deref().and_then(parse_cell_ref) {
                    Some(coord) => coord,
                    None => (current_row, next_col),
                };
                next_col = col + 1;
                if let Some(s) = attribute(&e, b"s")? {
                    let style_id: u32 = s.parse()?;
                    if style_id != 0 {
                        layout.styles.insert((row, col), style_id);
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"row" => {
                current_row += 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsDataError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(layout)
}

/// `<row r>`の行番号を0始まりで取得
fn row_index(e: &BytesStart<'_>) -> Result<Option<u32>, XlsDataError> {
    match attribute(e, b"r")? {
        // Excelの行番号は1始まり
        Some(r) => Ok(Some(r.parse::<u32>()?.saturating_sub(1))),
        None => Ok(None),
    }
}

/// セル参照文字列を座標に変換（例: "B3" -> (2, 1)）
fn parse_cell_ref(ref_str: &str) -> Option<(u32, u32)> {
    let split = ref_str.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = ref_str.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }

    let col = letters
        .chars()
        .try_fold(0u32, |acc, ch| {
            acc.checked_mul(26)?.checked_add(ch as u32 - 'A' as u32 + 1)
        })?
        - 1;
    let row = digits.parse::<u32>().ok()?.checked_sub(1)?;

    Some((row, col))
}

/// ビルトイン書式ID（0-163）のマッピング
///
/// 日付判定に必要なものを含む、Excel標準書式IDの対応表です。
fn get_builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}
