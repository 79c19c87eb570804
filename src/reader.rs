//! Reader Module
//!
//! ワークブックを`DataSet`へ読み込むリーダー。
//!
//! 処理は1回の`read`呼び出しの中で完結します。
//!
//! 1. ラージデータシート（`df$LARGE_DATA`）からラージデータマップを構築
//! 2. シートを物理順に走査し、コメントシート・スキップ対象・ラージデータシートを除外
//! 3. 残りのシートをテーブルとして読み込む（列定義 → 行）

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rayon::prelude::*;
use regex::Regex;

use crate::constants::{ALIAS_SHEET_PREFIX, COMMENT_SHEET_PREFIX, LARGE_DATA_SHEET_NAME};
use crate::dataset::{ColumnType, DataSet, DataSetError, DataTable, DataValue};
use crate::datetime::serial_to_datetime;
use crate::error::XlsDataError;
use crate::large_data::{extract_reference_key, LargeDataMap};
use crate::parser::WorkbookParser;
use crate::types::{CellValue, RawCell, SheetGrid};

/// ストリームから読み込んだ場合の診断用ファイル名
const STREAM_SOURCE_NAME: &str = "(stream)";

/// 読み込み設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ReaderConfig {
    /// シート名（`$`あり・なし）-> 実テーブル名
    pub table_name_map: HashMap<String, String>,

    /// テーブル名 -> 右トリムしない列名（大文字小文字を区別しない）
    pub not_trim_columns: HashMap<String, HashSet<String>>,

    /// テーブル名 -> 空セルを空文字列として扱う列名（大文字小文字を区別しない）
    pub empty_string_columns: HashMap<String, HashSet<String>>,

    /// スキップするシート名のパターン（完全一致）
    pub skip_sheet_pattern: Option<String>,

    /// 文字列セルを右トリムするか
    pub right_trim_cell_value: bool,
}

fn flexible_key(name: &str) -> String {
    name.to_uppercase()
}

fn flexible_column_map<T, C, S>(columns: C) -> HashMap<String, HashSet<String>>
where
    C: IntoIterator<Item = (T, Vec<S>)>,
    T: AsRef<str>,
    S: AsRef<str>,
{
    columns
        .into_iter()
        .map(|(table, names)| {
            (
                flexible_key(table.as_ref()),
                names.iter().map(|n| flexible_key(n.as_ref())).collect(),
            )
        })
        .collect()
}

/// `XlsReader`を構築するビルダー
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsdata::XlsReaderBuilder;
///
/// # fn main() -> Result<(), xlsdata::XlsDataError> {
/// let reader = XlsReaderBuilder::new()
///     .with_table_name_map([("$MBR", "MEMBER")])
///     .with_empty_string_columns([("MEMBER", vec!["MEMBER_NAME"])])
///     .with_skip_sheet_pattern("WORK_.*")
///     .right_trim_cell_value(true)
///     .build()?;
/// let dataset = reader.read_file("fixture.xlsx")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct XlsReaderBuilder {
    config: ReaderConfig,
}

impl XlsReaderBuilder {
    /// デフォルト設定（マッピングなし・トリムなし・スキップなし）
    pub fn new() -> Self {
        Self::default()
    }

    /// `$`で始まるシート名から実テーブル名へのマッピングを指定する
    ///
    /// キーは`$`付き・`$`なしのどちらでも構いません。
    pub fn with_table_name_map<I, K, V>(mut self, map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config.table_name_map = map
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// テーブルごとに右トリムしない列を指定する
    pub fn with_not_trim_columns<I, T, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<S>)>,
        T: AsRef<str>,
        S: AsRef<str>,
    {
        self.config.not_trim_columns = flexible_column_map(columns);
        self
    }

    /// テーブルごとに空セルを空文字列として読む列を指定する
    pub fn with_empty_string_columns<I, T, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (T, Vec<S>)>,
        T: AsRef<str>,
        S: AsRef<str>,
    {
        self.config.empty_string_columns = flexible_column_map(columns);
        self
    }

    /// シート名に完全一致したシートをスキップする正規表現を指定する
    pub fn with_skip_sheet_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.skip_sheet_pattern = Some(pattern.into());
        self
    }

    /// 文字列セルの右トリムを有効にする
    pub fn right_trim_cell_value(mut self, enabled: bool) -> Self {
        self.config.right_trim_cell_value = enabled;
        self
    }

    /// 設定を検証し、`XlsReader`を生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsDataError::Config` - スキップパターンが正規表現として不正な場合
    pub fn build(self) -> Result<XlsReader, XlsDataError> {
        let skip_sheet_regex = match &self.config.skip_sheet_pattern {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                XlsDataError::Config(format!("Invalid skip sheet pattern '{}': {}", pattern, e))
            })?),
            None => None,
        };

        Ok(XlsReader {
            config: self.config,
            skip_sheet_regex,
        })
    }
}

/// ワークブックを`DataSet`へ読み込むリーダー
#[derive(Debug)]
pub struct XlsReader {
    config: ReaderConfig,
    skip_sheet_regex: Option<Regex>,
}

/// 1テーブル分の読み込み文脈
struct TableContext<'a> {
    file: &'a str,
    table_name: &'a str,
    not_trim_columns: Option<&'a HashSet<String>>,
    empty_string_columns: Option<&'a HashSet<String>>,
    large_data: &'a LargeDataMap,
    right_trim: bool,
}

impl TableContext<'_> {
    fn is_right_trim_target(&self, column: &str) -> bool {
        self.right_trim && !self.is_not_trim(column)
    }

    fn is_not_trim(&self, column: &str) -> bool {
        self.not_trim_columns
            .is_some_and(|set| set.contains(&flexible_key(column)))
    }

    fn is_empty_string_target(&self, column: &str) -> bool {
        self.empty_string_columns
            .is_some_and(|set| set.contains(&flexible_key(column)))
    }
}

impl XlsReader {
    /// ストリームからワークブックを読み込む
    pub fn read<R: Read>(&self, input: R) -> Result<DataSet, XlsDataError> {
        let parser = WorkbookParser::open(input)?;
        self.read_workbook(parser, STREAM_SOURCE_NAME)
    }

    /// ファイルからワークブックを読み込む
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<DataSet, XlsDataError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| XlsDataError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let parser = WorkbookParser::open(file)?;
        self.read_workbook(parser, &path.display().to_string())
    }

    fn read_workbook(
        &self,
        mut parser: WorkbookParser,
        file: &str,
    ) -> Result<DataSet, XlsDataError> {
        let sheet_names = parser.sheet_names();

        // 1. ラージデータマップ（最初に見つかった1枚のみ）
        let large_data = match sheet_names.iter().find(|n| n.as_str() == LARGE_DATA_SHEET_NAME) {
            Some(name) => LargeDataMap::from_sheet(&parser.load_sheet(name)?)?,
            None => LargeDataMap::default(),
        };
        if !large_data.is_empty() {
            log::debug!("Large data sheet found in {}", file);
        }

        // 2. シートの選別とテーブル名解決（物理順・逐次）
        let mut targets = Vec::new();
        for sheet_name in &sheet_names {
            if self.is_skip_sheet(sheet_name) {
                continue;
            }
            let table_name = self.resolve_table_name(sheet_name)?;
            targets.push((table_name, parser.load_sheet(sheet_name)?));
        }

        // 3. テーブルの構築（並列、順序は保持）
        let tables = targets
            .par_iter()
            .map(|(table_name, grid)| {
                let context = TableContext {
                    file,
                    table_name,
                    not_trim_columns: self.config.not_trim_columns.get(&flexible_key(table_name)),
                    empty_string_columns: self
                        .config
                        .empty_string_columns
                        .get(&flexible_key(table_name)),
                    large_data: &large_data,
                    right_trim: self.config.right_trim_cell_value,
                };
                read_table(&context, grid)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut dataset = DataSet::new();
        for table in tables {
            dataset.push_table(table);
        }
        Ok(dataset)
    }

    fn is_skip_sheet(&self, sheet_name: &str) -> bool {
        if sheet_name == LARGE_DATA_SHEET_NAME {
            return true;
        }
        if sheet_name.starts_with(COMMENT_SHEET_PREFIX) {
            log::info!("Skip the comment sheet: {}", sheet_name);
            return true;
        }
        if let Some(regex) = &self.skip_sheet_regex {
            if regex.is_match(sheet_name) {
                log::info!(
                    "Skip the sheet '{}' matched by the pattern '{}'",
                    sheet_name,
                    self.config.skip_sheet_pattern.as_deref().unwrap_or_default()
                );
                return true;
            }
        }
        false
    }

    fn resolve_table_name(&self, sheet_name: &str) -> Result<String, XlsDataError> {
        let Some(alias) = sheet_name.strip_prefix(ALIAS_SHEET_PREFIX) else {
            return Ok(sheet_name.to_string());
        };
        self.config
            .table_name_map
            .get(sheet_name)
            .or_else(|| self.config.table_name_map.get(alias))
            .cloned()
            .ok_or_else(|| XlsDataError::MappingTableNotFound {
                sheet: sheet_name.to_string(),
                table_name_map: format!(
                    "{:?}",
                    self.config.table_name_map.iter().collect::<BTreeMap<_, _>>()
                ),
            })
    }
}

fn read_table(context: &TableContext<'_>, grid: &SheetGrid) -> Result<DataTable, XlsDataError> {
    let mut table = DataTable::new(context.table_name);
    setup_columns(context, grid, &mut table)?;
    setup_rows(context, grid, &mut table)?;
    Ok(table)
}

/// 1行目を列定義として読み、2行目のセルから型を推論する
fn setup_columns(
    context: &TableContext<'_>,
    grid: &SheetGrid,
    table: &mut DataTable,
) -> Result<(), XlsDataError> {
    let mut col = 0u32;
    while let Some(cell) = grid.cell(0, col) {
        let name = cell.value.as_raw_string().trim().to_string();
        if name.is_empty() {
            break;
        }
        let column_type = grid
            .cell(1, col)
            .map(|sample| infer_column_type(&sample))
            .unwrap_or(ColumnType::String);
        table
            .add_column(name, column_type)
            .map_err(|e| match e {
                DataSetError::DuplicateColumn { column, .. } => {
                    XlsDataError::DuplicateColumnDefinition {
                        file: context.file.to_string(),
                        sheet: grid.name.clone(),
                        column,
                    }
                }
                other => XlsDataError::DataSet(other),
            })?;
        col += 1;
    }

    if table.column_size() == 0 {
        return Err(XlsDataError::FirstRowNotColumnDefinition {
            file: context.file.to_string(),
            sheet: grid.name.clone(),
        });
    }
    Ok(())
}

/// サンプルセルから列の型を推論する
fn infer_column_type(cell: &RawCell<'_>) -> ColumnType {
    match cell.value {
        CellValue::Number(_) | CellValue::DateTime(_) => {
            if cell.is_date_formatted() {
                ColumnType::Timestamp
            } else {
                ColumnType::Decimal
            }
        }
        CellValue::Bool(_) => ColumnType::Boolean,
        CellValue::String(_) if cell.is_base64_formatted() => ColumnType::Binary,
        _ => ColumnType::String,
    }
}

fn setup_rows(
    context: &TableContext<'_>,
    grid: &SheetGrid,
    table: &mut DataTable,
) -> Result<(), XlsDataError> {
    let column_span = table.column_size() as u32;
    let mut physical_row = 1u32;
    while !grid.is_null_row(physical_row, column_span) {
        let row_number = physical_row as usize + 1;
        let row = table.add_row();
        for col in 0..table.column_size() {
            let cell = grid.cell(physical_row, col as u32);
            let column_name = table.columns()[col].name().to_string();
            let value = extract_value(context, &column_name, cell.as_ref(), row_number, grid.is_1904)?;
            add_value_with_recovery(context, table, row, col, &column_name, cell.as_ref(), value, row_number)?;
        }
        physical_row += 1;
    }
    Ok(())
}

/// 値を格納し、テキストセルの解析失敗時は列を文字列型へ降格して1回だけ再試行する
#[allow(clippy::too_many_arguments)]
fn add_value_with_recovery(
    context: &TableContext<'_>,
    table: &mut DataTable,
    row: usize,
    col: usize,
    column_name: &str,
    cell: Option<&RawCell<'_>>,
    value: DataValue,
    row_number: usize,
) -> Result<(), XlsDataError> {
    let is_textual = cell.is_some_and(|c| c.is_textual());
    let failure = match table.add_value(row, column_name, value.clone()) {
        Ok(()) => return Ok(()),
        Err(e) if e.is_parse_failure() && is_textual => {
            log::warn!(
                "The column type was changed to STRING: table={}, column={}, row={}, value={}, cause={}",
                context.table_name,
                column_name,
                row_number,
                value,
                e
            );
            table.demote_column_to_string(col);
            match table.add_value(row, column_name, value.clone()) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            }
        }
        Err(e) => e,
    };

    Err(XlsDataError::CellValueHandling {
        file: context.file.to_string(),
        table: context.table_name.to_string(),
        column: column_name.to_string(),
        mapping_type: table.columns()[col].column_type(),
        cell_kind: cell.map(|c| c.value.kind_name()).unwrap_or("Blank"),
        value: value.to_string(),
        row_number,
        source: failure,
    })
}

/// セルから正規化済みの値を取り出す
fn extract_value(
    context: &TableContext<'_>,
    column_name: &str,
    cell: Option<&RawCell<'_>>,
    row_number: usize,
    is_1904: bool,
) -> Result<DataValue, XlsDataError> {
    let empty_or_null = || {
        if context.is_empty_string_target(column_name) {
            DataValue::String(String::new())
        } else {
            DataValue::Null
        }
    };

    let Some(cell) = cell else {
        return Ok(empty_or_null());
    };

    match &cell.value {
        CellValue::Number(n) | CellValue::DateTime(n) => {
            if cell.is_date_formatted() {
                Ok(serial_to_datetime(*n, is_1904)
                    .map(DataValue::Timestamp)
                    .unwrap_or(DataValue::Decimal(*n)))
            } else {
                Ok(normalize_number(*n))
            }
        }
        CellValue::Bool(b) => Ok(DataValue::Boolean(*b)),
        CellValue::Error(_) => Ok(empty_or_null()),
        CellValue::String(raw) => {
            let mut text = if context.is_right_trim_target(column_name) {
                raw.trim_end().to_string()
            } else {
                raw.clone()
            };
            if text.is_empty() {
                if !context.is_empty_string_target(column_name) {
                    return Ok(DataValue::Null);
                }
                return Ok(DataValue::String(text));
            }
            text = text.replace("\r\n", "\n");

            if cell.is_base64_formatted() {
                return BASE64
                    .decode(text.as_bytes())
                    .map(DataValue::Binary)
                    .map_err(|e| XlsDataError::CellValueHandling {
                        file: context.file.to_string(),
                        table: context.table_name.to_string(),
                        column: column_name.to_string(),
                        mapping_type: ColumnType::Binary,
                        cell_kind: cell.value.kind_name(),
                        value: text.clone(),
                        row_number,
                        source: DataSetError::Base64Decode {
                            message: e.to_string(),
                        },
                    });
            }

            resolve_large_data(context, column_name, text, row_number).map(DataValue::String)
        }
    }
}

/// 小数部がなければ整数、あれば10進数として扱う
fn normalize_number(n: f64) -> DataValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        DataValue::Integer(n as i64)
    } else {
        DataValue::Decimal(n)
    }
}

fn resolve_large_data(
    context: &TableContext<'_>,
    column_name: &str,
    text: String,
    row_number: usize,
) -> Result<String, XlsDataError> {
    let Some(key) = extract_reference_key(&text) else {
        return Ok(text);
    };
    match context.large_data.resolve(context.table_name, column_name, key) {
        Some(resolved) => Ok(resolved.replace("\r\n", "\n")),
        None => Err(XlsDataError::LargeDataReferenceNotFound {
            table: context.table_name.to_string(),
            column: column_name.to_string(),
            row_number,
            key: key.to_string(),
            value: text.clone(),
        }),
    }
}
