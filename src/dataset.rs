//! Data Set Module
//!
//! リーダーとライターが共有する汎用インメモリ表形式モデル。
//! テーブル・列・行を順序付きで保持し、列の型に従って値を正規化します。

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::error::XlsDataError;

/// データセット操作のエラー
///
/// テキストセル由来の解析失敗（`is_parse_failure`）は、
/// リーダーが列を文字列型へ降格して回復する対象です。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataSetError {
    /// 列が見つからない
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// 列名の重複
    #[error("Column '{column}' already exists in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// 行インデックスが範囲外
    #[error("Row index {row} is out of range (rows: {size})")]
    RowOutOfRange { row: usize, size: usize },

    /// 数値として解釈できない
    #[error("Failed to parse '{value}' as a number")]
    NumberParse { value: String },

    /// 日時として解釈できない
    #[error("Failed to parse '{value}' as a timestamp")]
    TimestampParse { value: String },

    /// 論理値として解釈できない
    #[error("Failed to parse '{value}' as a boolean")]
    BooleanParse { value: String },

    /// Base64として解釈できない
    #[error("Failed to decode base64 value: {message}")]
    Base64Decode { message: String },

    /// 値の種類と列の型が両立しない
    #[error("Cannot convert {from} value to {to}")]
    TypeMismatch { from: &'static str, to: ColumnType },
}

impl DataSetError {
    /// 値の解析失敗かどうか（列の構造に関するエラーは含まない）
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            DataSetError::NumberParse { .. }
                | DataSetError::TimestampParse { .. }
                | DataSetError::BooleanParse { .. }
                | DataSetError::Base64Decode { .. }
        )
    }
}

/// 列の論理型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    /// 文字列
    String,
    /// 10進数値
    Decimal,
    /// 日時
    Timestamp,
    /// 論理値
    Boolean,
    /// バイナリ
    Binary,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "STRING",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Binary => "BINARY",
        };
        f.write_str(name)
    }
}

impl ColumnType {
    /// 値をこの型の表現へ変換する
    ///
    /// # 戻り値
    ///
    /// * `Ok(DataValue)` - 変換後の値（`Null`はそのまま）
    /// * `Err(DataSetError)` - 変換できない場合
    pub fn convert(&self, value: DataValue) -> Result<DataValue, DataSetError> {
        if value.is_null() {
            return Ok(DataValue::Null);
        }
        match self {
            ColumnType::String => Ok(match value {
                DataValue::String(s) => DataValue::String(s),
                other => DataValue::String(other.to_string()),
            }),
            ColumnType::Decimal => match value {
                DataValue::Integer(_) | DataValue::Decimal(_) => Ok(value),
                DataValue::String(s) if s.is_empty() => Ok(DataValue::Null),
                DataValue::String(s) => parse_number(&s),
                other => Err(DataSetError::TypeMismatch {
                    from: other.kind_name(),
                    to: *self,
                }),
            },
            ColumnType::Timestamp => match value {
                DataValue::Timestamp(_) => Ok(value),
                DataValue::String(s) if s.is_empty() => Ok(DataValue::Null),
                DataValue::String(s) => parse_timestamp(&s)
                    .map(DataValue::Timestamp)
                    .ok_or(DataSetError::TimestampParse { value: s }),
                other => Err(DataSetError::TypeMismatch {
                    from: other.kind_name(),
                    to: *self,
                }),
            },
            ColumnType::Boolean => match value {
                DataValue::Boolean(_) => Ok(value),
                DataValue::String(s) if s.is_empty() => Ok(DataValue::Null),
                DataValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(DataValue::Boolean(true)),
                    "false" | "0" => Ok(DataValue::Boolean(false)),
                    _ => Err(DataSetError::BooleanParse { value: s }),
                },
                DataValue::Integer(1) => Ok(DataValue::Boolean(true)),
                DataValue::Integer(0) => Ok(DataValue::Boolean(false)),
                other => Err(DataSetError::TypeMismatch {
                    from: other.kind_name(),
                    to: *self,
                }),
            },
            ColumnType::Binary => match value {
                DataValue::Binary(_) => Ok(value),
                DataValue::String(s) if s.is_empty() => Ok(DataValue::Null),
                DataValue::String(s) => BASE64
                    .decode(s.as_bytes())
                    .map(DataValue::Binary)
                    .map_err(|e| DataSetError::Base64Decode {
                        message: e.to_string(),
                    }),
                other => Err(DataSetError::TypeMismatch {
                    from: other.kind_name(),
                    to: *self,
                }),
            },
        }
    }
}

fn parse_number(s: &str) -> Result<DataValue, DataSetError> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(DataValue::Integer(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(DataValue::Decimal(f)),
        _ => Err(DataSetError::NumberParse {
            value: s.to_string(),
        }),
    }
}

const TIMESTAMP_PATTERNS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_PATTERNS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    TIMESTAMP_PATTERNS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(trimmed, p).ok())
        .or_else(|| {
            DATE_PATTERNS
                .iter()
                .find_map(|p| NaiveDate::parse_from_str(trimmed, p).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// セル値
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// 値なし
    Null,
    /// 文字列（空文字列を含む）
    String(String),
    /// 小数部を持たない数値
    Integer(i64),
    /// 小数部を持つ数値
    Decimal(f64),
    /// 論理値
    Boolean(bool),
    /// 日時（ミリ秒精度）
    Timestamp(NaiveDateTime),
    /// バイナリ
    Binary(Vec<u8>),
}

impl DataValue {
    /// 値が`Null`かどうかを判定
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// 文字列値を参照する
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            DataValue::Null => "Null",
            DataValue::String(_) => "String",
            DataValue::Integer(_) => "Integer",
            DataValue::Decimal(_) => "Decimal",
            DataValue::Boolean(_) => "Boolean",
            DataValue::Timestamp(_) => "Timestamp",
            DataValue::Binary(_) => "Binary",
        }
    }
}

/// 文字列型へ降格するときの正規化された文字列表現
impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => Ok(()),
            DataValue::String(s) => f.write_str(s),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Decimal(d) => write!(f, "{}", d),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.3f")),
            DataValue::Binary(bytes) => f.write_str(&BASE64.encode(bytes)),
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::Null => serializer.serialize_unit(),
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Integer(i) => serializer.serialize_i64(*i),
            DataValue::Decimal(d) => serializer.serialize_f64(*d),
            DataValue::Boolean(b) => serializer.serialize_bool(*b),
            DataValue::Timestamp(_) | DataValue::Binary(_) => {
                serializer.serialize_str(&self.to_string())
            }
        }
    }
}

/// 列定義
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataColumn {
    name: String,
    column_type: ColumnType,
}

impl DataColumn {
    /// 列名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 列の型
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

/// 行（列と同じ数の値を位置で保持する）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DataRow {
    values: Vec<DataValue>,
}

impl DataRow {
    /// 位置で値を取得
    pub fn value(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    /// すべての値
    pub fn values(&self) -> &[DataValue] {
        &self.values
    }
}

/// テーブル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTable {
    name: String,
    columns: Vec<DataColumn>,
    rows: Vec<DataRow>,
    #[serde(skip)]
    column_index: HashMap<String, usize>,
}

impl DataTable {
    /// 空のテーブルを生成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            column_index: HashMap::new(),
        }
    }

    /// テーブル名（DB上の名前）
    pub fn table_db_name(&self) -> &str {
        &self.name
    }

    /// 列を追加する
    ///
    /// 既存の行には`Null`が補われ、行の値数と列数は常に一致します。
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
    ) -> Result<&DataColumn, DataSetError> {
        let name = name.into();
        if self.column_index.contains_key(&name) {
            return Err(DataSetError::DuplicateColumn {
                table: self.name.clone(),
                column: name,
            });
        }
        self.column_index.insert(name.clone(), self.columns.len());
        self.columns.push(DataColumn { name, column_type });
        for row in &mut self.rows {
            row.values.push(DataValue::Null);
        }
        Ok(&self.columns[self.columns.len() - 1])
    }

    /// 値がすべて`Null`の行を追加し、そのインデックスを返す
    pub fn add_row(&mut self) -> usize {
        self.rows.push(DataRow {
            values: vec![DataValue::Null; self.columns.len()],
        });
        self.rows.len() - 1
    }

    /// 列名を指定して値を格納する（列の型に従って変換される）
    pub fn add_value(
        &mut self,
        row: usize,
        column_name: &str,
        value: DataValue,
    ) -> Result<(), DataSetError> {
        let column = self.column_position(column_name)?;
        let size = self.rows.len();
        let converted = self.columns[column].column_type.convert(value)?;
        let target = self
            .rows
            .get_mut(row)
            .ok_or(DataSetError::RowOutOfRange { row, size })?;
        target.values[column] = converted;
        Ok(())
    }

    /// 列を文字列型へ降格し、既存行の値も文字列へ変換する
    pub fn demote_column_to_string(&mut self, index: usize) {
        let Some(column) = self.columns.get_mut(index) else {
            return;
        };
        column.column_type = ColumnType::String;
        for row in &mut self.rows {
            let value = std::mem::replace(&mut row.values[index], DataValue::Null);
            row.values[index] = match value {
                DataValue::Null => DataValue::Null,
                DataValue::String(s) => DataValue::String(s),
                other => DataValue::String(other.to_string()),
            };
        }
    }

    /// 位置で列を取得
    pub fn column(&self, index: usize) -> Option<&DataColumn> {
        self.columns.get(index)
    }

    /// 名前で列を取得
    pub fn column_by_name(&self, name: &str) -> Option<&DataColumn> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    /// すべての列
    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    /// 位置で行を取得
    pub fn row(&self, index: usize) -> Option<&DataRow> {
        self.rows.get(index)
    }

    /// すべての行
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// 行と列名を指定して値を取得
    pub fn value(&self, row: usize, column_name: &str) -> Option<&DataValue> {
        let column = *self.column_index.get(column_name)?;
        self.rows.get(row).and_then(|r| r.values.get(column))
    }

    pub fn column_size(&self) -> usize {
        self.columns.len()
    }

    pub fn row_size(&self) -> usize {
        self.rows.len()
    }

    fn column_position(&self, column_name: &str) -> Result<usize, DataSetError> {
        self.column_index
            .get(column_name)
            .copied()
            .ok_or_else(|| DataSetError::ColumnNotFound {
                table: self.name.clone(),
                column: column_name.to_string(),
            })
    }
}

/// データセット（名前付きテーブルの順序付き集合）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSet {
    tables: Vec<DataTable>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// テーブルを追加し、その可変参照を返す
    pub fn add_table(&mut self, name: impl Into<String>) -> &mut DataTable {
        self.tables.push(DataTable::new(name));
        let last = self.tables.len() - 1;
        &mut self.tables[last]
    }

    pub(crate) fn push_table(&mut self, table: DataTable) {
        self.tables.push(table);
    }

    /// 名前でテーブルを取得（同名が複数ある場合は最初のもの）
    pub fn table(&self, name: &str) -> Option<&DataTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// 位置でテーブルを取得
    pub fn table_at(&self, index: usize) -> Option<&DataTable> {
        self.tables.get(index)
    }

    /// すべてのテーブル
    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }

    pub fn table_size(&self) -> usize {
        self.tables.len()
    }

    /// データセットを整形済みJSONとして出力する
    ///
    /// 日時は`%Y-%m-%d %H:%M:%S%.3f`、バイナリはBase64文字列になります。
    pub fn to_json(&self) -> Result<String, XlsDataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
