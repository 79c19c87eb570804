//! Types Module
//!
//! パーサーとリーダーの間で受け渡す物理セルの型。

use calamine::{Data, Range};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::constants::BASE64_CELL_FORMAT;

/// 物理セルの値
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// calamineが日付書式と判定した数値（シリアル値）
    DateTime(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// エラー値（例: #DIV/0!）
    Error(String),
}

impl CellValue {
    /// 診断メッセージ用のセル種別
    pub fn kind_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) | CellValue::DateTime(_) => "Numeric",
            CellValue::String(_) => "String",
            CellValue::Bool(_) => "Boolean",
            CellValue::Error(_) => "Error",
        }
    }

    /// 値を文字列として取得（書式適用前）
    pub fn as_raw_string(&self) -> String {
        match self {
            CellValue::Number(n) | CellValue::DateTime(n) => n.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }
}

/// セルの値と書式の組
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawCell<'a> {
    pub value: CellValue,
    pub format_string: Option<&'a str>,
}

impl RawCell<'_> {
    /// テキストセルかどうか
    pub fn is_textual(&self) -> bool {
        matches!(self.value, CellValue::String(_))
    }

    /// 日付書式の数値セルかどうか
    ///
    /// 書式文字列に`/`・`y`・`m`・`d`のいずれかを含む場合に日付とみなします。
    pub fn is_date_formatted(&self) -> bool {
        match self.value {
            CellValue::DateTime(_) => true,
            CellValue::Number(_) => self.format_string.is_some_and(is_date_format),
            _ => false,
        }
    }

    /// Base64書式タグ付きかどうか
    pub fn is_base64_formatted(&self) -> bool {
        self.format_string == Some(BASE64_CELL_FORMAT)
    }
}

/// 色指定（`[Red]`）やリテラル（`"..."`）を除いた部分で判定する
pub(crate) fn is_date_format(format: &str) -> bool {
    let mut in_bracket = false;
    let mut in_quote = false;
    for c in format.chars() {
        match c {
            '"' if !in_bracket => in_quote = !in_quote,
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            '/' | 'y' | 'm' | 'd' if !in_bracket && !in_quote => return true,
            _ => {}
        }
    }
    false
}

/// OOXMLの`_xHHHH_`エスケープ（制御文字・`_x005F_`）を復元する
///
/// 文字として不正なコードポイントはそのまま残します。
pub(crate) fn decode_ooxml_escapes(value: &str) -> Cow<'_, str> {
    if !value.contains("_x") {
        return Cow::Borrowed(value);
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find("_x") {
        decoded.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let escaped = candidate
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .filter(|_| candidate.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match escaped {
            Some(c) => {
                decoded.push(c);
                rest = &candidate[7..];
            }
            None => {
                decoded.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    decoded.push_str(rest);
    Cow::Owned(decoded)
}

/// 1シート分のセルグリッド
///
/// 座標はすべてシート上の絶対位置（0始まり）です。
#[derive(Debug, Clone)]
pub(crate) struct SheetGrid {
    pub name: String,
    range: Range<Data>,
    /// (row, col) -> Number Format String
    formats: HashMap<(u32, u32), String>,
    /// ワークシートXMLに`<row>`要素が存在する行（XLSX以外は`None`）
    present_rows: Option<HashSet<u32>>,
    pub is_1904: bool,
}

impl SheetGrid {
    pub fn new(
        name: impl Into<String>,
        range: Range<Data>,
        formats: HashMap<(u32, u32), String>,
        present_rows: Option<HashSet<u32>>,
        is_1904: bool,
    ) -> Self {
        Self {
            name: name.into(),
            range,
            formats,
            present_rows,
            is_1904,
        }
    }

    /// セルを取得する（空セルや範囲外は`None`）
    pub fn cell(&self, row: u32, col: u32) -> Option<RawCell<'_>> {
        let value = match self.range.get_value((row, col))? {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::String(s) => CellValue::String(decode_ooxml_escapes(s).into_owned()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Error(e) => CellValue::Error(format!("{:?}", e)),
            Data::Empty => return None,
        };
        Some(RawCell {
            value,
            format_string: self.formats.get(&(row, col)).map(String::as_str),
        })
    }

    /// 最終行のインデックス（空シートは`None`）
    pub fn last_row(&self) -> Option<u32> {
        self.range.end().map(|(row, _)| row)
    }

    /// 行が「null行」（テーブルの終端）かどうか
    ///
    /// 行の存在情報があれば、`<row>`要素のない行だけをnull行とみなします。
    /// ない場合（XLSなど）は、使用範囲外または列スパン内のセルがすべて空の行です。
    pub fn is_null_row(&self, row: u32, column_span: u32) -> bool {
        if let Some(rows) = &self.present_rows {
            return !rows.contains(&row);
        }
        match self.last_row() {
            Some(last) if row <= last => (0..column_span).all(|col| self.cell(row, col).is_none()),
            _ => true,
        }
    }
}
