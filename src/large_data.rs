//! Large Data Module
//!
//! セル長を超える文字列を別シート（`df$LARGE_DATA`）へ退避するチャンクプロトコル。
//!
//! - 通常セルには `df:refLargeData(<key>)` という前方参照だけが残る
//! - ラージデータシートの列は `<table>.<column>`、各セルは
//!   `<key>(df:delimiter){<chunk>}` で、同じキーのチャンクは行順に連結される

use std::collections::HashMap;

use md5::{Digest, Md5};

use crate::constants::{
    LARGE_DATA_DELIMITER, LARGE_DATA_QUOTE_BEGIN, LARGE_DATA_QUOTE_END, LARGE_DATA_REF_PREFIX,
    LARGE_DATA_REF_SUFFIX,
};
use crate::error::XlsDataError;
use crate::types::SheetGrid;

/// 列タイトル（`<table>.<column>`）を組み立てる
pub(crate) fn column_title(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}

/// 前方参照文字列を組み立てる
pub(crate) fn format_reference(key: &str) -> String {
    format!("{}{}{}", LARGE_DATA_REF_PREFIX, key, LARGE_DATA_REF_SUFFIX)
}

/// 文字列全体が前方参照で囲まれていればキーを取り出す
///
/// 途中にマーカーを含むだけの文字列はリテラルとして`None`になります。
pub(crate) fn extract_reference_key(value: &str) -> Option<&str> {
    value
        .strip_prefix(LARGE_DATA_REF_PREFIX)?
        .strip_suffix(LARGE_DATA_REF_SUFFIX)
}

/// 管理セルの文字列を組み立てる
pub(crate) fn format_managed_cell(key: &str, chunk: &str) -> String {
    format!(
        "{}{}{}{}{}",
        key, LARGE_DATA_DELIMITER, LARGE_DATA_QUOTE_BEGIN, chunk, LARGE_DATA_QUOTE_END
    )
}

/// 管理セルを`(key, value)`へ分解する（区切りがなければ`None`）
pub(crate) fn parse_managed_cell(raw: &str) -> Option<(&str, &str)> {
    let (key, quoted) = raw.split_once(LARGE_DATA_DELIMITER)?;
    let value = quoted.strip_prefix(LARGE_DATA_QUOTE_BEGIN).unwrap_or(quoted);
    let value = value.strip_suffix(LARGE_DATA_QUOTE_END).unwrap_or(value);
    Some((key, value))
}

/// データキーを生成する
///
/// `"<table>.<column>:<row_number>"` のMD5を16進文字列にしたもの。
/// 同じデータセットからは常に同じキーが生成されます。
pub(crate) fn generate_data_key(table: &str, column: &str, row_number: usize) -> String {
    let source = format!("{}:{}", column_title(table, column), row_number);
    hex::encode(Md5::digest(source.as_bytes()))
}

/// 文字列を`limit`文字以下のチャンクへ分割する
pub(crate) fn split_chunks(value: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(limit.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// 読み込み側のラージデータマップ
///
/// 列タイトル -> データキー -> 連結済みの値
#[derive(Debug, Default)]
pub(crate) struct LargeDataMap {
    columns: HashMap<String, HashMap<String, String>>,
}

impl LargeDataMap {
    /// ラージデータシートからマップを構築する
    pub fn from_sheet(grid: &SheetGrid) -> Result<Self, XlsDataError> {
        let mut titles = Vec::new();
        let mut col = 0u32;
        while let Some(cell) = grid.cell(0, col) {
            let title = cell.value.as_raw_string();
            if title.trim().is_empty() {
                break;
            }
            if !title.contains('.') {
                return Err(XlsDataError::LargeDataInvalidColumnTitle {
                    sheet: grid.name.clone(),
                    column_title: title,
                });
            }
            titles.push(title);
            col += 1;
        }

        let mut map = Self::default();
        let last_row = grid.last_row().unwrap_or(0);
        for row in 1..=last_row {
            for (col, title) in titles.iter().enumerate() {
                let Some(cell) = grid.cell(row, col as u32) else {
                    continue;
                };
                let raw = cell.value.as_raw_string();
                let (key, value) =
                    parse_managed_cell(&raw).ok_or_else(|| XlsDataError::LargeDataInvalidManagedData {
                        sheet: grid.name.clone(),
                        column_title: title.clone(),
                        row_number: row as usize + 1,
                        value: raw.clone(),
                    })?;
                map.append(title, key, value);
            }
        }

        log::debug!(
            "Built large data map from '{}': {} column(s)",
            grid.name,
            map.columns.len()
        );
        Ok(map)
    }

    fn append(&mut self, column_title: &str, key: &str, value: &str) {
        self.columns
            .entry(column_title.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push_str(value);
    }

    /// 参照を解決する
    pub fn resolve(&self, table: &str, column: &str, key: &str) -> Option<&str> {
        self.columns
            .get(&column_title(table, column))?
            .get(key)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// 書き込み側の1列分のバッファ
#[derive(Debug)]
pub(crate) struct LargeDataColumn {
    pub title: String,
    /// データキー -> チャンク（挿入順）
    pub entries: Vec<(String, Vec<String>)>,
}

impl LargeDataColumn {
    /// この列のチャンク総数（＝必要な行数）
    pub fn chunk_count(&self) -> usize {
        self.entries.iter().map(|(_, chunks)| chunks.len()).sum()
    }

    /// `(key, chunk)`を出力順に列挙する
    pub fn managed_cells(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().flat_map(|(key, chunks)| {
            chunks.iter().map(move |chunk| format_managed_cell(key, chunk))
        })
    }
}

/// 書き込み側のラージデータマップ（列・キーとも挿入順を保持）
#[derive(Debug, Default)]
pub(crate) struct LargeDataBuffer {
    columns: Vec<LargeDataColumn>,
    index: HashMap<String, usize>,
}

impl LargeDataBuffer {
    /// 値をチャンクへ分割して退避し、セルに書く前方参照を返す
    pub fn externalize(
        &mut self,
        table: &str,
        column: &str,
        row_number: usize,
        value: &str,
        chunk_limit: usize,
    ) -> String {
        let title = column_title(table, column);
        let key = generate_data_key(table, column, row_number);
        let chunks = split_chunks(value, chunk_limit);
        log::debug!(
            "Externalized large data: {} row={} chunks={}",
            title,
            row_number,
            chunks.len()
        );

        let position = match self.index.get(&title) {
            Some(&position) => position,
            None => {
                self.columns.push(LargeDataColumn {
                    title: title.clone(),
                    entries: Vec::new(),
                });
                self.index.insert(title, self.columns.len() - 1);
                self.columns.len() - 1
            }
        };
        self.columns[position].entries.push((key.clone(), chunks));

        format_reference(&key)
    }

    pub fn columns(&self) -> &[LargeDataColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// ボディ行数（列ごとのチャンク総数の最大値）
    pub fn body_row_count(&self) -> usize {
        self.columns
            .iter()
            .map(LargeDataColumn::chunk_count)
            .max()
            .unwrap_or(0)
    }
}
