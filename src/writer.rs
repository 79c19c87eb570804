//! Writer Module
//!
//! `DataSet`をワークブックへ書き出すライター。
//!
//! セル長を超える文字列は、設定に応じて切り詰めるか、
//! ラージデータシート（`df$LARGE_DATA`）へ退避して前方参照に置き換えます。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::{ColNum, Format, RowNum, Workbook, Worksheet};

use crate::constants::{
    BASE64_CELL_FORMAT, DATA_KEY_LENGTH, DATE_CELL_FORMAT, DATE_TEXT_FORMAT,
    DEFAULT_CELL_LENGTH_LIMIT, LARGE_DATA_DELIMITER, LARGE_DATA_QUOTE_BEGIN, LARGE_DATA_QUOTE_END,
    LARGE_DATA_SHEET_NAME, QUOTED_EMPTY_STRING, TRUNCATION_MARKER, XLSX_CELL_HARD_LIMIT,
};
use crate::dataset::{DataSet, DataTable, DataValue};
use crate::datetime::datetime_to_serial;
use crate::error::XlsDataError;
use crate::large_data::LargeDataBuffer;

/// 書き込み設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct WriterConfig {
    /// すべてのセルをテキストとして書き出すか
    pub string_cell_type: bool,

    /// セル長超過値をラージデータシートへ退避するか（falseなら切り詰め）
    pub large_data_handling: bool,

    /// 空文字列を`""`として書き出すか
    pub quote_empty_string: bool,

    /// 1セルあたりの最大文字数
    pub cell_length_limit: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            string_cell_type: false,
            large_data_handling: false,
            quote_empty_string: false,
            cell_length_limit: DEFAULT_CELL_LENGTH_LIMIT,
        }
    }
}

/// `XlsWriter`を構築するビルダー
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsdata::{DataSet, XlsWriterBuilder};
///
/// # fn main() -> Result<(), xlsdata::XlsDataError> {
/// let dataset = DataSet::new();
/// let writer = XlsWriterBuilder::new()
///     .large_data_handling(true)
///     .quote_empty_string(true)
///     .build()?;
/// writer.write_file(&dataset, "output.xlsx")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct XlsWriterBuilder {
    config: WriterConfig,
}

impl XlsWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// すべてのセルをテキストセルとして書き出す
    ///
    /// 日時は`yyyy/MM/dd HH:mm:ss.SSS`、論理値は`true`/`false`の文字列になります。
    pub fn string_cell_type(mut self, enabled: bool) -> Self {
        self.config.string_cell_type = enabled;
        self
    }

    /// セル長超過値のラージデータシートへの退避を有効にする
    pub fn large_data_handling(mut self, enabled: bool) -> Self {
        self.config.large_data_handling = enabled;
        self
    }

    /// 空文字列を`""`として書き出す
    pub fn quote_empty_string(mut self, enabled: bool) -> Self {
        self.config.quote_empty_string = enabled;
        self
    }

    /// 1セルあたりの最大文字数を指定する
    pub fn cell_length_limit(mut self, limit: usize) -> Self {
        self.config.cell_length_limit = limit;
        self
    }

    /// 設定を検証し、`XlsWriter`を生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsDataError::Config` - セル長上限が切り詰めマーカー以下、
    ///   または管理セル（キー・区切り・チャンク）がXLSXの上限に収まらない場合
    pub fn build(self) -> Result<XlsWriter, XlsDataError> {
        let limit = self.config.cell_length_limit;
        let marker_length = TRUNCATION_MARKER.chars().count();
        if limit <= marker_length {
            return Err(XlsDataError::Config(format!(
                "Cell length limit ({}) must be greater than the truncation marker length ({})",
                limit, marker_length
            )));
        }

        let managed_overhead = DATA_KEY_LENGTH
            + LARGE_DATA_DELIMITER.len()
            + LARGE_DATA_QUOTE_BEGIN.len()
            + LARGE_DATA_QUOTE_END.len();
        if limit + managed_overhead > XLSX_CELL_HARD_LIMIT {
            return Err(XlsDataError::Config(format!(
                "Cell length limit ({}) is too large: a large data cell needs {} extra characters within {}",
                limit, managed_overhead, XLSX_CELL_HARD_LIMIT
            )));
        }

        Ok(XlsWriter {
            config: self.config,
        })
    }
}

/// `DataSet`をワークブックへ書き出すライター
#[derive(Debug)]
pub struct XlsWriter {
    config: WriterConfig,
}

/// 1回の書き込みで共有するセル書式
struct CellFormats {
    date: Format,
    base64: Format,
    /// 全列nullの行を実在させるための空セル書式
    blank: Format,
}

impl XlsWriter {
    /// データセットを書き出し、出力ストリームをフラッシュする
    pub fn write<W: Write>(&self, dataset: &DataSet, mut output: W) -> Result<(), XlsDataError> {
        let buffer = self.write_to_buffer(dataset)?;
        output.write_all(&buffer)?;
        output.flush()?;
        Ok(())
    }

    /// データセットをファイルへ書き出す
    pub fn write_file(&self, dataset: &DataSet, path: impl AsRef<Path>) -> Result<(), XlsDataError> {
        let path = path.as_ref();
        let buffer = self.write_to_buffer(dataset)?;
        let file_access = |source| XlsDataError::FileAccess {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(file_access)?);
        writer.write_all(&buffer).map_err(file_access)?;
        writer.flush().map_err(file_access)?;
        Ok(())
    }

    /// データセットをXLSXのバイト列として書き出す
    pub fn write_to_buffer(&self, dataset: &DataSet) -> Result<Vec<u8>, XlsDataError> {
        let mut workbook = Workbook::new();
        let formats = CellFormats {
            date: Format::new().set_num_format(DATE_CELL_FORMAT),
            base64: Format::new().set_num_format(BASE64_CELL_FORMAT),
            blank: Format::new().set_num_format("@"),
        };
        let mut large_data = LargeDataBuffer::default();

        for table in dataset.tables() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(table.table_db_name())?;
            self.write_table(worksheet, table, &formats, &mut large_data)?;
        }

        if self.config.large_data_handling && !large_data.is_empty() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(LARGE_DATA_SHEET_NAME)?;
            write_large_data_sheet(worksheet, &large_data)?;
        }

        Ok(workbook.save_to_buffer()?)
    }

    fn write_table(
        &self,
        worksheet: &mut Worksheet,
        table: &DataTable,
        formats: &CellFormats,
        large_data: &mut LargeDataBuffer,
    ) -> Result<(), XlsDataError> {
        for (col, column) in table.columns().iter().enumerate() {
            worksheet.write_string(0, col_num(col)?, column.name())?;
        }

        for (row_index, row) in table.rows().iter().enumerate() {
            let excel_row = row_num(row_index + 1)?;
            if row.values().iter().all(DataValue::is_null) {
                // セルのない行はテーブルの終端と区別できない
                worksheet.write_blank(excel_row, 0, &formats.blank)?;
                continue;
            }
            for (col, value) in row.values().iter().enumerate() {
                let excel_col = col_num(col)?;
                match value {
                    DataValue::Null => {}
                    DataValue::Integer(_) | DataValue::Decimal(_) => {
                        worksheet.write_string(excel_row, excel_col, value.to_string())?;
                    }
                    DataValue::Timestamp(t) => {
                        if self.config.string_cell_type {
                            worksheet.write_string(
                                excel_row,
                                excel_col,
                                t.format(DATE_TEXT_FORMAT).to_string(),
                            )?;
                        } else {
                            worksheet.write_number_with_format(
                                excel_row,
                                excel_col,
                                datetime_to_serial(t),
                                &formats.date,
                            )?;
                        }
                    }
                    DataValue::Binary(_) => {
                        worksheet.write_string_with_format(
                            excel_row,
                            excel_col,
                            value.to_string(),
                            &formats.base64,
                        )?;
                    }
                    DataValue::Boolean(b) => {
                        if self.config.string_cell_type {
                            worksheet.write_string(excel_row, excel_col, b.to_string())?;
                        } else {
                            worksheet.write_boolean(excel_row, excel_col, *b)?;
                        }
                    }
                    DataValue::String(s) => {
                        let column_name = table.columns()[col].name();
                        let text = self.handle_string(
                            table.table_db_name(),
                            column_name,
                            row_index + 1,
                            s,
                            large_data,
                        );
                        worksheet.write_string(excel_row, excel_col, text)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// セル長超過と空文字列を処理し、セルへ書く文字列を返す
    fn handle_string(
        &self,
        table: &str,
        column: &str,
        row_number: usize,
        value: &str,
        large_data: &mut LargeDataBuffer,
    ) -> String {
        let limit = self.config.cell_length_limit;
        let content_limit = limit - TRUNCATION_MARKER.chars().count();

        let text = if value.chars().count() > content_limit {
            if self.config.large_data_handling {
                large_data.externalize(table, column, row_number, value, limit)
            } else {
                let mut truncated: String = value.chars().take(content_limit).collect();
                truncated.push_str(TRUNCATION_MARKER);
                truncated
            }
        } else {
            value.to_string()
        };

        if self.config.quote_empty_string && text.is_empty() {
            QUOTED_EMPTY_STRING.to_string()
        } else {
            text
        }
    }
}

fn write_large_data_sheet(
    worksheet: &mut Worksheet,
    large_data: &LargeDataBuffer,
) -> Result<(), XlsDataError> {
    for (col, column) in large_data.columns().iter().enumerate() {
        let excel_col = col_num(col)?;
        worksheet.write_string(0, excel_col, &column.title)?;
        for (index, cell) in column.managed_cells().enumerate() {
            worksheet.write_string(row_num(index + 1)?, excel_col, cell)?;
        }
    }
    log::debug!(
        "Wrote {} with {} column(s) and {} row(s)",
        LARGE_DATA_SHEET_NAME,
        large_data.columns().len(),
        large_data.body_row_count()
    );
    Ok(())
}

fn row_num(index: usize) -> Result<RowNum, XlsDataError> {
    RowNum::try_from(index)
        .map_err(|_| XlsDataError::Config(format!("Row index {} exceeds the sheet limit", index)))
}

fn col_num(index: usize) -> Result<ColNum, XlsDataError> {
    ColNum::try_from(index).map_err(|_| {
        XlsDataError::Config(format!("Column index {} exceeds the sheet limit", index))
    })
}
