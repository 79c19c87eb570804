//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! 致命的なエラーは、テストデータを準備する開発者がそのまま読めるように
//! 「通知・アドバイス・コンテキスト」の複数行ブロックとして表示されます。

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::{ColumnType, DataSetError};

/// xlsdataクレート全体で使用するエラー型
///
/// 読み込み・書き込みのどの段階で発生したエラーも、この型で返されます。
/// 部分的な結果を返すモードはなく、いずれのエラーも処理全体を中断します。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsdata::{XlsDataError, XlsReaderBuilder};
///
/// fn load(path: &str) -> Result<(), XlsDataError> {
///     let reader = XlsReaderBuilder::new().build()?;
///     let dataset = reader.read_file(path)?;
///     println!("{} tables", dataset.table_size());
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsDataError {
    /// I/O操作中に発生したエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ファイルのオープン・作成・書き込みに失敗したエラー（パス付き）
    #[error("Failed to access the workbook file '{}': {source}", path.display())]
    FileAccess {
        /// 対象ファイルのパス
        path: PathBuf,
        /// 元のI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// calamineがワークブックを解析する際に発生したエラー
    #[error("Failed to parse Excel file: {0}")]
    Parse(#[from] calamine::Error),

    /// rust_xlsxwriterがワークブックを生成する際に発生したエラー
    #[error("Failed to write Excel file: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// 数値属性の解析エラー（XMLメタデータ）
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLメタデータの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// JSON出力時のエラー
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// データセットの操作に失敗したエラー（列の重複など）
    #[error("Data set error: {0}")]
    DataSet(#[from] DataSetError),

    /// `$`で始まるシート名に対応するテーブル名がマッピングに存在しない
    #[error(
        "Not found the mapping table for the alias sheet.\n\
         \n[Advice]\n\
         A sheet name that starts with '$' is an alias.\n\
         Add the real table name to the table name map\n\
         (the key is the sheet name with or without '$').\n\
         \n[Sheet]\n{sheet}\n\
         \n[Table Name Map]\n{table_name_map}"
    )]
    MappingTableNotFound {
        /// エイリアスシート名
        sheet: String,
        /// 指定されたマッピングの内容
        table_name_map: String,
    },

    /// シートの1行目が列定義になっていない
    #[error(
        "The first row of the sheet should be column definition.\n\
         \n[Advice]\n\
         Write column names into the first row from the first cell.\n\
         \n[File]\n{file}\n\
         \n[Sheet]\n{sheet}"
    )]
    FirstRowNotColumnDefinition {
        /// 読み込み対象
        file: String,
        /// シート名
        sheet: String,
    },

    /// 列定義行に同じ列名が複数ある
    #[error(
        "The column definition of the sheet has a duplicate column name.\n\
         \n[Advice]\n\
         Each column name in the first row should be unique.\n\
         \n[File]\n{file}\n\
         \n[Sheet]\n{sheet}\n\
         \n[Column]\n{column}"
    )]
    DuplicateColumnDefinition {
        /// 読み込み対象
        file: String,
        /// シート名
        sheet: String,
        /// 重複した列名
        column: String,
    },

    /// ラージデータシートの列タイトルが`table.column`形式でない
    #[error(
        "The column title of the large data sheet should be 'table.column'.\n\
         \n[Advice]\n\
         Make sure the header row of the large data sheet is not edited by hand.\n\
         \n[Sheet]\n{sheet}\n\
         \n[Column Title]\n{column_title}"
    )]
    LargeDataInvalidColumnTitle {
        /// シート名
        sheet: String,
        /// 不正な列タイトル
        column_title: String,
    },

    /// ラージデータシートの管理セルに区切りトークンがない
    #[error(
        "The managed data of the large data sheet has no delimiter.\n\
         \n[Advice]\n\
         Each cell should be 'key(df:delimiter){{value}}'.\n\
         \n[Sheet]\n{sheet}\n\
         \n[Column Title]\n{column_title}\n\
         \n[Row Number]\n{row_number}\n\
         \n[Managed Data]\n{value}"
    )]
    LargeDataInvalidManagedData {
        /// シート名
        sheet: String,
        /// 列タイトル
        column_title: String,
        /// 行番号（1始まり）
        row_number: usize,
        /// セルの生文字列
        value: String,
    },

    /// 前方参照のキーがラージデータマップに存在しない
    #[error(
        "Not found the reference data of large data for the column.\n\
         \n[Advice]\n\
         The large data sheet should have the key of the reference.\n\
         Check the sheet '{sheet}' in the same workbook.\n\
         \n[Table]\n{table}\n\
         \n[Column]\n{column}\n\
         \n[Row Number]\n{row_number}\n\
         \n[Cell Value]\n{value}\n\
         \n[Data Key]\n{key}",
        sheet = crate::constants::LARGE_DATA_SHEET_NAME
    )]
    LargeDataReferenceNotFound {
        /// テーブル名
        table: String,
        /// 列名
        column: String,
        /// 行番号（1始まり）
        row_number: usize,
        /// セルの生文字列
        value: String,
        /// 参照キー
        key: String,
    },

    /// セル値をデータセットへ格納できなかった（回復不能な型不一致など）
    #[error(
        "Failed to handle the cell value of the sheet.\n\
         \n[Advice]\n\
         Check the cell value and the type of the column.\n\
         The type of a column is decided by the first data row.\n\
         \n[File]\n{file}\n\
         \n[Table]\n{table}\n\
         \n[Column]\n{column}\n\
         \n[Mapping Type]\n{mapping_type}\n\
         \n[Cell Type]\n{cell_kind}\n\
         \n[Value]\n{value}\n\
         \n[Row Number]\n{row_number}\n\
         \n[Cause]\n{source}"
    )]
    CellValueHandling {
        /// 読み込み対象
        file: String,
        /// テーブル名
        table: String,
        /// 列名
        column: String,
        /// 列の宣言型
        mapping_type: ColumnType,
        /// 物理セルの種類
        cell_kind: &'static str,
        /// 問題の値
        value: String,
        /// 行番号（1始まり）
        row_number: usize,
        /// 原因
        #[source]
        source: DataSetError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: XlsDataError = io_err.into();

        match error {
            XlsDataError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_file_access_error_display() {
        let error = XlsDataError::FileAccess {
            path: PathBuf::from("/tmp/fixture.xlsx"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
        };

        let msg = error.to_string();
        assert!(msg.contains("/tmp/fixture.xlsx"));
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn test_parse_error_display() {
        let error: XlsDataError = calamine::Error::Msg("Corrupted file").into();
        let msg = error.to_string();
        assert!(msg.starts_with("Failed to parse Excel file"));
        assert!(msg.contains("Corrupted file"));
    }

    #[test]
    fn test_mapping_table_not_found_display() {
        let error = XlsDataError::MappingTableNotFound {
            sheet: "$MBR".to_string(),
            table_name_map: "{}".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("[Advice]"));
        assert!(msg.contains("[Sheet]\n$MBR"));
    }

    #[test]
    fn test_duplicate_column_definition_display() {
        let error = XlsDataError::DuplicateColumnDefinition {
            file: "fixture.xlsx".to_string(),
            sheet: "MEMBER".to_string(),
            column: "ID".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.starts_with("The column definition of the sheet has a duplicate"));
        assert!(msg.contains("[Sheet]\nMEMBER"));
        assert!(msg.contains("[Column]\nID"));
    }

    #[test]
    fn test_reference_not_found_display() {
        let error = XlsDataError::LargeDataReferenceNotFound {
            table: "MEMBER".to_string(),
            column: "NOTE".to_string(),
            row_number: 3,
            value: "df:refLargeData(missingkey)".to_string(),
            key: "missingkey".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("[Data Key]\nmissingkey"));
        assert!(msg.contains("df$LARGE_DATA"));
        assert!(msg.contains("[Row Number]\n3"));
    }

    #[test]
    fn test_invalid_managed_data_display_keeps_braces() {
        let error = XlsDataError::LargeDataInvalidManagedData {
            sheet: "df$LARGE_DATA".to_string(),
            column_title: "MEMBER.NOTE".to_string(),
            row_number: 2,
            value: "broken".to_string(),
        };
        assert!(error.to_string().contains("key(df:delimiter){value}"));
    }

    #[test]
    fn test_cell_value_handling_display() {
        let error = XlsDataError::CellValueHandling {
            file: "(stream)".to_string(),
            table: "MEMBER".to_string(),
            column: "AGE".to_string(),
            mapping_type: ColumnType::Decimal,
            cell_kind: "Boolean",
            value: "true".to_string(),
            row_number: 4,
            source: DataSetError::TypeMismatch {
                from: "Boolean",
                to: ColumnType::Decimal,
            },
        };
        let msg = error.to_string();
        assert!(msg.contains("[Mapping Type]\nDECIMAL"));
        assert!(msg.contains("[Cell Type]\nBoolean"));
        assert!(msg.contains("[Row Number]\n4"));
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), XlsDataError> {
            let _file = std::fs::File::open("nonexistent_file.xlsx")?;
            Ok(())
        }

        assert!(matches!(io_operation(), Err(XlsDataError::Io(_))));
    }
}
