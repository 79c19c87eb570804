//! Reader Tests
//!
//! rust_xlsxwriterで生成したフィクスチャを読み込み、
//! シートの選別・型推論・ラージデータ解決・エラー診断を検証します。

use rust_xlsxwriter::*;
use std::io::Cursor;
use xlsdata::{ColumnType, DataSet, DataValue, XlsDataError, XlsReaderBuilder};

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    /// MEMBERテーブル（ID, NOTE）で2行目のNOTEが空
    pub fn generate_blank_note() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "ID")?;
        worksheet.write_string(0, 1, "NOTE")?;
        worksheet.write_number(1, 0, 1.0)?;
        worksheet.write_string(1, 1, "x")?;
        worksheet.write_number(2, 0, 2.0)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 数値で始まり、途中にテキストが混ざる列
    pub fn generate_mixed_numeric_column() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "NAME")?;
        worksheet.write_string(0, 1, "AGE")?;
        worksheet.write_string(1, 0, "Alice")?;
        worksheet.write_number(1, 1, 10.0)?;
        worksheet.write_string(2, 0, "Bob")?;
        worksheet.write_string(2, 1, "unknown")?;
        worksheet.write_string(3, 0, "Chris")?;
        worksheet.write_number(3, 1, 30.5)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 数値列の途中に論理値が混ざる
    pub fn generate_boolean_in_numeric_column() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "AGE")?;
        worksheet.write_number(1, 0, 10.0)?;
        worksheet.write_boolean(2, 0, true)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// コメントシート・スキップ対象・ラージデータシート・通常シート
    pub fn generate_filtered_sheets() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let ignored = workbook.add_worksheet();
        ignored.set_name("#IGNORED")?;
        ignored.write_string(3, 3, "memo without header")?;

        let work = workbook.add_worksheet();
        work.set_name("WORK_TEMP")?;
        work.write_string(2, 0, "no header here")?;

        let member = workbook.add_worksheet();
        member.set_name("MEMBER")?;
        member.write_string(0, 0, "MEMBER_ID")?;
        member.write_number(1, 0, 1.0)?;

        let large_data = workbook.add_worksheet();
        large_data.set_name("df$LARGE_DATA")?;
        large_data.write_string(0, 0, "MEMBER.NOTE")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 参照先のないラージデータ参照
    pub fn generate_unresolved_reference() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "ID")?;
        worksheet.write_string(0, 1, "NOTE")?;
        worksheet.write_number(1, 0, 1.0)?;
        worksheet.write_string(1, 1, "df:refLargeData(missingkey)")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 手書きのラージデータシート（テーブルより後ろに配置）
    pub fn generate_manual_large_data() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let member = workbook.add_worksheet();
        member.set_name("MEMBER")?;
        member.write_string(0, 0, "ID")?;
        member.write_string(0, 1, "NOTE")?;
        member.write_number(1, 0, 1.0)?;
        member.write_string(1, 1, "df:refLargeData(k1)")?;
        member.write_number(2, 0, 2.0)?;
        member.write_string(2, 1, "see df:refLargeData(k1)")?;

        let large_data = workbook.add_worksheet();
        large_data.set_name("df$LARGE_DATA")?;
        large_data.write_string(0, 0, "MEMBER.NOTE")?;
        large_data.write_string(1, 0, "k1(df:delimiter){abc}")?;
        large_data.write_string(2, 0, "k1(df:delimiter){def}")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// ラージデータシートの列タイトルに`.`がない
    pub fn generate_invalid_large_data_title() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();

        let member = workbook.add_worksheet();
        member.set_name("MEMBER")?;
        member.write_string(0, 0, "ID")?;
        member.write_number(1, 0, 1.0)?;

        let large_data = workbook.add_worksheet();
        large_data.set_name("df$LARGE_DATA")?;
        large_data.write_string(0, 0, "NOTE")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// エイリアスシート
    pub fn generate_alias_sheet() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("$MBR")?;

        worksheet.write_string(0, 0, "ID")?;
        worksheet.write_number(1, 0, 1.0)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 1行目が空のシート
    pub fn generate_missing_header() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(1, 0, "data without header")?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 末尾に空白を持つ文字列と日付
    pub fn generate_trim_and_dates() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        let date_format = Format::new().set_num_format("yyyy/mm/dd hh:mm");
        let builtin_date = Format::new().set_num_format_index(14);

        worksheet.write_string(0, 0, "NAME")?;
        worksheet.write_string(0, 1, "CODE")?;
        worksheet.write_string(0, 2, "UPDATED")?;
        worksheet.write_string(0, 3, "BIRTHDATE")?;
        worksheet.write_string(1, 0, "Alice  ")?;
        worksheet.write_string(1, 1, "A01  ")?;
        worksheet.write_number_with_format(1, 2, 45658.5, &date_format)?;
        worksheet.write_number_with_format(1, 3, 32874.0, &builtin_date)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 空行で終わるテーブル（空行の後ろは読まれない）
    pub fn generate_null_row_terminated() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "ID")?;
        worksheet.write_string(0, 1, "NAME")?;
        worksheet.write_number(1, 0, 1.0)?;
        worksheet.write_number(2, 0, 2.0)?;
        // 列スパン外にしかセルがない行も存在する行として読まれる
        worksheet.write_string(3, 5, "outside")?;
        worksheet.write_number(4, 0, 4.0)?;
        // 6行目は存在しないので、7行目は読まれない
        worksheet.write_number(6, 0, 7.0)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// 列定義行に同じ列名が2つある
    pub fn generate_duplicate_header() -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("MEMBER")?;

        worksheet.write_string(0, 0, "ID")?;
        worksheet.write_string(0, 1, "NAME")?;
        worksheet.write_string(0, 2, "ID")?;
        worksheet.write_number(1, 0, 1.0)?;

        Ok(workbook.save_to_buffer()?)
    }
}

fn read(bytes: Vec<u8>) -> Result<DataSet, XlsDataError> {
    XlsReaderBuilder::new().build().unwrap().read(Cursor::new(bytes))
}

#[test]
fn test_empty_string_column_vs_absent() {
    let bytes = fixtures::generate_blank_note().unwrap();

    let dataset = XlsReaderBuilder::new()
        .with_empty_string_columns([("member", vec!["note"])])
        .build()
        .unwrap()
        .read(Cursor::new(bytes.clone()))
        .unwrap();
    let member = dataset.table("MEMBER").unwrap();
    assert_eq!(member.value(1, "NOTE"), Some(&DataValue::String(String::new())));

    let dataset = read(bytes).unwrap();
    let member = dataset.table("MEMBER").unwrap();
    assert_eq!(member.value(1, "NOTE"), Some(&DataValue::Null));
    assert_eq!(member.value(1, "ID"), Some(&DataValue::Integer(2)));
    assert_eq!(
        member.column_by_name("ID").unwrap().column_type(),
        ColumnType::Decimal
    );
}

#[test]
fn test_type_promotion_on_textual_cell() {
    let bytes = fixtures::generate_mixed_numeric_column().unwrap();
    let dataset = read(bytes).unwrap();
    let member = dataset.table("MEMBER").unwrap();

    assert_eq!(member.row_size(), 3);
    assert_eq!(
        member.column_by_name("AGE").unwrap().column_type(),
        ColumnType::String
    );
    assert_eq!(member.value(0, "AGE").and_then(|v| v.as_str()), Some("10"));
    assert_eq!(member.value(1, "AGE").and_then(|v| v.as_str()), Some("unknown"));
    assert_eq!(member.value(2, "AGE").and_then(|v| v.as_str()), Some("30.5"));
}

#[test]
fn test_non_textual_mismatch_is_fatal() {
    let bytes = fixtures::generate_boolean_in_numeric_column().unwrap();
    match read(bytes) {
        Err(XlsDataError::CellValueHandling {
            table,
            column,
            mapping_type,
            cell_kind,
            row_number,
            ..
        }) => {
            assert_eq!(table, "MEMBER");
            assert_eq!(column, "AGE");
            assert_eq!(mapping_type, ColumnType::Decimal);
            assert_eq!(cell_kind, "Boolean");
            assert_eq!(row_number, 3);
        }
        other => panic!("Expected CellValueHandling, got {:?}", other),
    }
}

#[test]
fn test_sheet_filtering() {
    let bytes = fixtures::generate_filtered_sheets().unwrap();
    let dataset = XlsReaderBuilder::new()
        .with_skip_sheet_pattern("WORK_.*")
        .build()
        .unwrap()
        .read(Cursor::new(bytes))
        .unwrap();

    assert_eq!(dataset.table_size(), 1);
    assert_eq!(dataset.table_at(0).unwrap().table_db_name(), "MEMBER");
}

#[test]
fn test_unresolved_reference() {
    let bytes = fixtures::generate_unresolved_reference().unwrap();
    let error = read(bytes).unwrap_err();
    match &error {
        XlsDataError::LargeDataReferenceNotFound { key, table, column, .. } => {
            assert_eq!(key, "missingkey");
            assert_eq!(table, "MEMBER");
            assert_eq!(column, "NOTE");
        }
        other => panic!("Expected LargeDataReferenceNotFound, got {:?}", other),
    }
    assert!(error.to_string().contains("missingkey"));
}

#[test]
fn test_manual_large_data_sheet() {
    let bytes = fixtures::generate_manual_large_data().unwrap();
    let dataset = read(bytes).unwrap();

    assert_eq!(dataset.table_size(), 1);
    let member = dataset.table("MEMBER").unwrap();
    assert_eq!(member.value(0, "NOTE").and_then(|v| v.as_str()), Some("abcdef"));
    // 参照が文字列全体でなければリテラルのまま
    assert_eq!(
        member.value(1, "NOTE").and_then(|v| v.as_str()),
        Some("see df:refLargeData(k1)")
    );
}

#[test]
fn test_invalid_large_data_title() {
    let bytes = fixtures::generate_invalid_large_data_title().unwrap();
    match read(bytes) {
        Err(XlsDataError::LargeDataInvalidColumnTitle { column_title, .. }) => {
            assert_eq!(column_title, "NOTE");
        }
        other => panic!("Expected LargeDataInvalidColumnTitle, got {:?}", other),
    }
}

#[test]
fn test_alias_sheet() {
    let bytes = fixtures::generate_alias_sheet().unwrap();

    let dataset = XlsReaderBuilder::new()
        .with_table_name_map([("MBR", "MEMBER")])
        .build()
        .unwrap()
        .read(Cursor::new(bytes.clone()))
        .unwrap();
    assert_eq!(dataset.table_at(0).unwrap().table_db_name(), "MEMBER");

    match read(bytes) {
        Err(XlsDataError::MappingTableNotFound { sheet, .. }) => assert_eq!(sheet, "$MBR"),
        other => panic!("Expected MappingTableNotFound, got {:?}", other),
    }
}

#[test]
fn test_missing_header_row() {
    let bytes = fixtures::generate_missing_header().unwrap();
    match read(bytes) {
        Err(XlsDataError::FirstRowNotColumnDefinition { sheet, file }) => {
            assert_eq!(sheet, "MEMBER");
            assert_eq!(file, "(stream)");
        }
        other => panic!("Expected FirstRowNotColumnDefinition, got {:?}", other),
    }
}

#[test]
fn test_right_trim_and_dates() {
    let bytes = fixtures::generate_trim_and_dates().unwrap();
    let dataset = XlsReaderBuilder::new()
        .right_trim_cell_value(true)
        .with_not_trim_columns([("MEMBER", vec!["CODE"])])
        .build()
        .unwrap()
        .read(Cursor::new(bytes))
        .unwrap();
    let member = dataset.table("MEMBER").unwrap();

    assert_eq!(member.value(0, "NAME").and_then(|v| v.as_str()), Some("Alice"));
    assert_eq!(member.value(0, "CODE").and_then(|v| v.as_str()), Some("A01  "));

    let updated = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert_eq!(member.value(0, "UPDATED"), Some(&DataValue::Timestamp(updated)));

    let born = chrono::NaiveDate::from_ymd_opt(1990, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(
        member.column_by_name("BIRTHDATE").unwrap().column_type(),
        ColumnType::Timestamp
    );
    assert_eq!(member.value(0, "BIRTHDATE"), Some(&DataValue::Timestamp(born)));
}

#[test]
fn test_null_row_ends_table() {
    let bytes = fixtures::generate_null_row_terminated().unwrap();
    let dataset = read(bytes).unwrap();
    let member = dataset.table("MEMBER").unwrap();

    assert_eq!(member.row_size(), 4);
    assert_eq!(member.value(1, "ID"), Some(&DataValue::Integer(2)));
    assert_eq!(member.value(1, "NAME"), Some(&DataValue::Null));
    assert_eq!(member.value(2, "ID"), Some(&DataValue::Null));
    assert_eq!(member.value(2, "NAME"), Some(&DataValue::Null));
    assert_eq!(member.value(3, "ID"), Some(&DataValue::Integer(4)));
}

#[test]
fn test_duplicate_header_is_reported() {
    let bytes = fixtures::generate_duplicate_header().unwrap();

    match read(bytes) {
        Err(XlsDataError::DuplicateColumnDefinition { sheet, column, .. }) => {
            assert_eq!(sheet, "MEMBER");
            assert_eq!(column, "ID");
        }
        other => panic!("Expected DuplicateColumnDefinition, got {:?}", other),
    }
}

#[test]
fn test_read_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.xlsx");
    let result = XlsReaderBuilder::new().build().unwrap().read_file(&path);

    match result {
        Err(XlsDataError::FileAccess { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected FileAccess, got {:?}", other),
    }
}

#[test]
fn test_invalid_skip_pattern() {
    let result = XlsReaderBuilder::new().with_skip_sheet_pattern("[").build();
    assert!(matches!(result, Err(XlsDataError::Config(_))));
}
