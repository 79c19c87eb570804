//! Parser Module
//!
//! calamineを使用したワークブック読み込み。
//! セル値はcalamineから、セル書式はXlsxMetadataParserから取得し、
//! シート単位の`SheetGrid`にまとめます。

use calamine::{open_workbook_auto_from_rs, Reader, Sheets};
use std::io::{Cursor, Read};

use crate::error::XlsDataError;
use crate::parser::XlsxMetadataParser;
use crate::security::SecurityConfig;
use crate::types::SheetGrid;

/// ワークブックパーサー
pub(crate) struct WorkbookParser {
    /// calamineのワークブック（形式は自動判定）
    workbook: Sheets<Cursor<Vec<u8>>>,
    /// XMLメタデータ（XLSXの場合のみ）
    metadata: Option<XlsxMetadataParser>,
}

impl WorkbookParser {
    /// ワークブックを開き、XLSXであればXMLメタデータも解析する
    ///
    /// XLSX以外（XLSなど）は値のみ読み込み、セル書式は利用できません。
    pub fn open<R: Read>(mut reader: R) -> Result<Self, XlsDataError> {
        let security_config = SecurityConfig::default();

        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        security_config.check_input_size(bytes_read)?;

        let workbook = open_workbook_auto_from_rs(Cursor::new(buffer.clone()))?;

        let metadata = if matches!(workbook, Sheets::Xlsx(_)) {
            Some(XlsxMetadataParser::new(Cursor::new(buffer))?)
        } else {
            None
        };

        Ok(Self { workbook, metadata })
    }

    /// すべてのシート名（物理順）
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    /// シートを読み込み、セルと書式のグリッドを返す
    pub fn load_sheet(&mut self, sheet_name: &str) -> Result<SheetGrid, XlsDataError> {
        let range = self.workbook.worksheet_range(sheet_name)?;

        let (formats, present_rows, is_1904) = match &self.metadata {
            Some(metadata) => (
                metadata.cell_formats(sheet_name),
                metadata.present_rows(sheet_name),
                metadata.is_1904(),
            ),
            None => (Default::default(), None, false),
        };

        Ok(SheetGrid::new(sheet_name, range, formats, present_rows, is_1904))
    }
}

// 実際のXLSXファイルが必要なため、テストは統合テスト（tests/）で実装します。
