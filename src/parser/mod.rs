//! Parser Module
//!
//! calamineとXMLメタデータを組み合わせたワークブック解析。

mod metadata;
mod workbook;

pub(crate) use metadata::XlsxMetadataParser;
pub(crate) use workbook::WorkbookParser;
