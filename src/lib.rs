//! xlsdata - Spreadsheet test-data reader/writer with large-data overflow externalization
//!
//! This crate maps workbooks (XLSX) to a generic in-memory `DataSet` of named,
//! typed tables and back. Strings longer than the per-cell limit can be split
//! into chunks on a reserved `df$LARGE_DATA` sheet and rejoined on read.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xlsdata::XlsReaderBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reader = XlsReaderBuilder::new().build()?;
//!     let dataset = reader.read_file("fixture.xlsx")?;
//!
//!     for table in dataset.tables() {
//!         println!("{}: {} rows", table.table_db_name(), table.row_size());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Writing
//!
//! ```rust,no_run
//! use xlsdata::{ColumnType, DataSet, DataValue, XlsWriterBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dataset = DataSet::new();
//!     let table = dataset.add_table("MEMBER");
//!     table.add_column("MEMBER_ID", ColumnType::Decimal)?;
//!     table.add_column("PROFILE", ColumnType::String)?;
//!     let row = table.add_row();
//!     table.add_value(row, "MEMBER_ID", DataValue::Integer(1))?;
//!     table.add_value(row, "PROFILE", DataValue::String("x".repeat(100_000)))?;
//!
//!     // Values longer than the cell length limit go to df$LARGE_DATA
//!     let writer = XlsWriterBuilder::new().large_data_handling(true).build()?;
//!     writer.write_file(&dataset, "member.xlsx")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Sheet Conventions
//!
//! - `#`で始まるシートはコメントとして読み飛ばされます
//! - `$`で始まるシートはエイリアスで、テーブル名マッピングで実テーブル名を解決します
//! - `df$LARGE_DATA`はラージデータ用の予約シートで、テーブルにはなりません

pub mod constants;
mod dataset;
mod datetime;
mod error;
mod large_data;
mod parser;
mod reader;
mod security;
mod types;
mod writer;

// 公開API
pub use dataset::{ColumnType, DataColumn, DataRow, DataSet, DataSetError, DataTable, DataValue};
pub use error::XlsDataError;
pub use reader::{XlsReader, XlsReaderBuilder};
pub use writer::{XlsWriter, XlsWriterBuilder};
