//! Security Module
//!
//! 入力ワークブックに対する制限。
//! ZIP bomb、パストラバーサル、過大な入力ファイルへの対策を提供します。

use crate::error::XlsDataError;

/// セキュリティ設定
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    pub max_file_count: usize,
    /// 単一エントリの最大サイズ（バイト）
    /// デフォルト: 100MB
    pub max_file_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824,
            max_file_count: 10_000,
            max_file_size: 104_857_600,
            max_input_file_size: 2_147_483_648,
        }
    }
}

impl SecurityConfig {
    /// 入力サイズの上限チェック
    pub fn check_input_size(&self, bytes_read: usize) -> Result<(), XlsDataError> {
        if bytes_read as u64 > self.max_input_file_size {
            return Err(XlsDataError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// ZIPエントリ数の上限チェック
    pub fn check_entry_count(&self, count: usize) -> Result<(), XlsDataError> {
        if count > self.max_file_count {
            return Err(XlsDataError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    /// 単一エントリのサイズと展開後サイズ累計のチェック
    ///
    /// 累計を加算した値を返します。
    pub fn check_entry_size(
        &self,
        name: &str,
        size: u64,
        total_so_far: u64,
    ) -> Result<u64, XlsDataError> {
        if size > self.max_file_size {
            return Err(XlsDataError::SecurityViolation(format!(
                "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name, size, self.max_file_size
            )));
        }
        let total = total_so_far.checked_add(size).ok_or_else(|| {
            XlsDataError::SecurityViolation(
                "Total decompressed size calculation overflow".to_string(),
            )
        })?;
        if total > self.max_decompressed_size {
            return Err(XlsDataError::SecurityViolation(format!(
                "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                total, self.max_decompressed_size
            )));
        }
        Ok(total)
    }
}

/// ZIP内パスの検証
///
/// `..`、絶対パス、バックスラッシュを含むパスを拒否します。
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
