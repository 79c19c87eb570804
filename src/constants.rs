//! Protocol Constants
//!
//! ライターとリーダーの間で完全に一致している必要がある予約定数。
//! いずれかを変更すると、既存のワークブックとのラウンドトリップが壊れます。

/// ラージデータ（セル長超過値の退避先）シート名
pub const LARGE_DATA_SHEET_NAME: &str = "df$LARGE_DATA";

/// 管理セル内でデータキーとチャンク本体を区切るトークン
pub const LARGE_DATA_DELIMITER: &str = "(df:delimiter)";

/// チャンク本体の開始マーカー
pub const LARGE_DATA_QUOTE_BEGIN: &str = "{";

/// チャンク本体の終了マーカー
pub const LARGE_DATA_QUOTE_END: &str = "}";

/// 通常セルに書かれる前方参照のプレフィックス
pub const LARGE_DATA_REF_PREFIX: &str = "df:refLargeData(";

/// 通常セルに書かれる前方参照のサフィックス
pub const LARGE_DATA_REF_SUFFIX: &str = ")";

/// バイナリ（Base64）セルを示すNumber Format String
pub const BASE64_CELL_FORMAT: &str = "[Base64]";

/// 日時セルのNumber Format String
pub const DATE_CELL_FORMAT: &str = "yyyy/mm/dd hh:mm:ss";

/// `string_cell_type`指定時に日時をテキストとして書き出す形式（chrono書式）
pub const DATE_TEXT_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// 切り詰め時に末尾へ付与するマーカー
pub const TRUNCATION_MARKER: &str = "...";

/// 明示的な空文字列を表すトークン
pub const QUOTED_EMPTY_STRING: &str = "\"\"";

/// コメントシートのプレフィックス
pub const COMMENT_SHEET_PREFIX: char = '#';

/// テーブル名エイリアスシートのプレフィックス
pub const ALIAS_SHEET_PREFIX: char = '$';

/// セル長の既定上限（文字数）
pub const DEFAULT_CELL_LENGTH_LIMIT: usize = 30_000;

/// XLSXの1セルあたりのハード上限（文字数）
pub const XLSX_CELL_HARD_LIMIT: usize = 32_767;

/// MD5ダイジェストの16進表現の長さ（データキー長）
pub(crate) const DATA_KEY_LENGTH: usize = 32;
