//! Date Serial Module
//!
//! Excelのシリアル日付値と`NaiveDateTime`の相互変換。
//!
//! # エポックシステム
//!
//! - 1900年システム（デフォルト）: 1899年12月30日起算。
//!   1900年3月1日以降の日付はこの起算日でExcelの表示と一致します。
//! - 1904年システム: 1904年1月1日起算（Mac版Excel）。
//!
//! 書き込みは常に1900年システムで行います。

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn epoch(is_1904: bool) -> Option<NaiveDateTime> {
    let date = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// シリアル値を日時へ変換する（ミリ秒に丸める）
///
/// 範囲外の値は`None`になります。
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    epoch(is_1904)?.checked_add_signed(Duration::milliseconds(millis as i64))
}

/// 日時を1900年システムのシリアル値へ変換する
pub(crate) fn datetime_to_serial(value: &NaiveDateTime) -> f64 {
    match epoch(false) {
        Some(base) => (*value - base).num_milliseconds() as f64 / MILLIS_PER_DAY,
        None => 0.0,
    }
}
