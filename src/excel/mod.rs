//! 工程カード（Excel）の解析モジュール

pub mod product;

pub use product::{read_product_info, ProductInfo};

use crate::output::write_json_pretty;
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 工程一覧の見出し
pub const HEADER_LABEL: &str = "工序";

/// 見出しを探す行数
pub const HEADER_SEARCH_ROWS: usize = 10;

/// 工程一覧の終わりを示す説明文
pub const END_MARKER: &str = "以上全程保护外观无划痕伤";

/// 工程カードで読む列数（工程名・工程コード・説明）
const PROCESS_COLUMNS: usize = 3;

/// Excel 読み込みのエラー
#[derive(Debug, Error)]
pub enum ExcelError {
    #[error("Excelファイルを開けません: {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("ワークシートがありません: {0}")]
    EmptyWorkbook(PathBuf),

    #[error("対応していない形式です: {0}（.xls / .xlsx のみ）")]
    UnsupportedFormat(String),

    #[error("シート {0} に工序の見出し行が見つかりません")]
    HeaderNotFound(String),

    #[error("JSONの処理に失敗: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 1つの工程
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub process_name: String,
    pub process_code: String,
    pub process_desc: String,
}

/// 工程カードの内容
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCard {
    pub file_name: String,
    pub processes: Vec<ProcessStep>,
}

/// 拡張子を確認して最初のシートを開く（シート名と範囲）
pub(crate) fn open_first_sheet(path: &Path) -> Result<(String, Range<Data>), ExcelError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if ext != "xls" && ext != "xlsx" {
        return Err(ExcelError::UnsupportedFormat(format!(".{}", ext)));
    }

    let mut workbook = open_workbook_auto(path).map_err(|e| ExcelError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(ExcelError::EmptyWorkbook(path.to_path_buf()));
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExcelError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    debug!("シート {} を読み込み: {:?}", sheet_name, range.end());
    Ok((sheet_name, range))
}

/// セルの値を文字列にする（前後の空白は除く）
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
    }
}

/// 整数値の小数は ".0" を付けない（工程コード 10 など）
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A1 起点の絶対位置で先頭 `columns` 列を行ごとに取り出す
fn leading_columns(range: &Range<Data>, columns: usize) -> Vec<Vec<String>> {
    let Some((last_row, _)) = range.end() else {
        return Vec::new();
    };

    (0..=last_row)
        .map(|row| {
            (0..columns as u32)
                .map(|col| range.get_value((row, col)).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// 工程カードを解析
pub fn parse_process_card(path: impl AsRef<Path>) -> Result<ProcessCard, ExcelError> {
    let path = path.as_ref();
    let (sheet_name, range) = open_first_sheet(path)?;

    let rows = leading_columns(&range, PROCESS_COLUMNS);
    let processes =
        extract_process_steps(&rows).ok_or_else(|| ExcelError::HeaderNotFound(sheet_name.clone()))?;

    info!("シート {} から {} 個の工程を抽出", sheet_name, processes.len());

    Ok(ProcessCard {
        file_name: path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        processes,
    })
}

/// 行データから工程を取り出す（見出しが無ければ None）
///
/// - 説明に終了マーカーを含む行で打ち切る
/// - 工程名が空ならひとつ前の有効な工程名を使う（コードも空なら前のコードも）
/// - 全項目が空の行は飛ばし、その直後のコードが空の行も飛ばす
pub fn extract_process_steps(rows: &[Vec<String>]) -> Option<Vec<ProcessStep>> {
    let header = rows
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|row| row.first().map(String::as_str) == Some(HEADER_LABEL))?;

    fn column(row: &[String], idx: usize) -> String {
        row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
    }

    let mut steps = Vec::new();
    let mut last_name = String::new();
    let mut last_code = String::new();
    let mut previous_skipped = false;

    for row in &rows[header + 1..] {
        let mut name = column(row, 0);
        let mut code = column(row, 1);
        let desc = column(row, 2);

        if desc.contains(END_MARKER) {
            break;
        }

        if previous_skipped && code.is_empty() {
            continue;
        }

        if name.is_empty() {
            if !code.is_empty() {
                name = last_name.clone();
            } else if !desc.is_empty() {
                name = last_name.clone();
                code = last_code.clone();
            } else {
                previous_skipped = true;
                continue;
            }
        }
        previous_skipped = false;

        if !name.is_empty() {
            last_name = name.clone();
        }
        if !code.is_empty() {
            last_code = code.clone();
        }

        steps.push(ProcessStep {
            process_name: name,
            process_code: code,
            process_desc: desc,
        });
    }

    Some(steps)
}

/// 工程カードを JSON に保存
pub fn save_process_card_to_json(card: &ProcessCard, output_path: impl AsRef<Path>) -> Result<(), ExcelError> {
    let output_path = output_path.as_ref();
    write_json_pretty(card, output_path)?;
    info!("工程データを保存: {}", output_path.display());
    Ok(())
}

/// 保存済みの工程カード JSON を読み込む
pub fn load_process_card_from_json(path: impl AsRef<Path>) -> Result<ProcessCard, ExcelError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let card: ProcessCard = serde_json::from_str(&content)?;
    if card.processes.is_empty() {
        warn!("工程が含まれていません: {}", path.as_ref().display());
    }
    Ok(card)
}
