//! 工程カードの製品情報（固定セル）

use super::{cell_text, open_first_sheet, ExcelError};
use calamine::{Data, Range};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// 製品コードのセル
const PRODUCT_CODE_CELL: &str = "D4";
/// 図番のセル
const DRAWING_NO_CELL: &str = "C5";
/// 材料のセル
const MATERIAL_CELL: &str = "H6";
/// 版数のセル
const VERSION_CELL: &str = "A4";
/// 部品名のセル
const PART_NAME_CELL: &str = "C6";

/// 製品情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_code: String,
    pub drawing_no: String,
    pub material: String,
    pub version: String,
    pub part_name: String,
}

impl ProductInfo {
    /// シートの固定セルから読み取る
    pub fn from_range(range: &Range<Data>) -> Self {
        let info = Self {
            product_code: strip_label(&cell_value(range, PRODUCT_CODE_CELL)),
            drawing_no: cell_value(range, DRAWING_NO_CELL),
            material: cell_value(range, MATERIAL_CELL),
            version: strip_label(&cell_value(range, VERSION_CELL)),
            part_name: cell_value(range, PART_NAME_CELL),
        };
        info!(
            "製品情報: コード={} 図番={} 材料={} 版数={} 部品名={}",
            info.product_code, info.drawing_no, info.material, info.version, info.part_name
        );
        info
    }
}

/// 工程カードの最初のシートから製品情報を読む
pub fn read_product_info(path: impl AsRef<Path>) -> Result<ProductInfo, ExcelError> {
    let (_, range) = open_first_sheet(path.as_ref())?;
    Ok(ProductInfo::from_range(&range))
}

/// "D4" -> (行, 列) の 0 始まりの位置
pub fn parse_cell_ref(coord: &str) -> Option<(u32, u32)> {
    let split = coord.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = coord.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters
        .chars()
        .try_fold(0u32, |acc, c| {
            acc.checked_mul(26)?
                .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        })?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// セルの値（無い・空・座標不正なら空文字）
pub fn cell_value(range: &Range<Data>, coord: &str) -> String {
    let Some(position) = parse_cell_ref(coord) else {
        warn!("不正なセル座標: {}", coord);
        return String::new();
    };
    range.get_value(position).map(cell_text).unwrap_or_default()
}

/// "产品编码:21013554" のようなラベルを外す
///
/// 全角コロンを優先する。
pub fn strip_label(value: &str) -> String {
    value
        .split_once('：')
        .or_else(|| value.split_once(':'))
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_else(|| value.to_string())
}
