//! 検査項目データの生成
//!
//! 図面の注記・工程カード・外観要求表を合わせて、検査表に並べる項目一覧を作る。

use crate::annotation::{
    parse_material_info, spec_limits, thickness_tolerance, MaterialInfo, Normalizer, SpecLimits,
    ThicknessMap,
};
use crate::dwg::ParseResult;
use crate::excel::{ProcessCard, ProcessStep, ProductInfo};
use crate::output::write_json_pretty;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// 検査データのエラー
#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("JSON の解析に失敗: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 検査区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "外观")]
    Appearance,
    #[serde(rename = "尺寸")]
    Dimension,
    #[serde(rename = "性能")]
    Performance,
}

impl Category {
    /// 項目文字列から区分を決める
    pub fn of(item: &str) -> Self {
        if item.contains("外观") {
            Self::Appearance
        } else if item.contains("尺寸") {
            Self::Dimension
        } else {
            Self::Performance
        }
    }
}

/// 外観要求表の1要求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppearanceRequirement {
    #[serde(default)]
    pub description: String,
}

/// 工程名 -> 外観要求
pub type AppearanceMap = HashMap<String, Vec<AppearanceRequirement>>;

/// 外観要求表（JSON）を読み込む
pub fn load_appearance_map(path: impl AsRef<Path>) -> Result<AppearanceMap, InspectionError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let map: AppearanceMap = serde_json::from_str(&content)?;
    info!("外観要求表: {} 工程", map.len());
    Ok(map)
}

/// 料厚公差表（JSON）を読み込む
///
/// キーは ">1.0~2.0" のような範囲、値は "±0.10" のような公差表記。
pub fn load_thickness_map(path: impl AsRef<Path>) -> Result<ThicknessMap, InspectionError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let map: ThicknessMap = serde_json::from_str(&content)?;
    info!("料厚公差表: {} 件", map.len());
    Ok(map)
}

/// 検査項目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionItem {
    pub seq: usize,
    pub item: String,
    pub category: Category,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
}

/// 検査データ一式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionDataset {
    pub dwg_file: String,
    pub excel_file: String,
    pub generated_at: DateTime<Local>,
    pub product: ProductInfo,
    pub material: MaterialInfo,
    pub items: Vec<InspectionItem>,
}

/// 工程ごとの外観要求（同じ工程名は最初の1回だけ）
pub fn appearance_items(processes: &[ProcessStep], appearance: &AppearanceMap) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for process in processes {
        let name = process.process_name.as_str();
        if name.is_empty() || seen.contains(name) {
            continue;
        }
        let Some(requirements) = appearance.get(name) else {
            debug!("工程 {} の外観要求はありません", name);
            continue;
        };
        for requirement in requirements {
            items.push(format!(
                "外观：{}({})-{}",
                name, process.process_code, requirement.description
            ));
        }
        seen.insert(name);
    }

    items
}

/// 工程の説明を加工項目にする（名前・コード・説明が同じものは1回だけ）
pub fn process_description_items(processes: &[ProcessStep]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for process in processes {
        if process.process_desc.trim().is_empty() {
            continue;
        }
        let key = (
            process.process_name.as_str(),
            process.process_code.as_str(),
            process.process_desc.as_str(),
        );
        if !seen.insert(key) {
            debug!("重複した工程説明を除外: {:?}", key);
            continue;
        }
        items.push(format!(
            "加工：{}({})-{}",
            process.process_name, process.process_code, process.process_desc
        ));
    }

    items
}

/// 図面の注記を寸法項目にする
///
/// 番号は注記一覧での位置（1始まり）。1文字以下の注記は除く。
pub fn dimension_items(result: &ParseResult, normalizer: &Normalizer) -> Vec<String> {
    result
        .mtext
        .iter()
        .enumerate()
        .filter(|(_, record)| record.text.chars().count() > 1)
        .map(|(idx, record)| {
            format!("尺寸{}：{}", idx + 1, normalizer.normalize(&record.text).trim())
        })
        .collect()
}

fn item(seq: usize, text: String, category: Category, limits: Option<SpecLimits>) -> InspectionItem {
    let limits = limits.or_else(|| spec_limits(&text));
    InspectionItem {
        seq,
        category,
        lower_limit: limits.map(|l| l.lower),
        upper_limit: limits.map(|l| l.upper),
        item: text,
    }
}

/// 検査データを組み立てる
///
/// 並び順: 材質、料厚、外観、加工、寸法。
/// 料厚公差表があり料厚が読めた場合、料厚の項目に公差と上下限を付ける。
pub fn build_inspection_dataset(
    dwg: &ParseResult,
    card: &ProcessCard,
    product: &ProductInfo,
    appearance: &AppearanceMap,
    thickness: Option<&ThicknessMap>,
    normalizer: &Normalizer,
) -> InspectionDataset {
    let material = parse_material_info(&product.material);

    let thickness_entry = match thickness.filter(|_| material.thickness_value > 0.0) {
        Some(map) => {
            let tolerance = thickness_tolerance(material.thickness_value, map);
            (
                format!("料厚：{} {}", material.thickness, tolerance.tolerance_str),
                Category::Dimension,
                tolerance.limits(material.thickness_value),
            )
        }
        None => (format!("料厚：{}", material.thickness), Category::Dimension, None),
    };

    let mut entries = vec![
        (format!("材质：{}", material.material_type), Category::Performance, None),
        thickness_entry,
    ];
    entries.extend(
        appearance_items(&card.processes, appearance)
            .into_iter()
            .chain(process_description_items(&card.processes))
            .chain(dimension_items(dwg, normalizer))
            .map(|text| {
                let category = Category::of(&text);
                (text, category, None)
            }),
    );

    let items: Vec<InspectionItem> = entries
        .into_iter()
        .enumerate()
        .map(|(idx, (text, category, limits))| item(idx + 1, text, category, limits))
        .collect();

    info!("検査項目 {} 件を生成", items.len());

    InspectionDataset {
        dwg_file: dwg.file_name.clone(),
        excel_file: card.file_name.clone(),
        generated_at: Local::now(),
        product: product.clone(),
        material,
        items,
    }
}

/// 検査データを JSON に保存
pub fn save_inspection_to_json(
    dataset: &InspectionDataset,
    output_path: impl AsRef<Path>,
) -> Result<(), InspectionError> {
    let output_path = output_path.as_ref();
    write_json_pretty(dataset, output_path)?;
    info!("検査データを保存: {}", output_path.display());
    Ok(())
}
