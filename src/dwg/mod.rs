//! DWG 解析モジュール - 複数の戦略で図面を読み、MTEXT 注記を取り出す

pub mod extract;
pub mod strategy;
pub mod tool;

use crate::annotation::is_meaningful_annotation;
use crate::config::Config;
use crate::output::write_json_pretty;
use extract::{direct_annotation_entities, entity_text, recursive_annotation_entities, Entity, OWNER_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use strategy::{
    file_stem, is_synthetic_tree, DxfConversionStrategy, MinimalDataStrategy, NativeJsonStrategy,
    ParseStrategy, StrategyError, PLACEHOLDER_MATERIAL,
};
use thiserror::Error;
use tool::ToolCommand;
use tracing::{error, info, warn};

/// DWG 解析のエラー
#[derive(Debug, Error)]
pub enum DwgError {
    #[error("DWGファイルが存在しません: {0}")]
    InputNotFound(PathBuf),

    #[error("DWGファイルを解析できません: {0}")]
    UnparseableDrawing(PathBuf),

    #[error("JSONの処理に失敗: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 抽出された注記（テキストと親要素の参照）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub text: String,
    pub ownerhandle: Value,
}

/// 解析結果（下流の帳票生成が読むJSONの形）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_name: String,
    pub mtext: Vec<AnnotationRecord>,
}

/// 戦略1回分の記録
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    /// 失敗した場合の理由
    pub error: Option<String>,
}

impl StrategyAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// 1回の解析の結果一式
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub result: ParseResult,
    /// 成功した戦略が返した解析ツリー（未加工）
    pub raw: Value,
    /// 解析ツリーを作った戦略
    pub strategy: &'static str,
    /// 試した戦略の記録（順番どおり）
    pub attempts: Vec<StrategyAttempt>,
    /// 注記が見つからず合成した注記を返しているか
    pub placeholder_annotations: bool,
}

impl ParseOutcome {
    /// 合成データ由来で信頼できない結果か
    pub fn is_degraded(&self) -> bool {
        self.placeholder_annotations || is_synthetic_tree(&self.raw)
    }
}

/// 戦略を順番に試す DWG パーサー
pub struct DwgParser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl DwgParser {
    /// 既定の戦略（dwgread -> dwg2dxf -> 合成データ）で作る
    pub fn new(config: &Config) -> Self {
        Self::with_strategies(vec![
            Box::new(NativeJsonStrategy::new(
                ToolCommand::new(config.dwgread_bin.clone(), config.tool_timeout),
                config.debug_dir.clone(),
            )),
            Box::new(DxfConversionStrategy::new(ToolCommand::new(
                config.dwg2dxf_bin.clone(),
                config.tool_timeout,
            ))),
            Box::new(MinimalDataStrategy),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    /// DWG ファイルを解析
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<ParseOutcome, DwgError> {
        let path = path.as_ref();

        if !path.exists() {
            error!("DWGファイルが存在しません: {}", path.display());
            return Err(DwgError::InputNotFound(path.to_path_buf()));
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut parsed = None;

        for strategy in &self.strategies {
            let outcome = strategy.parse(path).and_then(|tree| {
                if is_usable(&tree) {
                    Ok(tree)
                } else {
                    Err(StrategyError::EmptyTree)
                }
            });

            match outcome {
                Ok(tree) => {
                    info!("{} で解析に成功: {}", strategy.name(), path.display());
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        error: None,
                    });
                    parsed = Some((strategy.name(), tree));
                    break;
                }
                Err(e) => {
                    warn!("{} での解析に失敗: {}", strategy.name(), e);
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let Some((strategy, raw)) = parsed else {
            error!("すべての解析方法が失敗しました: {}", path.display());
            return Err(DwgError::UnparseableDrawing(path.to_path_buf()));
        };

        let mut mtext = extract_annotations(&raw);
        let placeholder_annotations = mtext.is_empty();
        if placeholder_annotations {
            warn!("ownerhandle 付きの MTEXT が見つからないため合成注記を使用");
            mtext = placeholder_records(&file_stem(path));
        }

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ParseOutcome {
            result: ParseResult { file_name, mtext },
            raw,
            strategy,
            attempts,
            placeholder_annotations,
        })
    }
}

/// 既定設定で DWG ファイルを解析し、(結果, 解析ツリー) を返す
pub fn parse_dwg_file(path: impl AsRef<Path>) -> Result<(ParseResult, Value), DwgError> {
    let outcome = DwgParser::new(&Config::default()).parse(path)?;
    Ok((outcome.result, outcome.raw))
}

/// 空でない解析ツリーか
fn is_usable(tree: &Value) -> bool {
    match tree {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// 解析ツリーから意味のある MTEXT 注記を取り出す
///
/// まずトップレベルの OBJECTS を見て、何も残らなければツリー全体を探す。
pub fn extract_annotations(tree: &Value) -> Vec<AnnotationRecord> {
    let mut records = Vec::new();

    if let Some(candidates) = direct_annotation_entities(tree) {
        info!("OBJECTS から {} 個の MTEXT を検出", candidates.len());
        records = keep_meaningful(&candidates);
        info!("フィルタ後 {} 個の MTEXT を保持", records.len());
    }

    if records.is_empty() {
        let candidates = recursive_annotation_entities(tree);
        info!("再帰探索で {} 個の MTEXT を検出", candidates.len());
        records = keep_meaningful(&candidates);
    }

    records
}

/// 判定を通過し、かつ ownerhandle を持つものだけ残す
fn keep_meaningful(candidates: &[&Entity]) -> Vec<AnnotationRecord> {
    candidates
        .iter()
        .filter(|entity| is_meaningful_annotation(entity))
        .filter_map(|entity| {
            let owner = entity.get(OWNER_FIELD)?;
            Some(AnnotationRecord {
                text: entity_text(entity).unwrap_or_default(),
                ownerhandle: owner.clone(),
            })
        })
        .collect()
}

/// 注記が見つからない場合の合成注記（図番と材料）
pub fn placeholder_records(stem: &str) -> Vec<AnnotationRecord> {
    vec![
        AnnotationRecord {
            text: format!("图号: {}", stem),
            ownerhandle: Value::String("0".to_string()),
        },
        AnnotationRecord {
            text: PLACEHOLDER_MATERIAL.to_string(),
            ownerhandle: Value::String("1".to_string()),
        },
    ]
}

/// 解析結果を JSON に保存
pub fn save_result_to_json(result: &ParseResult, output_path: impl AsRef<Path>) -> Result<(), DwgError> {
    let output_path = output_path.as_ref();
    write_json_pretty(result, output_path)?;
    info!(
        "DWGデータを保存: {} (MTEXT {} 件)",
        output_path.display(),
        result.mtext.len()
    );
    Ok(())
}

/// 保存済みの解析結果を読み込む
pub fn load_result_from_json(path: impl AsRef<Path>) -> Result<ParseResult, DwgError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// DWG を DXF に変換
///
/// 出力先を省略した場合は入力と同じ場所に拡張子 .dxf で作る。
/// 変換ツールが失敗した場合は `Ok(None)`（stderr はログに出す）。
pub fn convert_dwg_to_dxf(
    tool: &ToolCommand,
    dwg_path: impl AsRef<Path>,
    output_path: Option<&Path>,
) -> Result<Option<PathBuf>, DwgError> {
    let dwg_path = dwg_path.as_ref();

    if !dwg_path.exists() {
        error!("DWGファイルが存在しません: {}", dwg_path.display());
        return Err(DwgError::InputNotFound(dwg_path.to_path_buf()));
    }

    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dwg_path.with_extension("dxf"));

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match tool.run([dwg_path.as_os_str(), OsStr::new("-o"), output_path.as_os_str()]) {
        Ok(_) => {
            info!(
                "DWG {} を DXF {} に変換しました",
                dwg_path.display(),
                output_path.display()
            );
            Ok(Some(output_path))
        }
        Err(e) => {
            error!("{} の実行に失敗: {}", tool, e);
            Ok(None)
        }
    }
}
