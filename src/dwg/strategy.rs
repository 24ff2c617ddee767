//! DWG 解析戦略
//!
//! 1. dwgread で JSON に変換（最も情報が多い）
//! 2. dwg2dxf で DXF に変換し、TEXT / LINE / CIRCLE を取り出す
//! 3. ファイル名から最小限の合成データを作る（必ず成功）

use super::tool::{ToolCommand, ToolError};
use crate::output::write_json_pretty;
use dxf::entities::EntityType;
use dxf::Drawing;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// dwgread の出力として妥当な最小バイト数
pub const MIN_JSON_BYTES: usize = 100;

/// 合成データであることを示すフィールド
pub const SYNTHETIC_FIELD: &str = "is_synthetic";

/// 合成データの材料表記
pub const PLACEHOLDER_MATERIAL: &str = "材料: Fe.08 T=3";

/// 戦略の失敗（次の戦略へ進む）
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("出力JSONが小さすぎます ({size} バイト, 最小 {minimum} バイト)")]
    OutputTooSmall { size: usize, minimum: usize },

    #[error("JSONのパースに失敗: {0}")]
    MalformedJson(#[source] serde_json::Error),

    #[error("出力ファイルが生成されませんでした: {0}")]
    MissingOutput(PathBuf),

    #[error("DXFの読み込みに失敗: {0}")]
    Dxf(String),

    #[error("解析結果が空です")]
    EmptyTree,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 解析戦略
pub trait ParseStrategy: Send + Sync {
    /// ログ用の名前
    fn name(&self) -> &'static str;

    /// DWG ファイルから解析ツリーを作る
    fn parse(&self, path: &Path) -> Result<Value, StrategyError>;
}

/// 戦略1: dwgread -O json
pub struct NativeJsonStrategy {
    tool: ToolCommand,
    /// 生データの保存先（None なら保存しない）
    debug_dir: Option<PathBuf>,
}

impl NativeJsonStrategy {
    pub fn new(tool: ToolCommand, debug_dir: Option<PathBuf>) -> Self {
        Self { tool, debug_dir }
    }

    /// 解析に成功した生データを保存
    fn persist_tree(&self, path: &Path, tree: &Value) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let target = dir.join(format!("{}_dwg_raw_data.json", file_stem(path)));
        match write_json_pretty(tree, &target) {
            Ok(()) => info!("原始解析データを保存: {}", target.display()),
            Err(e) => warn!("原始解析データの保存に失敗: {}", e),
        }
    }

    /// パースできなかった出力をそのまま保存
    fn persist_malformed(&self, path: &Path, bytes: &[u8]) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let target = dir.join(format!("{}_dwgread_raw_output.txt", file_stem(path)));
        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&target, bytes));
        match written {
            Ok(()) => info!("dwgread の出力を保存: {}", target.display()),
            Err(e) => warn!("dwgread の出力の保存に失敗: {}", e),
        }
    }
}

impl ParseStrategy for NativeJsonStrategy {
    fn name(&self) -> &'static str {
        "dwgread"
    }

    fn parse(&self, path: &Path) -> Result<Value, StrategyError> {
        // 呼び出しごとに一意な作業ディレクトリ（drop で削除）
        let scratch = tempfile::Builder::new().prefix("dwgread_").tempdir()?;
        let output = scratch.path().join("drawing.json");

        self.tool.run([
            OsStr::new("-O"),
            OsStr::new("json"),
            OsStr::new("-o"),
            output.as_os_str(),
            path.as_os_str(),
        ])?;

        if !output.exists() {
            return Err(StrategyError::MissingOutput(output));
        }

        let bytes = std::fs::read(&output)?;
        if bytes.len() < MIN_JSON_BYTES {
            return Err(StrategyError::OutputTooSmall {
                size: bytes.len(),
                minimum: MIN_JSON_BYTES,
            });
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(tree) => {
                let keys: Vec<&str> = tree
                    .as_object()
                    .map(|m| m.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                info!("dwgread 出力: {} バイト, トップレベルキー: {:?}", bytes.len(), keys);
                self.persist_tree(path, &tree);
                Ok(tree)
            }
            Err(e) => {
                self.persist_malformed(path, &bytes);
                Err(StrategyError::MalformedJson(e))
            }
        }
    }
}

/// 戦略2: dwg2dxf + DXF 読み込み
pub struct DxfConversionStrategy {
    tool: ToolCommand,
}

impl DxfConversionStrategy {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }
}

impl ParseStrategy for DxfConversionStrategy {
    fn name(&self) -> &'static str {
        "dwg2dxf"
    }

    fn parse(&self, path: &Path) -> Result<Value, StrategyError> {
        let scratch = tempfile::Builder::new().prefix("dwg2dxf_").tempdir()?;
        let output = scratch.path().join("drawing.dxf");

        self.tool.run([path.as_os_str(), OsStr::new("-o"), output.as_os_str()])?;

        if !output.exists() {
            return Err(StrategyError::MissingOutput(output));
        }

        let drawing =
            Drawing::load_file(&output).map_err(|e| StrategyError::Dxf(e.to_string()))?;
        Ok(drawing_to_tree(&drawing))
    }
}

/// DXF 図面をモデル空間のエンティティ一覧に変換
pub fn drawing_to_tree(drawing: &Drawing) -> Value {
    let mut texts = Vec::new();
    let mut lines = Vec::new();
    let mut circles = Vec::new();

    for entity in drawing.entities() {
        if entity.common.is_in_paper_space {
            continue;
        }
        let handle = format!("{:X}", entity.common.handle.0);
        let layer = entity.common.layer.clone();

        match entity.specific {
            EntityType::Text(ref text) => texts.push(json!({
                "type": "TEXT",
                "handle": handle,
                "text": text.value,
                "position": [text.location.x, text.location.y],
                "height": text.text_height,
                "layer": layer,
            })),
            EntityType::Line(ref line) => lines.push(json!({
                "type": "LINE",
                "handle": handle,
                "start": [line.p1.x, line.p1.y],
                "end": [line.p2.x, line.p2.y],
                "layer": layer,
            })),
            EntityType::Circle(ref circle) => circles.push(json!({
                "type": "CIRCLE",
                "handle": handle,
                "center": [circle.center.x, circle.center.y],
                "radius": circle.radius,
                "layer": layer,
            })),
            _ => {}
        }
    }

    let layers: Vec<String> = drawing.layers().map(|layer| layer.name.clone()).collect();

    json!({
        "text_entities": texts,
        "line_entities": lines,
        "circle_entities": circles,
        "layers": layers,
    })
}

/// 戦略3: ファイル名からの合成データ
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalDataStrategy;

impl ParseStrategy for MinimalDataStrategy {
    fn name(&self) -> &'static str {
        "minimal"
    }

    fn parse(&self, path: &Path) -> Result<Value, StrategyError> {
        Ok(minimal_tree(path))
    }
}

/// 図番と版数を推定（"81206851-03" -> ("81206851", "03")）
pub fn split_drawing_number(stem: &str) -> (String, String) {
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() >= 2 {
        (parts[0].to_string(), parts[1].to_string())
    } else {
        (stem.to_string(), String::new())
    }
}

/// 合成データを作る（各エンティティに合成マーカーを付ける）
pub fn minimal_tree(path: &Path) -> Value {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (drawing_number, version) = split_drawing_number(&file_stem(path));

    json!({
        "drawing_info": {
            "filename": file_name,
            "drawing_number": drawing_number,
            "version": version,
        },
        "text_entities": [
            {
                "type": "TEXT",
                "handle": "synthetic_text_1",
                "text": format!("图号: {}", drawing_number),
                "position": [50, 10],
                "height": 5.0,
                SYNTHETIC_FIELD: true,
            },
            {
                "type": "TEXT",
                "handle": "synthetic_text_2",
                "text": PLACEHOLDER_MATERIAL,
                "position": [50, 20],
                "height": 3.5,
                SYNTHETIC_FIELD: true,
            },
            {
                "type": "TEXT",
                "handle": "synthetic_text_3",
                "text": "设计: DESIGNER",
                "position": [50, 30],
                "height": 3.0,
                SYNTHETIC_FIELD: true,
            },
        ],
        "dimension_entities": [
            {
                "type": "DIMENSION",
                "handle": "synthetic_dim_1",
                "value": 100.0,
                "position": [100, 100],
                "text": "100",
                SYNTHETIC_FIELD: true,
            },
            {
                "type": "DIMENSION",
                "handle": "synthetic_dim_2",
                "value": 50.0,
                "position": [150, 100],
                "text": "50",
                SYNTHETIC_FIELD: true,
            },
        ],
        "line_entities": [
            {
                "type": "LINE",
                "handle": "synthetic_line_1",
                "start": [0, 0],
                "end": [100, 0],
                "layer": "DEFAULT",
                SYNTHETIC_FIELD: true,
            },
            {
                "type": "LINE",
                "handle": "synthetic_line_2",
                "start": [0, 0],
                "end": [0, 100],
                "layer": "DEFAULT",
                SYNTHETIC_FIELD: true,
            },
        ],
        "circle_entities": [
            {
                "type": "CIRCLE",
                "handle": "synthetic_circle_1",
                "center": [50, 50],
                "radius": 25.0,
                "layer": "DEFAULT",
                SYNTHETIC_FIELD: true,
            },
        ],
    })
}

/// 解析ツリーが合成データだけでできているか
///
/// エンティティが1つも無い場合は false。
pub fn is_synthetic_tree(tree: &Value) -> bool {
    let entities = super::extract::collect_all_entities(tree);
    !entities.is_empty()
        && entities
            .iter()
            .all(|e| e.get(SYNTHETIC_FIELD).and_then(Value::as_bool) == Some(true))
}

/// 拡張子を除いたファイル名
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_split_drawing_number() {
        assert_eq!(
            split_drawing_number("81206851-03"),
            ("81206851".to_string(), "03".to_string())
        );
        assert_eq!(
            split_drawing_number("A-B-C"),
            ("A".to_string(), "B".to_string())
        );
        assert_eq!(
            split_drawing_number("plain"),
            ("plain".to_string(), String::new())
        );
    }

    #[test]
    fn test_minimal_tree_is_synthetic() {
        let tree = minimal_tree(Path::new("/tmp/81206851-03.dwg"));
        assert_eq!(tree["drawing_info"]["filename"], "81206851-03.dwg");
        assert_eq!(tree["drawing_info"]["drawing_number"], "81206851");
        assert_eq!(tree["drawing_info"]["version"], "03");
        assert_eq!(tree["text_entities"][0]["text"], "图号: 81206851");
        assert_eq!(tree["text_entities"].as_array().unwrap().len(), 3);
        assert_eq!(tree["dimension_entities"].as_array().unwrap().len(), 2);
        assert_eq!(tree["line_entities"].as_array().unwrap().len(), 2);
        assert_eq!(tree["circle_entities"].as_array().unwrap().len(), 1);
        assert!(is_synthetic_tree(&tree));
    }

    #[test]
    fn test_is_synthetic_tree_detects_real_data() {
        let tree = json!({"OBJECTS": [{"type": 44, "entity": "MTEXT", "text": "R5"}]});
        assert!(!is_synthetic_tree(&tree));
        assert!(!is_synthetic_tree(&json!({})));
    }

    #[test]
    fn test_drawing_to_tree_model_space_only() {
        use dxf::entities::{Circle, Entity, Line, Text};
        use dxf::Point;

        let mut drawing = Drawing::new();
        let text = Text {
            value: "R5".to_string(),
            text_height: 2.5,
            ..Default::default()
        };
        drawing.add_entity(Entity::new(EntityType::Text(text)));
        drawing.add_entity(Entity::new(EntityType::Line(Line::new(
            Point::new(0.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
        ))));
        drawing.add_entity(Entity::new(EntityType::Circle(Circle::new(
            Point::new(5.0, 5.0, 0.0),
            2.0,
        ))));
        let mut paper = Entity::new(EntityType::Text(Text {
            value: "TITLE".to_string(),
            ..Default::default()
        }));
        paper.common.is_in_paper_space = true;
        drawing.add_entity(paper);

        let tree = drawing_to_tree(&drawing);
        let texts = tree["text_entities"].as_array().unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0]["text"], "R5");
        assert_eq!(texts[0]["height"], 2.5);
        assert_ne!(texts[0]["handle"], "0");
        assert_eq!(tree["line_entities"][0]["end"], json!([10.0, 0.0]));
        assert_eq!(tree["circle_entities"][0]["radius"], 2.0);
        assert!(tree["layers"].is_array());
        assert!(!is_synthetic_tree(&tree));
    }

    #[test]
    fn test_native_strategy_missing_tool_fails() {
        let strategy = NativeJsonStrategy::new(
            ToolCommand::new("no-such-dwgread-binary", Duration::from_secs(5)),
            None,
        );
        let err = strategy.parse(Path::new("drawing.dwg")).unwrap_err();
        assert!(matches!(err, StrategyError::Tool(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    mod fake_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// 引数 "-o <out>" の <out> に内容を書き出すスクリプトを作る
        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            let content = format!(
                "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-o\" ]; then out=\"$2\"; shift; fi\n  shift\ndone\n{}\n",
                body
            );
            std::fs::write(&path, content).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_native_strategy_reads_json() {
            let dir = tempfile::tempdir().unwrap();
            let debug_dir = dir.path().join("debug");
            let padding = "x".repeat(120);
            let tool = script(
                dir.path(),
                "dwgread",
                &format!(
                    "printf '{{\"OBJECTS\": [{{\"entity\": \"MTEXT\", \"text\": \"R5\", \"note\": \"{}\"}}]}}' > \"$out\"",
                    padding
                ),
            );
            let strategy = NativeJsonStrategy::new(
                ToolCommand::new(tool, Duration::from_secs(10)),
                Some(debug_dir.clone()),
            );
            let tree = strategy.parse(Path::new("part-01.dwg")).unwrap();
            assert_eq!(tree["OBJECTS"][0]["text"], "R5");
            assert!(debug_dir.join("part-01_dwg_raw_data.json").exists());
        }

        #[test]
        fn test_native_strategy_rejects_small_output() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "dwgread", "printf '{}' > \"$out\"");
            let strategy =
                NativeJsonStrategy::new(ToolCommand::new(tool, Duration::from_secs(10)), None);
            let err = strategy.parse(Path::new("part.dwg")).unwrap_err();
            assert!(matches!(
                err,
                StrategyError::OutputTooSmall { size: 2, minimum: MIN_JSON_BYTES }
            ));
        }

        #[test]
        fn test_native_strategy_persists_malformed_output() {
            let dir = tempfile::tempdir().unwrap();
            let debug_dir = dir.path().join("debug");
            let garbage = "{".repeat(150);
            let tool = script(
                dir.path(),
                "dwgread",
                &format!("printf '{}' > \"$out\"", garbage),
            );
            let strategy = NativeJsonStrategy::new(
                ToolCommand::new(tool, Duration::from_secs(10)),
                Some(debug_dir.clone()),
            );
            let err = strategy.parse(Path::new("bad.dwg")).unwrap_err();
            assert!(matches!(err, StrategyError::MalformedJson(_)));
            let saved = std::fs::read_to_string(debug_dir.join("bad_dwgread_raw_output.txt")).unwrap();
            assert_eq!(saved, garbage);
        }

        #[test]
        fn test_native_strategy_missing_output() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "dwgread", "true");
            let strategy =
                NativeJsonStrategy::new(ToolCommand::new(tool, Duration::from_secs(10)), None);
            let err = strategy.parse(Path::new("part.dwg")).unwrap_err();
            assert!(matches!(err, StrategyError::MissingOutput(_)));
        }

        /// ツールが受け取った出力先ディレクトリを記録して失敗するスクリプト
        fn failing_script(dir: &Path, name: &str, marker: &Path) -> PathBuf {
            script(
                dir,
                name,
                &format!("dirname \"$out\" > '{}'\nexit 1", marker.display()),
            )
        }

        fn recorded_dir(marker: &Path) -> PathBuf {
            PathBuf::from(std::fs::read_to_string(marker).unwrap().trim_end())
        }

        #[test]
        fn test_scratch_dir_removed_after_failure() {
            let dir = tempfile::tempdir().unwrap();

            let marker = dir.path().join("native_scratch.txt");
            let tool = failing_script(dir.path(), "dwgread", &marker);
            let strategy =
                NativeJsonStrategy::new(ToolCommand::new(tool, Duration::from_secs(10)), None);
            let err = strategy.parse(Path::new("part.dwg")).unwrap_err();
            assert!(matches!(err, StrategyError::Tool(ToolError::Failed { .. })));
            let scratch = recorded_dir(&marker);
            assert!(scratch.file_name().unwrap().to_string_lossy().starts_with("dwgread_"));
            assert!(!scratch.exists());

            let marker = dir.path().join("dxf_scratch.txt");
            let tool = failing_script(dir.path(), "dwg2dxf", &marker);
            let strategy = DxfConversionStrategy::new(ToolCommand::new(tool, Duration::from_secs(10)));
            assert!(strategy.parse(Path::new("part.dwg")).is_err());
            let scratch = recorded_dir(&marker);
            assert!(scratch.file_name().unwrap().to_string_lossy().starts_with("dwg2dxf_"));
            assert!(!scratch.exists());
        }

        #[test]
        fn test_dxf_strategy_rejects_invalid_dxf() {
            let dir = tempfile::tempdir().unwrap();
            let tool = script(dir.path(), "dwg2dxf", "printf 'not a dxf' > \"$out\"");
            let strategy = DxfConversionStrategy::new(ToolCommand::new(tool, Duration::from_secs(10)));
            let err = strategy.parse(Path::new("part.dwg")).unwrap_err();
            assert!(matches!(err, StrategyError::Dxf(_)));
        }
    }
}
