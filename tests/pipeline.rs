use cad_inspection::annotation::{normalize, spec_limits};
use cad_inspection::dwg::strategy::{MinimalDataStrategy, ParseStrategy, StrategyError};
use cad_inspection::{parse_dwg_file, save_result_to_json, DwgError, DwgParser};
use serde_json::{json, Value};
use std::path::Path;

/// dwgread の出力を模した戦略
struct CannedTree(Value);

impl ParseStrategy for CannedTree {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn parse(&self, _path: &Path) -> Result<Value, StrategyError> {
        Ok(self.0.clone())
    }
}

struct AlwaysFails;

impl ParseStrategy for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    fn parse(&self, path: &Path) -> Result<Value, StrategyError> {
        Err(StrategyError::MissingOutput(path.with_extension("json")))
    }
}

fn write_drawing(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"AC1027").unwrap();
    path
}

#[test]
fn missing_drawing_is_input_not_found() {
    let err = parse_dwg_file("/no/such/dir/part.dwg").unwrap_err();
    assert!(matches!(err, DwgError::InputNotFound(_)));
}

#[test]
fn unreadable_drawing_still_yields_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_drawing(dir.path(), "81206851-03.dwg");

    let (result, raw) = parse_dwg_file(&path).unwrap();
    assert_eq!(result.file_name, "81206851-03.dwg");
    assert!(!result.mtext.is_empty());
    assert!(raw.is_object());
}

#[test]
fn every_strategy_failing_is_unparseable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_drawing(dir.path(), "part.dwg");

    let parser = DwgParser::with_strategies(vec![Box::new(AlwaysFails), Box::new(AlwaysFails)]);
    let err = parser.parse(&path).unwrap_err();
    assert!(matches!(err, DwgError::UnparseableDrawing(_)));
}

#[test]
fn native_tree_to_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_drawing(dir.path(), "bracket.dwg");

    let tree = json!({
        "FILEHEADER": {"version": "R2018"},
        "OBJECTS": [
            {"object": "BLOCK_HEADER", "handle": [0, 1, 31]},
            {"entity": "MTEXT", "text": "\\A1;96-%%c4.6{\\H0.7x;\\S+0.1^ 0;}", "ownerhandle": [4, 1, 31], "layer": "DIM"},
            {"entity": "MTEXT", "text": "WI-GC006-D", "ownerhandle": [4, 1, 31]},
            {"entity": "MTEXT", "text": "文件编号", "ownerhandle": [4, 1, 31]},
            {"entity": "MTEXT", "text": "C:\\CAD\\bracket.dwg", "ownerhandle": [4, 1, 31]},
            {"entity": "MTEXT", "text": "R2.5", "ownerhandle": [4, 1, 32]},
            {"entity": "MTEXT", "text": "未注公差按GB/T1804-m执行"}
        ]
    });
    let parser = DwgParser::with_strategies(vec![
        Box::new(AlwaysFails),
        Box::new(CannedTree(tree)),
        Box::new(MinimalDataStrategy),
    ]);

    let outcome = parser.parse(&path).unwrap();
    assert_eq!(outcome.strategy, "canned");
    assert!(!outcome.is_degraded());

    let texts: Vec<&str> = outcome.result.mtext.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["\\A1;96-%%c4.6{\\H0.7x;\\S+0.1^ 0;}", "R2.5"]);

    let normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
    assert_eq!(normalized, vec!["φ4.6±(0.1, 0)", "R2.5±0.2"]);

    let limits = spec_limits(&normalized[0]).unwrap();
    assert!((limits.lower - 4.6).abs() < 1e-9);
    assert!((limits.upper - 4.7).abs() < 1e-9);

    let output = dir.path().join("outputs/bracket_dwg.json");
    save_result_to_json(&outcome.result, &output).unwrap();
    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        saved,
        json!({
            "file_name": "bracket.dwg",
            "mtext": [
                {"text": "\\A1;96-%%c4.6{\\H0.7x;\\S+0.1^ 0;}", "ownerhandle": [4, 1, 31]},
                {"text": "R2.5", "ownerhandle": [4, 1, 32]}
            ]
        })
    );
}
