//! CAD 検査項目抽出 - DWG 図面の注記と工程カードから検査データを作るツール
//!
//! # 機能
//! - dwgread / dwg2dxf / ファイル名からの合成データ、の順で DWG を解析
//! - MTEXT 注記から寸法・公差などの意味のある注記だけを抽出
//! - CAD 書式テキストを `φ10±0.2` のような表示用の寸法に整形
//! - 工程カード（Excel）と外観要求表から検査項目一覧を生成

pub mod annotation;
pub mod cli;
pub mod config;
pub mod dwg;
pub mod excel;
pub mod inspection;
pub mod output;

pub use config::Config;
pub use dwg::{
    convert_dwg_to_dxf, parse_dwg_file, save_result_to_json, AnnotationRecord, DwgError, DwgParser,
    ParseOutcome, ParseResult,
};
