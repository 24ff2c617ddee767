//! サブコマンドの処理

use crate::annotation::Normalizer;
use crate::config::Config;
use crate::dwg::strategy::file_stem;
use crate::dwg::tool::ToolCommand;
use crate::dwg::{convert_dwg_to_dxf, save_result_to_json, DwgParser, ParseOutcome};
use crate::excel::{
    load_process_card_from_json, parse_process_card, read_product_info, save_process_card_to_json,
    ProductInfo,
};
use crate::inspection::{
    build_inspection_dataset, load_appearance_map, load_thickness_map, save_inspection_to_json,
    AppearanceMap,
};
use crate::output::write_json_pretty;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 書き出したファイル
#[derive(Debug, Clone, Default)]
pub struct OutputPaths {
    pub dwg_json: PathBuf,
    pub raw_json: PathBuf,
    pub excel_json: Option<PathBuf>,
    pub inspection_json: Option<PathBuf>,
}

/// DWG を解析して注記と解析ツリーを保存
pub fn parse(config: &Config, dwg: &Path, output_dir: &Path) -> Result<OutputPaths> {
    parse_and_save(config, dwg, output_dir).map(|(_, paths)| paths)
}

fn parse_and_save(config: &Config, dwg: &Path, output_dir: &Path) -> Result<(ParseOutcome, OutputPaths)> {
    let outcome = DwgParser::new(config)
        .parse(dwg)
        .with_context(|| format!("DWGの解析に失敗: {}", dwg.display()))?;
    report_outcome(&outcome);

    let stem = file_stem(dwg);
    let dwg_json = output_dir.join(format!("{}_dwg.json", stem));
    save_result_to_json(&outcome.result, &dwg_json)
        .with_context(|| format!("DWGデータの保存に失敗: {}", dwg_json.display()))?;

    let raw_json = output_dir.join(format!("{}_dwg_raw_data.json", stem));
    write_json_pretty(&outcome.raw, &raw_json)
        .with_context(|| format!("原始データの保存に失敗: {}", raw_json.display()))?;

    let paths = OutputPaths {
        dwg_json,
        raw_json,
        ..Default::default()
    };
    Ok((outcome, paths))
}

/// どの戦略で解析できたかをログに残す
fn report_outcome(outcome: &ParseOutcome) {
    for attempt in &outcome.attempts {
        match &attempt.error {
            None => info!("解析方法 {}: 成功", attempt.strategy),
            Some(e) => info!("解析方法 {}: 失敗 ({})", attempt.strategy, e),
        }
    }
    info!("MTEXT {} 件", outcome.result.mtext.len());
    if outcome.is_degraded() {
        warn!("図面を読み取れなかったため、ファイル名からの合成データを含みます");
    }
}

/// DWG を DXF に変換して出力先ディレクトリに置く
pub fn convert(config: &Config, dwg: &Path, output_dir: &Path) -> Result<PathBuf> {
    let tool = ToolCommand::new(config.dwg2dxf_bin.clone(), config.tool_timeout);
    let target = output_dir.join(format!("{}.dxf", file_stem(dwg)));

    convert_dwg_to_dxf(&tool, dwg, Some(&target))
        .with_context(|| format!("DXFへの変換に失敗: {}", dwg.display()))?
        .ok_or_else(|| anyhow!("DXFへの変換に失敗: {}", dwg.display()))
}

/// DWG と工程カードから検査データを作る
pub fn process(
    config: &Config,
    dwg: &Path,
    excel: &Path,
    output_dir: &Path,
    appearance_map: Option<&Path>,
    thickness_map: Option<&Path>,
) -> Result<OutputPaths> {
    let (outcome, mut paths) = parse_and_save(config, dwg, output_dir)?;

    let is_json = excel
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let (card, product) = if is_json {
        let card = load_process_card_from_json(excel)
            .with_context(|| format!("工程データの読み込みに失敗: {}", excel.display()))?;
        warn!("工程データが JSON のため製品情報は空になります");
        (card, ProductInfo::default())
    } else {
        let card = parse_process_card(excel)
            .with_context(|| format!("工程カードの解析に失敗: {}", excel.display()))?;
        let product = read_product_info(excel)
            .with_context(|| format!("製品情報の読み込みに失敗: {}", excel.display()))?;

        let excel_json = output_dir.join(format!("{}_excel.json", file_stem(excel)));
        save_process_card_to_json(&card, &excel_json)
            .with_context(|| format!("工程データの保存に失敗: {}", excel_json.display()))?;
        paths.excel_json = Some(excel_json);
        (card, product)
    };

    let appearance = match appearance_map {
        Some(path) => load_appearance_map(path)
            .with_context(|| format!("外観要求表の読み込みに失敗: {}", path.display()))?,
        None => AppearanceMap::new(),
    };

    let thickness = thickness_map
        .map(|path| {
            load_thickness_map(path)
                .with_context(|| format!("料厚公差表の読み込みに失敗: {}", path.display()))
        })
        .transpose()?;

    let normalizer = Normalizer::new(config.default_tolerance);
    let dataset = build_inspection_dataset(
        &outcome.result,
        &card,
        &product,
        &appearance,
        thickness.as_ref(),
        &normalizer,
    );

    let inspection_json = output_dir.join(format!("{}_inspection.json", file_stem(dwg)));
    save_inspection_to_json(&dataset, &inspection_json)
        .with_context(|| format!("検査データの保存に失敗: {}", inspection_json.display()))?;
    paths.inspection_json = Some(inspection_json);

    Ok(paths)
}
