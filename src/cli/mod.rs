//! コマンドラインインターフェース

mod commands;

pub use commands::{convert, parse, process, OutputPaths};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 既定の出力先
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

#[derive(Parser)]
#[command(name = "cad_inspection")]
#[command(about = "DWG図面と工程カードから検査項目を抽出")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// DWG から注記を抽出して JSON に保存
    Parse {
        #[arg(long, value_name = "PATH")]
        dwg: PathBuf,

        #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
    },

    /// DWG を DXF に変換
    Convert {
        #[arg(long, value_name = "PATH")]
        dwg: PathBuf,

        #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,
    },

    /// DWG と工程カードから検査データを作る
    Process {
        #[arg(long, value_name = "PATH")]
        dwg: PathBuf,

        /// .xls / .xlsx、または保存済みの工程 JSON
        #[arg(long, value_name = "PATH")]
        excel: PathBuf,

        #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,

        /// 工程名ごとの外観要求表 (JSON)
        #[arg(long = "appearance-map", value_name = "PATH")]
        appearance_map: Option<PathBuf>,

        /// 料厚の範囲ごとの公差表 (JSON)
        #[arg(long = "thickness-map", value_name = "PATH")]
        thickness_map: Option<PathBuf>,
    },
}

/// コマンドライン引数を解釈して実行
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = crate::config::Config::from_env();

    match cli.command {
        Commands::Parse { dwg, output } => {
            let paths = parse(&config, &dwg, &output)?;
            println!("DWGデータ: {}", paths.dwg_json.display());
            println!("原始データ: {}", paths.raw_json.display());
        }
        Commands::Convert { dwg, output } => {
            let dxf = convert(&config, &dwg, &output)?;
            println!("DXF: {}", dxf.display());
        }
        Commands::Process {
            dwg,
            excel,
            output,
            appearance_map,
            thickness_map,
        } => {
            let paths = process(
                &config,
                &dwg,
                &excel,
                &output,
                appearance_map.as_deref(),
                thickness_map.as_deref(),
            )?;
            println!("DWGデータ: {}", paths.dwg_json.display());
            if let Some(card) = paths.excel_json {
                println!("工程データ: {}", card.display());
            }
            if let Some(inspection) = paths.inspection_json {
                println!("検査データ: {}", inspection.display());
            }
        }
    }

    Ok(())
}
