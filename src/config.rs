//! 実行設定 - 環境変数（.env 含む）から読み込む

use crate::annotation::DEFAULT_TOLERANCE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const ENV_DWGREAD_BIN: &str = "CAD_DWGREAD_BIN";
pub const ENV_DWG2DXF_BIN: &str = "CAD_DWG2DXF_BIN";
pub const ENV_TOOL_TIMEOUT_SECS: &str = "CAD_TOOL_TIMEOUT_SECS";
pub const ENV_DEFAULT_TOLERANCE: &str = "CAD_DEFAULT_TOLERANCE";
pub const ENV_DEBUG_DIR: &str = "CAD_DEBUG_DIR";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// 実行設定
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// DWG -> JSON 変換ツール
    pub dwgread_bin: PathBuf,
    /// DWG -> DXF 変換ツール
    pub dwg2dxf_bin: PathBuf,
    /// 外部ツールのタイムアウト
    pub tool_timeout: Duration,
    /// 公差記載が無い寸法に付ける既定公差
    pub default_tolerance: f64,
    /// dwgread の生出力の保存先
    pub debug_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dwgread_bin: PathBuf::from("dwgread"),
            dwg2dxf_bin: PathBuf::from("dwg2dxf"),
            tool_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_tolerance: DEFAULT_TOLERANCE,
            debug_dir: None,
        }
    }
}

impl Config {
    /// プロセスの環境変数から読み込む
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から読み込む（不正な値は既定値に戻す）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(bin) = get(ENV_DWGREAD_BIN) {
            config.dwgread_bin = PathBuf::from(bin);
        }
        if let Some(bin) = get(ENV_DWG2DXF_BIN) {
            config.dwg2dxf_bin = PathBuf::from(bin);
        }
        if let Some(raw) = get(ENV_TOOL_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.tool_timeout = Duration::from_secs(secs),
                _ => warn!("{} の値が不正です: {:?}（既定値を使用）", ENV_TOOL_TIMEOUT_SECS, raw),
            }
        }
        if let Some(raw) = get(ENV_DEFAULT_TOLERANCE) {
            match raw.parse::<f64>() {
                Ok(tol) if tol.is_finite() && tol >= 0.0 => config.default_tolerance = tol,
                _ => warn!("{} の値が不正です: {:?}（既定値を使用）", ENV_DEFAULT_TOLERANCE, raw),
            }
        }
        if let Some(dir) = get(ENV_DEBUG_DIR) {
            config.debug_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.dwgread_bin, PathBuf::from("dwgread"));
        assert_eq!(config.tool_timeout, Duration::from_secs(120));
        assert_eq!(config.default_tolerance, 0.2);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_DWGREAD_BIN, "/opt/libredwg/bin/dwgread"),
            (ENV_DWG2DXF_BIN, "/opt/libredwg/bin/dwg2dxf"),
            (ENV_TOOL_TIMEOUT_SECS, "30"),
            (ENV_DEFAULT_TOLERANCE, "0.1"),
            (ENV_DEBUG_DIR, "outputs"),
        ]));
        assert_eq!(config.dwgread_bin, PathBuf::from("/opt/libredwg/bin/dwgread"));
        assert_eq!(config.dwg2dxf_bin, PathBuf::from("/opt/libredwg/bin/dwg2dxf"));
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.default_tolerance, 0.1);
        assert_eq!(config.debug_dir, Some(PathBuf::from("outputs")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            (ENV_TOOL_TIMEOUT_SECS, "soon"),
            (ENV_DEFAULT_TOLERANCE, "-1"),
            (ENV_DEBUG_DIR, "  "),
        ]));
        assert_eq!(config.tool_timeout, Duration::from_secs(120));
        assert_eq!(config.default_tolerance, 0.2);
        assert_eq!(config.debug_dir, None);
    }
}
