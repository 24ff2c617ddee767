//! 材料表記の解析モジュール

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// T=3, t3 など
static THICKNESS_LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)T=?(\d+(\.\d+)?)").expect("valid regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(\.\d+)?)").expect("valid regex"));

/// 材料情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialInfo {
    /// 材質 (Fe.08 など)
    pub material_type: String,
    /// 板厚の表記 (T=3 など)
    pub thickness: String,
    /// 板厚の数値
    pub thickness_value: f64,
}

/// 材料表記を材質と板厚に分ける
/// 対応: "Fe.08 T=3", "Fe,08 T3", "SPCC 1.2"
pub fn parse_material_info(material: &str) -> MaterialInfo {
    let mut info = MaterialInfo::default();

    if material.is_empty() {
        return info;
    }

    let mut parts = material.split(' ');

    if let Some(material_type) = parts.next() {
        info.material_type = material_type.trim().to_string();
    }

    if let Some(thickness_part) = parts.next() {
        let thickness_part = thickness_part.trim();
        info.thickness = thickness_part.to_string();

        if let Some(caps) = THICKNESS_LABELED.captures(thickness_part) {
            if let Ok(value) = caps[1].parse::<f64>() {
                info.thickness_value = value;
            }
        } else if let Some(caps) = NUMBER.captures(thickness_part) {
            if let Ok(value) = caps[1].parse::<f64>() {
                info.thickness_value = value;
                // T が付いていなければ付ける
                if !thickness_part.to_uppercase().starts_with('T') {
                    info.thickness = format!("T{}", format_value(value));
                }
            }
        }
    }

    debug!(
        "材料情報: {} -> 材質: {}, 板厚: {} ({})",
        material, info.material_type, info.thickness, info.thickness_value
    );
    info
}

/// 1.0 -> "1.0", 1.25 -> "1.25"
fn format_value(value: f64) -> String {
    if value == value.trunc() {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_thickness() {
        let info = parse_material_info("Fe.08 T=3");
        assert_eq!(info.material_type, "Fe.08");
        assert_eq!(info.thickness, "T=3");
        assert_eq!(info.thickness_value, 3.0);

        let info = parse_material_info("Fe,08 t2.5");
        assert_eq!(info.thickness, "t2.5");
        assert_eq!(info.thickness_value, 2.5);
    }

    #[test]
    fn test_bare_number_gets_prefix() {
        let info = parse_material_info("SPCC 1.2");
        assert_eq!(info.material_type, "SPCC");
        assert_eq!(info.thickness, "T1.2");
        assert_eq!(info.thickness_value, 1.2);

        let info = parse_material_info("SPCC 2mm");
        assert_eq!(info.thickness, "T2.0");
    }

    #[test]
    fn test_material_only() {
        let info = parse_material_info("SUS304");
        assert_eq!(info.material_type, "SUS304");
        assert!(info.thickness.is_empty());
        assert_eq!(info.thickness_value, 0.0);
    }

    #[test]
    fn test_empty() {
        assert_eq!(parse_material_info(""), MaterialInfo::default());
    }
}
