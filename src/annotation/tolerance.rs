//! 公差表記から規格の上下限を求める

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{info, warn};

/// 10±0.2
static SYMMETRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(\.\d+)?)±(\d+(\.\d+)?)").expect("valid regex"));

/// φ4.6±(0.1, 0)
static ASYMMETRIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(\.\d+)?)±\((\d+(\.\d+)?),\s*(\d+(\.\d+)?)\)").expect("valid regex")
});

/// 規格の下限・上限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecLimits {
    pub lower: f64,
    pub upper: f64,
}

/// 検査項目の文字列から上下限を計算
///
/// `a±t` なら (a-t, a+t)、`a±(u, l)` なら (a-l, a+u)。
pub fn spec_limits(item: &str) -> Option<SpecLimits> {
    if let Some(caps) = SYMMETRIC.captures(item) {
        let base: f64 = caps[1].parse().ok()?;
        let tolerance: f64 = caps[3].parse().ok()?;
        return Some(SpecLimits {
            lower: base - tolerance,
            upper: base + tolerance,
        });
    }

    let caps = ASYMMETRIC.captures(item)?;
    let base: f64 = caps[1].parse().ok()?;
    let upper: f64 = caps[3].parse().ok()?;
    let lower: f64 = caps[5].parse().ok()?;
    Some(SpecLimits {
        lower: base - lower,
        upper: base + upper,
    })
}

/// 料厚の範囲キー ">1.0~2.0"（下限を含まず上限を含む）
static THICKNESS_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">(\d+\.\d+)~(\d+\.\d+)").expect("valid regex"));

/// 料厚公差 "±0.15"
static PLUS_MINUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"±(\d+\.\d+)").expect("valid regex"));

/// 料厚の範囲 -> 公差表記
///
/// 記載順に照合するので `preserve_order` の `Map` をそのまま使う。
pub type ThicknessMap = Map<String, Value>;

/// 料厚の公差
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessTolerance {
    pub tolerance_str: String,
    pub upper: f64,
    pub lower: f64,
}

impl Default for ThicknessTolerance {
    fn default() -> Self {
        Self {
            tolerance_str: "±0.00".to_string(),
            upper: 0.0,
            lower: 0.0,
        }
    }
}

impl ThicknessTolerance {
    /// 料厚の値に公差を当てた上下限（公差が 0 なら無し）
    pub fn limits(&self, thickness: f64) -> Option<SpecLimits> {
        (self.upper > 0.0).then(|| SpecLimits {
            lower: thickness - self.lower,
            upper: thickness + self.upper,
        })
    }
}

/// 料厚に対応する公差を公差表から探す
///
/// 最初に当たった範囲で決まる。料厚が 0 以下、または当たる範囲が無ければ `±0.00`。
pub fn thickness_tolerance(thickness: f64, map: &ThicknessMap) -> ThicknessTolerance {
    let mut result = ThicknessTolerance::default();
    if thickness <= 0.0 {
        return result;
    }

    for (range, tolerance) in map {
        let Some(caps) = THICKNESS_RANGE.captures(range) else {
            continue;
        };
        let (Ok(lower), Ok(upper)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) else {
            continue;
        };
        if !(lower < thickness && thickness <= upper) {
            continue;
        }

        let Some(tolerance) = tolerance.as_str() else {
            warn!("料厚公差が文字列ではありません: {} -> {}", range, tolerance);
            break;
        };
        result.tolerance_str = tolerance.to_string();
        if let Some(value) = PLUS_MINUS
            .captures(tolerance)
            .and_then(|c| c[1].parse::<f64>().ok())
        {
            result.upper = value;
            result.lower = value;
        }
        info!("料厚 {} の公差: {}", thickness, tolerance);
        break;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_symmetric() {
        let limits = spec_limits("尺寸1：10±0.2").unwrap();
        assert!(approx(limits.lower, 9.8));
        assert!(approx(limits.upper, 10.2));
    }

    #[test]
    fn test_asymmetric() {
        let limits = spec_limits("尺寸2：φ4.6±(0.1, 0)").unwrap();
        assert!(approx(limits.lower, 4.6));
        assert!(approx(limits.upper, 4.7));
    }

    fn thickness_map() -> ThicknessMap {
        serde_json::from_str(
            r#"{
                "说明": "不是范围",
                ">0.5~1.0": "±0.05",
                ">1.0~2.0": "±0.10",
                ">2.0~3.0": "±0.15"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_thickness_in_range() {
        let tolerance = thickness_tolerance(3.0, &thickness_map());
        assert_eq!(tolerance.tolerance_str, "±0.15");
        let limits = tolerance.limits(3.0).unwrap();
        assert!(approx(limits.lower, 2.85));
        assert!(approx(limits.upper, 3.15));

        // 下限ちょうどは前の範囲に入る
        assert_eq!(thickness_tolerance(2.0, &thickness_map()).tolerance_str, "±0.10");
    }

    #[test]
    fn test_thickness_out_of_range() {
        let tolerance = thickness_tolerance(5.0, &thickness_map());
        assert_eq!(tolerance, ThicknessTolerance::default());
        assert_eq!(tolerance.tolerance_str, "±0.00");
        assert!(tolerance.limits(5.0).is_none());
        assert_eq!(thickness_tolerance(0.5, &thickness_map()), ThicknessTolerance::default());
    }

    #[test]
    fn test_thickness_zero() {
        assert_eq!(thickness_tolerance(0.0, &thickness_map()), ThicknessTolerance::default());
        assert_eq!(thickness_tolerance(-1.0, &thickness_map()), ThicknessTolerance::default());
    }

    #[test]
    fn test_thickness_tolerance_without_value() {
        let map: ThicknessMap = serde_json::from_str(r#"{">1.0~2.0": "见图纸"}"#).unwrap();
        let tolerance = thickness_tolerance(1.5, &map);
        assert_eq!(tolerance.tolerance_str, "见图纸");
        assert!(tolerance.limits(1.5).is_none());
    }

    #[test]
    fn test_no_tolerance() {
        assert!(spec_limits("外观：冲压(10)-无毛刺").is_none());
        assert!(spec_limits("±").is_none());
    }
}
