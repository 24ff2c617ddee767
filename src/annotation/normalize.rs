//! CAD 書式テキストの整形
//!
//! `\A1;96-%%c4.6{\H0.7x;\S+0.1^ 0;}` のような MTEXT を `φ4.6±(0.1, 0)` に変換する。

use regex::Regex;
use std::sync::LazyLock;

/// 公差の記載が無い場合に付ける既定公差
///
/// 図面規格から導いた値ではない。運用側で確認が必要。
pub const DEFAULT_TOLERANCE: f64 = 0.2;

/// 直径記号（%%c の後ろの数値）
static DIAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%%c(\d+(\.\d+)?)").expect("valid regex"));

/// 積み重ね公差（\S+上^下）
static STACKED_TOLERANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\S\+([0-9.]+)\^\s*([0-9.]+)").expect("valid regex"));

/// \A1; などの書式コード
static FORMAT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z][^;]*;").expect("valid regex"));

/// {\H0.7x;...} のような書式ブロック
static FORMAT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\\[^}]*\}").expect("valid regex"));

/// 残った波括弧ブロック
static BRACE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("valid regex"));

static PLUS_MINUS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%%p").expect("valid regex"));

static DIAMETER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%%c").expect("valid regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").expect("valid regex"));

/// 注記テキストの整形器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    default_tolerance: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Normalizer {
    pub fn new(default_tolerance: f64) -> Self {
        Self { default_tolerance }
    }

    pub fn default_tolerance(&self) -> f64 {
        self.default_tolerance
    }

    /// CAD テキストを表示用の寸法文字列に変換
    pub fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        // 直径が書かれていれば直径＋公差の形にする
        if let Some(caps) = DIAMETER.captures(raw) {
            let diameter = &caps[1];
            return match STACKED_TOLERANCE.captures(raw) {
                Some(tol) => format!("φ{}±({}, {})", diameter, &tol[1], &tol[2]),
                None => format!("φ{}±{}", diameter, self.default_tolerance),
            };
        }

        let cleaned = strip_formatting(raw);

        let Some(number) = NUMBER.find(&cleaned) else {
            return cleaned;
        };

        if cleaned.contains('±') {
            return cleaned;
        }

        // 最初の数値に既定公差を付ける
        format!(
            "{}±{}{}",
            &cleaned[..number.end()],
            self.default_tolerance,
            &cleaned[number.end()..]
        )
    }
}

/// 書式コードを取り除き、記号コードを表示文字に置換
pub fn strip_formatting(raw: &str) -> String {
    let cleaned = FORMAT_CODE.replace_all(raw, "");
    let cleaned = FORMAT_BLOCK.replace_all(&cleaned, "");
    let cleaned = BRACE_BLOCK.replace_all(&cleaned, "");
    let cleaned = PLUS_MINUS_CODE.replace_all(&cleaned, "±");
    DIAMETER_CODE.replace_all(&cleaned, "φ").into_owned()
}

/// 既定公差で整形
pub fn normalize(raw: &str) -> String {
    Normalizer::default().normalize(raw)
}
