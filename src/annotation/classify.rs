//! 注記テキストの判定モジュール
//!
//! MTEXT には書式制御コードやファイルパス、定型ラベルが混ざっている。
//! 寸法・公差などの意味のある注記だけを残すため、規則を上から順に評価し、
//! 最初に当てはまった規則の判定を採用する。

use crate::dwg::extract::Entity;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Discard,
}

/// 判定対象（前後の空白を除いたテキストと元のエンティティ）
pub struct Candidate<'a> {
    pub text: String,
    pub entity: &'a Entity,
}

impl<'a> Candidate<'a> {
    pub fn new(entity: &'a Entity) -> Self {
        let text = crate::dwg::extract::entity_text(entity)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        Self { text, entity }
    }

    fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// 書式制御のエスケープ文字（バックスラッシュ）を含むか
    fn has_escape(&self) -> bool {
        self.text.contains('\\')
    }
}

/// 判定規則
pub struct Rule {
    pub name: &'static str,
    pub verdict: Verdict,
    pub matches: fn(&Candidate) -> bool,
}

/// 定型ラベル（完全一致で除外）
const BOILERPLATE_LABELS: &[&str] = &["文件编号", "说明"];

/// 中国語テキストのうち除外するもの
const EXCLUDED_CJK_LABELS: &[&str] = &["文件编号", "说明", "版本", "日期"];

/// 寸法・技術記号
const DIMENSION_SYMBOLS: &[char] = &[
    'Ø', 'ø', '∅', 'R', 'r', '°', '±', '×', 'X', 'x', '※', 'M', 'm',
];

/// 規格・技術用語
const TECHNICAL_TERMS: &[&str] = &[
    "GB", "ISO", "DIN", "JIS", "ANSI", "UNC", "标准", "规格", "型号",
];

/// 注記に関係する画層名
const ANNOTATION_LAYERS: &[&str] = &[
    "dim", "dimension", "text", "note", "annotation", "标注", "尺寸", "文本", "注释", "说明",
];

/// 文書番号（WI-GC006-D など）
static FILE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^[A-Za-z]+-[A-Za-z0-9]+-[A-Za-z0-9]$",
        r"^[A-Za-z]+-[A-Za-z0-9]+$",
    ])
});

/// 明らかなノイズ
static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // ファイルパス
        r"^C:\\",
        // 空の書式制御
        r"^\\A1;$",
        // 空白のみ
        r"^\s+$",
        // Windows パス
        r"^[A-Z]:\\",
        // URL
        r"^https?://",
        // フォント制御
        r"^\\f.*\|",
        // 文書番号
        r"^WI-[A-Z0-9]+",
    ])
});

/// 寸法表記
static DIMENSION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // 100, 10.5
        r"^\d+(\.\d+)?$",
        // 10x20
        r"^\d+(\.\d+)?\s*[×xX]\s*\d+(\.\d+)?$",
        // Ø10
        r"^[Øø∅]\s*\d+(\.\d+)?$",
        // R10
        r"^[Rr]\s*\d+(\.\d+)?$",
        // 45°
        r"^\d+(\.\d+)?°$",
        // ±0.1
        r"^±\s*\d+(\.\d+)?$",
        // 10±0.1, 10-0.1
        r"^\d+(\.\d+)?\s*[-±]\s*\d+(\.\d+)?$",
        // M8, M8x1.25
        r"^M\s*\d+(\.\d+)?(x\d+)?$",
        // ※10.5
        r"^※\s*\d+(\.\d+)?$",
    ])
});

static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").expect("valid regex"));
static CJK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fa5}]").expect("valid regex"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// 判定規則（評価順）
pub static RULES: &[Rule] = &[
    Rule {
        name: "empty_text",
        verdict: Verdict::Discard,
        matches: |c| c.text.is_empty(),
    },
    Rule {
        name: "boilerplate_label",
        verdict: Verdict::Discard,
        matches: |c| BOILERPLATE_LABELS.contains(&c.text.as_str()),
    },
    Rule {
        name: "file_id",
        verdict: Verdict::Discard,
        matches: |c| FILE_ID_PATTERNS.iter().any(|re| re.is_match(&c.text)),
    },
    Rule {
        name: "font_style_params",
        verdict: Verdict::Discard,
        matches: |c| {
            c.text.contains("\\f")
                && ["|b", "|i", "|c", "|p"].iter().any(|m| c.text.contains(m))
        },
    },
    Rule {
        name: "font_block",
        verdict: Verdict::Discard,
        matches: |c| c.text.starts_with("{\\f") && c.text.ends_with('}') && c.text.contains('|'),
    },
    Rule {
        name: "known_noise",
        verdict: Verdict::Discard,
        matches: |c| NOISE_PATTERNS.iter().any(|re| re.is_match(&c.text)),
    },
    Rule {
        name: "dimension_symbol",
        verdict: Verdict::Keep,
        matches: |c| c.text.contains(DIMENSION_SYMBOLS),
    },
    Rule {
        name: "dimension_format",
        verdict: Verdict::Keep,
        matches: |c| DIMENSION_PATTERNS.iter().any(|re| re.is_match(&c.text)),
    },
    Rule {
        name: "short_with_digit",
        verdict: Verdict::Keep,
        matches: |c| c.len() < 15 && DIGIT.is_match(&c.text) && !c.has_escape(),
    },
    Rule {
        name: "short_plain",
        verdict: Verdict::Keep,
        matches: |c| c.len() < 10 && !c.has_escape(),
    },
    Rule {
        name: "cjk_note",
        verdict: Verdict::Keep,
        matches: |c| {
            CJK.is_match(&c.text)
                && !c.has_escape()
                && !EXCLUDED_CJK_LABELS.contains(&c.text.as_str())
        },
    },
    Rule {
        name: "technical_term",
        verdict: Verdict::Keep,
        matches: |c| !c.has_escape() && TECHNICAL_TERMS.iter().any(|t| c.text.contains(t)),
    },
    Rule {
        name: "dimension_marker",
        verdict: Verdict::Keep,
        matches: |c| {
            c.entity.contains_key("is_dimension") || c.entity.contains_key("is_dimension_tolerance")
        },
    },
    Rule {
        name: "annotation_layer",
        verdict: Verdict::Keep,
        matches: |c| {
            let layer = match c.entity.get("layer") {
                Some(Value::String(s)) => s.to_lowercase(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string().to_lowercase(),
            };
            !c.has_escape() && ANNOTATION_LAYERS.iter().any(|name| layer.contains(name))
        },
    },
    Rule {
        name: "format_residue",
        verdict: Verdict::Discard,
        matches: |c| c.has_escape(),
    },
    Rule {
        name: "moderate_length",
        verdict: Verdict::Keep,
        matches: |c| c.len() < 50,
    },
];

/// 最初に当てはまった規則を返す
pub fn matching_rule(entity: &Entity) -> Option<&'static Rule> {
    let candidate = Candidate::new(entity);
    RULES.iter().find(|rule| (rule.matches)(&candidate))
}

/// 意味のある注記かどうか
///
/// どの規則にも当てはまらない（長いプレーンテキスト）場合は除外。
pub fn is_meaningful_annotation(entity: &Entity) -> bool {
    matching_rule(entity).is_some_and(|rule| rule.verdict == Verdict::Keep)
}
