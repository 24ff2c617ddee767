//! 注記テキストの解析モジュール - 判定・整形・材料・公差

pub mod classify;
pub mod material;
pub mod normalize;
pub mod tolerance;

pub use classify::{is_meaningful_annotation, Verdict};
pub use material::{parse_material_info, MaterialInfo};
pub use normalize::{normalize, Normalizer, DEFAULT_TOLERANCE};
pub use tolerance::{
    spec_limits, thickness_tolerance, SpecLimits, ThicknessMap, ThicknessTolerance,
};
