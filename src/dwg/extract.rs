//! 解析ツリーからのエンティティ抽出
//!
//! 解析ツリーは dwgread の JSON、DXF 変換結果、または合成データのいずれか。
//! 形が決まっていないので `serde_json::Value` をそのまま辿る。

use serde_json::{Map, Value};

/// エンティティ種別を表すフィールド（dwgread 形式）
pub const ENTITY_FIELD: &str = "entity";
/// 汎用の種別フィールド（再帰探索で使用）
pub const TYPE_FIELD: &str = "type";
/// 注記エンティティの種別
pub const ANNOTATION_KIND: &str = "MTEXT";
/// 親要素への参照
pub const OWNER_FIELD: &str = "ownerhandle";
/// テキスト本体
pub const TEXT_FIELD: &str = "text";
/// dwgread 出力のトップレベルのオブジェクト一覧
pub const OBJECTS_KEY: &str = "OBJECTS";

/// 1つのエンティティ（解析ツリー内のマッピング）
pub type Entity = Map<String, Value>;

/// ツリーを深さ優先で辿り、見つけたマッピングごとに `visit` を呼ぶ
///
/// マッピング自身を先に訪問し、その後キー順・インデックス順に子へ進む。
/// デシリアライズ済みの木構造なので循環は起こらない。
pub fn walk_objects<'a, F>(node: &'a Value, visit: &mut F)
where
    F: FnMut(&'a Entity),
{
    match node {
        Value::Object(map) => {
            visit(map);
            for value in map.values() {
                walk_objects(value, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_objects(item, visit);
            }
        }
        _ => {}
    }
}

/// `type` フィールドを持つマッピングをすべて集める
pub fn collect_all_entities<'a>(tree: &'a Value) -> Vec<&'a Entity> {
    let mut entities = Vec::new();
    walk_objects(tree, &mut |map: &'a Entity| {
        if map.contains_key(TYPE_FIELD) {
            entities.push(map);
        }
    });
    entities
}

/// トップレベルの `OBJECTS` 配列から MTEXT を取り出す
///
/// `OBJECTS` が無い、または配列でない場合は `None`。
pub fn direct_annotation_entities(tree: &Value) -> Option<Vec<&Entity>> {
    let objects = tree.get(OBJECTS_KEY)?.as_array()?;
    Some(
        objects
            .iter()
            .filter_map(Value::as_object)
            .filter(|obj| is_annotation(obj))
            .collect(),
    )
}

/// 再帰探索で見つけたエンティティから MTEXT を取り出す
pub fn recursive_annotation_entities(tree: &Value) -> Vec<&Entity> {
    collect_all_entities(tree)
        .into_iter()
        .filter(|entity| is_annotation(entity))
        .collect()
}

/// MTEXT エンティティかどうか
pub fn is_annotation(entity: &Entity) -> bool {
    entity.get(ENTITY_FIELD).and_then(Value::as_str) == Some(ANNOTATION_KIND)
}

/// エンティティのテキストを文字列として取得
///
/// 空とみなす値（null、false、0、空文字列、空の配列・マッピング）は `None`。
/// それ以外の文字列でない値（数値など）は JSON 表現を文字列化する。
pub fn entity_text(entity: &Entity) -> Option<String> {
    let value = entity.get(TEXT_FIELD)?;
    if is_empty_value(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
