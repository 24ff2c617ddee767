//! JSON 出力

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// JSON を UTF-8・インデント2で書き出す（非ASCII文字はエスケープしない）
///
/// 親ディレクトリが無ければ作成する。
pub fn write_json_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
