use sakuin_types::{Document, Value};

use crate::error::{MergeError, MergeResult};

/// Merge `src` into `dst`, field by field.
///
/// - A key missing from `dst` takes the source value.
/// - A key holding a nested document on both sides is merged recursively.
/// - A key holding a plain value on both sides keeps the destination value.
/// - A key holding a nested document on exactly one side is a
///   [`MergeError::TypeConflict`].
///
/// On error `dst` may already contain part of `src`. Callers that need the
/// destination untouched on failure must merge into a scratch copy.
pub fn merge(dst: &mut Document, src: Document) -> MergeResult<()> {
    let mut path = Vec::new();
    merge_at(dst, src, &mut path)
}

fn merge_at(dst: &mut Document, src: Document, path: &mut Vec<String>) -> MergeResult<()> {
    for (key, src_value) in src {
        let Some(dst_value) = dst.get_mut(&key) else {
            dst.insert(key, src_value);
            continue;
        };

        match (dst_value, src_value) {
            (Value::Document(dst_doc), Value::Document(src_doc)) => {
                path.push(key);
                merge_at(dst_doc, src_doc, path)?;
                path.pop();
            }
            (dst_value, src_value) if dst_value.is_document() != src_value.is_document() => {
                return Err(MergeError::TypeConflict {
                    field: field_path(path, &key),
                    dst_kind: dst_value.kind(),
                    src_kind: src_value.kind(),
                });
            }
            // Both plain values: destination wins.
            _ => {}
        }
    }
    Ok(())
}

fn field_path(parents: &[String], key: &str) -> String {
    let mut path = parents.join(".");
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(key);
    path
}
