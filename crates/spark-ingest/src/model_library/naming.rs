//! Destination paths for downloaded model files.

use crate::model_library::types::ModelCategory;
use std::path::{Path, PathBuf};

/// Characters replaced by `_` in stored file names.
const PATH_UNSAFE_CHARS: &[char] = &['\\', '/', ' '];

/// Replace path separators and spaces with underscores.
///
/// # Examples
///
/// ```
/// use spark_ingest::model_library::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Realistic Vision.safetensors"), "Realistic_Vision.safetensors");
/// assert_eq!(sanitize_file_name("..\\x/y"), ".._x_y");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if PATH_UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Reserve the on-disk location of a queue item.
///
/// `<models_dir>/<category dir>/<first id segment>-<sanitized file name>`.
/// The id prefix keeps two items with the same file name apart.
pub fn destination_path(
    models_dir: &Path,
    item_id: &str,
    file_name: &str,
    category: ModelCategory,
) -> PathBuf {
    let prefix = item_id.split('-').next().unwrap_or(item_id);
    let mut name = sanitize_file_name(file_name);
    if name.is_empty() {
        name = "model".to_string();
    }
    models_dir
        .join(category.dir_name())
        .join(format!("{}-{}", prefix, name))
}

/// Temp path a download streams into before the final rename.
pub fn partial_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
