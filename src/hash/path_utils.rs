// Path normalization utilities
// Lets manifest paths written on one platform match paths discovered on another

use std::path::{Component, Path, PathBuf};

/// Normalize a path string by handling both forward and backward slashes
/// Converts all path separators to the platform-specific separator
pub fn normalize_path_string(path_str: &str) -> String {
    if cfg!(windows) {
        path_str.replace('/', "\\")
    } else {
        path_str.replace('\\', "/")
    }
}

/// Clean a path by removing redundant components like "." and ".."
/// This provides a normalized form without requiring the path to exist
pub fn clean_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                // Only pop a normal component, never a root or a previous ".."
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                    continue;
                }
                components.push(component);
            }
            _ => components.push(component),
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Key used to match a manifest path against a discovered path
pub fn audit_key(path_str: &str) -> String {
    let normalized = normalize_path_string(path_str.trim());
    clean_path(Path::new(&normalized)).to_string_lossy().into_owned()
}
