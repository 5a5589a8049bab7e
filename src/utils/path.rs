//! Helpers for slash-separated node paths.

use crate::constants::PATH_SEPARATOR;

/// Absolute, no empty segments, no trailing separator (except `/` itself).
pub fn is_valid_path(path: &str) -> bool {
    if path == PATH_SEPARATOR {
        return true;
    }
    path.starts_with(PATH_SEPARATOR) && path[1..].split(PATH_SEPARATOR).all(|segment| !segment.is_empty())
}

/// Resolves `key` against `root`.
///
/// Keys already inside the root namespace are returned as they are; anything
/// else is treated as relative to the root.
pub fn real_path(
    root: &str,
    key: &str,
) -> String {
    if is_under(key, root) {
        return key.to_string();
    }
    join(root, key.trim_start_matches(PATH_SEPARATOR))
}

/// `true` if `path` is `root` or one of its descendants
pub fn is_under(
    path: &str,
    root: &str,
) -> bool {
    if root == PATH_SEPARATOR {
        return path.starts_with(PATH_SEPARATOR);
    }
    path == root || (path.starts_with(root) && path[root.len()..].starts_with(PATH_SEPARATOR))
}

pub fn join(
    parent: &str,
    child: &str,
) -> String {
    if parent == PATH_SEPARATOR {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

/// Parent of `path`; `None` for `/`.
pub fn parent(path: &str) -> Option<&str> {
    if path == PATH_SEPARATOR {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(PATH_SEPARATOR),
        Some(i) => Some(&path[..i]),
        None => None,
    }
}

/// Last segment of `path`
pub fn node_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Proper ancestors of `path`, top-down, excluding `/`.
///
/// `/a/b/c` yields `["/a", "/a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == PATH_SEPARATOR {
            break;
        }
        result.push(p.to_string());
        current = parent(p);
    }
    result.reverse();
    result
}
