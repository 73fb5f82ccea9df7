//! Path normalization helpers
//!
//! Every adapter works with normalized, root-relative paths: forward slashes
//! only, no empty, `.` or `..` segments, and no leading or trailing slash.
//! The empty string is the root.

use crate::error::{FsError, Result};

/// Normalize a path into its root-relative form.
///
/// Backslashes are treated as separators and control characters are dropped.
/// A `..` segment that would climb above the root is rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let cleaned: String = path
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();

    let mut parts: Vec<&str> = Vec::new();
    for segment in cleaned.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(FsError::InvalidPath(format!(
                        "Path is outside of the defined root, path: [{}]",
                        path
                    )));
                }
            }
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}

/// Parent of a normalized path; the root's parent is the root.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of a normalized path.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Lower-cased extension of the last path segment, empty if there is none.
pub fn extension(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Join a directory and an entry name into a normalized path.
pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => dir.to_string(),
        (false, false) => format!("{}/{}", dir, name),
    }
}

/// Whether `path` lies strictly below the directory `dir`.
pub fn is_descendant(path: &str, dir: &str) -> bool {
    if dir.is_empty() {
        return !path.is_empty();
    }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Relative path leading from the directory `from` to `path`.
///
/// Both inputs are normalized first. A target inside `from` is prefixed with
/// `./`, a diverging target climbs with one `..` per remaining segment of
/// `from`, and identical inputs yield `.`.
pub fn relative_path(path: &str, from: &str) -> Result<String> {
    let path = normalize_path(path)?;
    let from = normalize_path(from)?;

    let target: Vec<&str> = if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    };
    // `from` is a directory: the trailing empty segment marks its inside
    let mut base: Vec<&str> = if from.is_empty() {
        Vec::new()
    } else {
        from.split('/').collect()
    };
    base.push("");

    let mut relative: Vec<String> = target.iter().map(|s| s.to_string()).collect();

    for (depth, dir) in base.iter().enumerate() {
        if target.get(depth) == Some(dir) {
            relative.remove(0);
            continue;
        }

        let remaining = base.len() - depth;
        if remaining > 1 {
            let mut climbed = vec!["..".to_string(); remaining - 1];
            climbed.append(&mut relative);
            relative = climbed;
            break;
        }

        match relative.first_mut() {
            Some(first) => *first = format!("./{}", first),
            None => relative.push(".".to_string()),
        }
    }

    Ok(relative.join("/"))
}
