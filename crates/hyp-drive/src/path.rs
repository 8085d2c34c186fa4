//! POSIX-style path helpers for drive and local paths.
//!
//! Drive paths are always `/`-separated and absolute. These helpers never
//! touch the host filesystem.

/// Collapse `.`, `..` and repeated separators. The result is absolute.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Resolve `rel` against the directory `base`. Absolute `rel` wins.
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{rel}"))
    }
}

/// Parent directory of `path`; the root is its own parent.
pub fn dirname(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// Final component of `path`.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

/// Lowercased extension of the final component, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// `path` itself followed by each ancestor directory up to `/`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec![normalize(path)];
    while let Some(last) = out.last() {
        if last == "/" {
            break;
        }
        let parent = dirname(last);
        out.push(parent);
    }
    out
}
