//! Path splitting and validation helpers.
//!
//! Paths are `/`-separated and absolute. Repeated separators are
//! tolerated ("/a//b" names the same node as "/a/b").

/// Iterate over the non-empty components of a path.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Parent of an absolute path; "/" is its own parent.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &trimmed[..idx],
    }
}

/// Final component of a path; empty for "/".
pub fn filename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// True if `candidate` is a direct child path of `parent`.
pub fn is_direct_child(parent: &str, candidate: &str) -> bool {
    if candidate == parent {
        return false;
    }
    let rest = match parent {
        "/" => match candidate.strip_prefix('/') {
            Some(r) => r,
            None => return false,
        },
        _ => match candidate.strip_prefix(parent) {
            Some(r) => match r.strip_prefix('/') {
                Some(r) => r,
                None => return false,
            },
            None => return false,
        },
    };
    !rest.is_empty() && !rest.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn components_skip_empty_segments() {
        let parts: Vec<&str> = components("/usr//bin/ls/").collect();
        assert_eq!(parts, ["usr", "bin", "ls"]);
        assert_eq!(components("/").count(), 0);
    }

    #[test]
    fn parent_and_filename() {
        assert_eq!(parent_path("/usr/bin/ls"), "/usr/bin");
        assert_eq!(parent_path("/usr"), "/");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(filename("/usr/bin/ls"), "ls");
        assert_eq!(filename("/usr/"), "usr");
        assert_eq!(filename("/"), "");
    }

    #[test]
    fn direct_child_detection() {
        assert!(is_direct_child("/", "/usr"));
        assert!(is_direct_child("/usr", "/usr/bin"));
        assert!(!is_direct_child("/", "/usr/bin"));
        assert!(!is_direct_child("/usr", "/usr"));
        assert!(!is_direct_child("/usr", "/usrx"));
        assert!(!is_direct_child("/usr", "/usr/bin/ls"));
    }
}
