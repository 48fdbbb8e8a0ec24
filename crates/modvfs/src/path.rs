//! Logical path syntax.
//!
//! - `alias|relative/path` addresses an explicit namespace.
//! - Mount targets may carry a leading `~` (optional mount) and then a
//!   leading `$` (mod reference).
//! - Backing store paths drop a leading `./` and a single trailing `/`.

/// Separates an explicit alias from the path inside it.
pub const NAMESPACE_SEPARATOR: char = '|';

/// Marks a mount target whose failures are swallowed.
pub const OPTIONAL_MARKER: char = '~';

/// Marks a mount target as a mod id rather than a literal path.
pub const MOD_MARKER: char = '$';

/// Split `alias|relative` into its parts.
///
/// Returns `None` when the separator is absent or at position zero (an empty
/// alias does not name a namespace).
pub fn split_namespace(path: &str) -> Option<(&str, &str)> {
    match path.find(NAMESPACE_SEPARATOR) {
        Some(split) if split > 0 => Some((&path[..split], &path[split + 1..])),
        _ => None,
    }
}

/// Returns true if the path selects an explicit namespace.
pub fn is_namespaced(path: &str) -> bool {
    split_namespace(path).is_some()
}

/// Parsed form of a mount target string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec<'a> {
    /// Failures while resolving this target are swallowed.
    pub optional: bool,
    /// The target names an installed mod rather than a path.
    pub is_mod: bool,
    /// Mod id or literal path, markers stripped.
    pub name: &'a str,
}

/// Strip the `~` and `$` markers from a mount target.
pub fn parse_target(target: &str) -> TargetSpec<'_> {
    let (optional, rest) = match target.strip_prefix(OPTIONAL_MARKER) {
        Some(rest) => (true, rest),
        None => (false, target),
    };
    let (is_mod, name) = match rest.strip_prefix(MOD_MARKER) {
        Some(name) => (true, name),
        None => (false, rest),
    };
    TargetSpec {
        optional,
        is_mod,
        name,
    }
}

/// Normalize a backing store path: drop a leading `./` and one trailing `/`.
pub fn normalize(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Collapse `.` and `..` segments and empty segments.
///
/// Returns `None` if `..` climbs above the start of the path.
pub fn resolve(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// Join `relative` under `root`, refusing results outside `root`.
///
/// An empty `root` is the top of the store.
pub fn join_under(root: &str, relative: &str) -> Option<String> {
    let root = resolve(root)?;
    let combined = if root.is_empty() {
        relative.to_string()
    } else {
        format!("{root}/{relative}")
    };
    let resolved = resolve(&combined)?;

    let rooted = root.is_empty()
        || resolved == root
        || resolved
            .strip_prefix(root.as_str())
            .is_some_and(|rest| rest.starts_with('/'));
    rooted.then_some(resolved)
}

/// Parent directory of a `/`-separated path, or `None` at the top level.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}
