use crate::naming::names_match;
use crate::RemoteIndex;

/// Walks `name_path` down the remote hierarchy, one level per segment, and returns the
/// location of the last matched term when every segment matched.
pub fn find_existing(name_path: &[String], index: &RemoteIndex) -> Option<String> {
    if index.is_empty() || name_path.is_empty() {
        return None;
    }

    let mut parent: Option<&str> = None;
    for name in name_path {
        let level = index.children(parent);
        let matched = level
            .iter()
            .find(|id| index.name(id).is_some_and(|n| names_match(n, name)))?;
        parent = Some(matched.as_str());
    }

    parent.map(str::to_string)
}
