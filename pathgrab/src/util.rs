use std::cmp::Ordering;

/// Compare two strings in natural order: digit runs compare by numeric value,
/// everything else case-insensitively. Ties fall back to a plain byte compare
/// so that "01" and "1" stay distinct.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
                    (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => cmp_text(x, y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Sort a vector of strings in natural order.
pub fn natural_sort(items: &mut [String]) {
    items.sort_by(|a, b| natural_cmp(a, b));
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    // Compare without parsing so arbitrarily long runs never overflow
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Chunks { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(if digits {
            Chunk::Digits(head)
        } else {
            Chunk::Text(head)
        })
    }
}

/// Normalise a path string to forward slashes without a trailing separator.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// The directory part of a `/`-separated path ("" for a bare file name).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

/// The file name part of a `/`-separated path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Strip `root` from the front of `path`, returning the remainder without a
/// leading separator. Paths outside the root are returned unchanged.
pub fn relative_to<'a>(path: &'a str, root: &str) -> &'a str {
    let root = root.trim_end_matches('/');
    if root.is_empty() || root == "." {
        return path.strip_prefix("./").unwrap_or(path);
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.is_empty() => rest,
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}

/// Join a `/`-separated relative path onto a root.
pub fn join_path(root: &str, rel: &str) -> String {
    if root.is_empty() || root == "." {
        return rel.to_string();
    }
    if rel.is_empty() {
        return root.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), rel.trim_start_matches('/'))
}

/// Split a path into the stem (including directories) and every dotted
/// extension of the file name: "a/b.nii.gz" -> ("a/b", ["nii", "gz"]).
pub fn split_extensions(path: &str) -> (String, Vec<String>) {
    let dir = parent_dir(path);
    let name = file_name(path);
    let mut parts = name.split('.');
    let base = parts.next().unwrap_or_default();
    let exts = parts.map(str::to_string).collect();
    let stem = if dir.is_empty() {
        base.to_string()
    } else if dir == "/" {
        format!("/{base}")
    } else {
        format!("{dir}/{base}")
    };
    (stem, exts)
}

/// Whether `dir` is `ancestor` itself or lies below it.
pub fn is_within(dir: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() || dir == ancestor {
        return true;
    }
    let ancestor = ancestor.trim_end_matches('/');
    dir.strip_prefix(ancestor)
        .map(|rest| rest.starts_with('/') || ancestor.is_empty())
        .unwrap_or(false)
}

/// Number of directory levels separating two directories through their
/// deepest common ancestor.
pub fn tree_distance(a: &str, b: &str) -> usize {
    let left: Vec<&str> = a.split('/').filter(|s| !s.is_empty()).collect();
    let right: Vec<&str> = b.split('/').filter(|s| !s.is_empty()).collect();
    let common = left
        .iter()
        .zip(right.iter())
        .take_while(|(x, y)| x == y)
        .count();
    (left.len() - common) + (right.len() - common)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        let mut items: Vec<String> = ["sub-10", "sub-2", "Sub-1", "sub-02"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        natural_sort(&mut items);
        assert_eq!(items, vec!["Sub-1", "sub-02", "sub-2", "sub-10"]);
    }

    #[test]
    fn test_natural_cmp_keeps_leading_zero_distinct() {
        assert_ne!(natural_cmp("01", "1"), Ordering::Equal);
        assert_eq!(natural_cmp("run-9", "run-10"), Ordering::Less);
    }

    #[test]
    fn test_long_digit_runs() {
        assert_eq!(
            natural_cmp("123456789012345678901234567890", "99"),
            Ordering::Greater
        );
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(normalize_path("a\\b\\c/"), "a/b/c");
        assert_eq!(parent_dir("a/b/c.txt"), "a/b");
        assert_eq!(parent_dir("c.txt"), "");
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(relative_to("/data/x/sub-01/f.nii", "/data/x"), "sub-01/f.nii");
        assert_eq!(relative_to("/elsewhere/f.nii", "/data/x"), "/elsewhere/f.nii");
        assert_eq!(join_path("/data", "sub-01"), "/data/sub-01");
        assert_eq!(join_path(".", "sub-01"), "sub-01");
    }

    #[test]
    fn test_split_extensions() {
        let (stem, exts) = split_extensions("rest/sub-3/run-2.nii.gz");
        assert_eq!(stem, "rest/sub-3/run-2");
        assert_eq!(exts, vec!["nii", "gz"]);
    }

    #[test]
    fn test_tree_distance() {
        assert_eq!(tree_distance("a/b/c", "a/b/c"), 0);
        assert_eq!(tree_distance("a/b/c", "a/b"), 1);
        assert_eq!(tree_distance("a/b/c", "a/d"), 3);
        assert!(is_within("a/b/c", "a/b"));
        assert!(!is_within("a/bc", "a/b"));
        assert!(is_within("a/b", ""));
    }
}
