//! Expansion of the per-run input file pattern.
//!
//! Runs from the TDR data acquisition are split over several files (`R23_0`, `R23_1`, ...)
//! and the converter takes all of them after `-i`. We expand the pattern ourselves rather
//! than handing a string to a shell. Supported wildcards, in the file name only:
//!
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` match one character from (or not from) the class
//!
//! As in a shell, a leading `.` in a file name must be matched explicitly.
use std::path::{Path, PathBuf};

use super::error::PatternError;

/// Check if a pattern component contains any wildcard characters
pub fn has_wildcards(component: &str) -> bool {
    component.contains(['*', '?', '['])
}

/// Split a pattern into its (literal) directory and its file name pattern
///
/// The directory is None when the pattern is a bare file name. Wildcard characters are
/// not allowed in the directory, even as literal names.
pub fn split_pattern(pattern: &str) -> Result<(Option<PathBuf>, String), PatternError> {
    let path = Path::new(pattern);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PatternError::NoFileName(pattern.to_string()))?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);
    if let Some(dir) = &parent {
        if has_wildcards(&dir.to_string_lossy()) {
            return Err(PatternError::WildcardInDirectory(pattern.to_string()));
        }
    }

    let chars: Vec<char> = file_name.chars().collect();
    let mut idx = 0;
    while idx < chars.len() {
        if chars[idx] == '[' {
            match class_end(&chars[idx..]) {
                Some(len) => idx += len,
                None => return Err(PatternError::UnterminatedClass(pattern.to_string())),
            }
        } else {
            idx += 1;
        }
    }

    Ok((parent, file_name.to_string()))
}

/// Expand a pattern to the sorted list of paths that match it
///
/// A pattern without wildcards resolves to itself if the file exists. An empty list
/// means nothing matched.
pub fn expand_input_pattern(pattern: &str) -> Result<Vec<PathBuf>, PatternError> {
    let (parent, name_pattern) = split_pattern(pattern)?;

    if !has_wildcards(&name_pattern) {
        let path = PathBuf::from(pattern);
        return Ok(if path.exists() { vec![path] } else { vec![] });
    }

    let search_dir = parent.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut matches: Vec<PathBuf> = Vec::new();
    let entries = search_dir
        .read_dir()
        .map_err(|e| PatternError::BadDirectory(search_dir.clone(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PatternError::BadDirectory(search_dir.clone(), e))?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            log::debug!("Skipping non UTF-8 file name {file_name:?} in {search_dir:?}");
            continue;
        };
        if name.starts_with('.') && !name_pattern.starts_with('.') {
            continue;
        }
        if wildcard_match(&name_pattern, name) {
            matches.push(match &parent {
                Some(dir) => dir.join(name),
                None => PathBuf::from(name),
            });
        }
    }

    matches.sort();
    Ok(matches)
}

/// Match a whole file name against a wildcard pattern
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    let Some(&first) = pattern.first() else {
        return name.is_empty();
    };

    match first {
        '*' => {
            let rest = &pattern[1..];
            if rest.is_empty() {
                return true;
            }
            (0..=name.len()).any(|skip| match_from(rest, &name[skip..]))
        }
        '?' => !name.is_empty() && match_from(&pattern[1..], &name[1..]),
        '[' => {
            let Some(&ch) = name.first() else {
                return false;
            };
            match class_end(pattern) {
                Some(len) => {
                    class_matches(&pattern[1..len - 1], ch) && match_from(&pattern[len..], &name[1..])
                }
                // Unterminated, treat as literal
                None => ch == '[' && match_from(&pattern[1..], &name[1..]),
            }
        }
        c => name.first() == Some(&c) && match_from(&pattern[1..], &name[1..]),
    }
}

/// Length of the class starting at pattern[0] == '[', including both brackets
fn class_end(pattern: &[char]) -> Option<usize> {
    let mut idx = 1;
    if matches!(pattern.get(idx), Some('!') | Some('^')) {
        idx += 1;
    }
    // ] as first member is literal
    if pattern.get(idx) == Some(&']') {
        idx += 1;
    }
    while idx < pattern.len() {
        if pattern[idx] == ']' {
            return Some(idx + 1);
        }
        idx += 1;
    }
    None
}

/// Check a character against the inside of a class (brackets stripped)
fn class_matches(class: &[char], ch: char) -> bool {
    let (negate, members) = match class.first() {
        Some('!') | Some('^') => (true, &class[1..]),
        _ => (false, class),
    };

    let mut matched = false;
    let mut idx = 0;
    while idx < members.len() {
        if idx + 2 < members.len() && members[idx + 1] == '-' {
            if members[idx] <= ch && ch <= members[idx + 2] {
                matched = true;
            }
            idx += 3;
        } else {
            if members[idx] == ch {
                matched = true;
            }
            idx += 1;
        }
    }

    matched != negate
}
