//! Entry name handling
//!
//! Names are stored with whatever separators the format uses, except for
//! names reported by the UnRAR engine, which come back with `\` on Windows
//! and are converted to `/` before they are stored.
//!
//! Lookups are case-insensitive but otherwise exact: no trimming and no
//! separator folding, so `Dir/File.TXT` matches `dir/file.txt` but not
//! `dir\file.txt`.

/// Convert Windows path separators to forward slashes
/// `Docs\Readme.txt` -> `Docs/Readme.txt`
pub fn to_forward_slashes(name: &str) -> String {
    name.replace('\\', "/")
}

/// Case-insensitive exact comparison of two entry names.
///
/// Uses full Unicode lowercasing so accented names compare the way users
/// expect (`ÄRGER.txt` == `ärger.TXT`).
pub fn names_equal(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Find the first name in `names` matching `target` case-insensitively.
/// Returns its position.
pub fn position_of<'a, I>(names: I, target: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().position(|name| names_equal(name, target))
}
