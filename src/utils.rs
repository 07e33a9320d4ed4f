//! Internal helpers shared across modules.

/// Marker used for the default (unnamed) package in package mappings.
pub(crate) const DEFAULT_PACKAGE: &str = ".";

/// Converts a 1-based index into a lowercase bijective base-26 name.
///
/// For example: 1 -> "a", 26 -> "z", 27 -> "aa", 28 -> "ab".
pub(crate) fn to_base26(mut n: usize) -> String {
    let mut name = String::new();
    while n > 0 {
        n -= 1;
        name.insert(0, char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    name
}

/// Normalizes a package prefix so it ends in exactly one `/`.
///
/// The default package marker `.` is returned unchanged, and so is its
/// compact spelling `./`.
pub(crate) fn normalize_package(package: &str) -> String {
    let trimmed = package.trim_end_matches('/');
    if trimmed == DEFAULT_PACKAGE {
        return DEFAULT_PACKAGE.to_owned();
    }
    format!("{trimmed}/")
}

/// Whether `class` lives under the package prefix `package`.
pub(crate) fn matches_package(package: &str, class: &str) -> bool {
    if package == DEFAULT_PACKAGE {
        return !class.contains('/');
    }
    class.starts_with(package)
}

/// Moves `class` from package prefix `old` to package prefix `new`.
pub(crate) fn move_package(old: &str, new: &str, class: &str) -> String {
    let simple = if old == DEFAULT_PACKAGE {
        class
    } else {
        &class[old.len()..]
    };
    if new == DEFAULT_PACKAGE {
        simple.to_owned()
    } else {
        format!("{new}{simple}")
    }
}

/// Strips everything from the first `#` and trailing whitespace.
pub(crate) fn strip_comment(line: &str) -> &str {
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    line.trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base26() {
        let names: Vec<_> = (1..=28).map(to_base26).collect();
        assert_eq!(names[0], "a");
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "aa");
        assert_eq!(names[27], "ab");
        assert_eq!(to_base26(702), "zz");
        assert_eq!(to_base26(703), "aaa");
        assert_eq!(to_base26(0), "");
    }

    #[test]
    fn packages() {
        assert_eq!(normalize_package("com/foo"), "com/foo/");
        assert_eq!(normalize_package("com/foo/"), "com/foo/");
        assert_eq!(normalize_package("com/foo//"), "com/foo/");
        assert_eq!(normalize_package("."), ".");
        assert_eq!(normalize_package("./"), ".");

        assert!(matches_package(".", "Foo"));
        assert!(!matches_package(".", "a/Foo"));
        assert!(matches_package("com/foo/", "com/foo/Baz"));

        assert_eq!(move_package("com/foo/", "com/bar/", "com/foo/Baz"), "com/bar/Baz");
        assert_eq!(move_package(".", "net/", "Baz"), "net/Baz");
        assert_eq!(move_package("com/foo/", ".", "com/foo/Baz"), "Baz");
    }

    #[test]
    fn comments() {
        assert_eq!(strip_comment("CL: a b # note"), "CL: a b");
        assert_eq!(strip_comment("# only a comment"), "");
        assert_eq!(strip_comment("\ta b c\r"), "\ta b c");
    }
}
