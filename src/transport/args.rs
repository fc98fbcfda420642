//! The argument vector handed to a single `nx` process.

use std::fmt;

/// Ordered argument vector for one invocation (program name excluded).
///
/// Immutable once built: the only way to extend it is [`ArgVector::appended`],
/// which returns a new vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgVector(Vec<String>);

impl ArgVector {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// A new vector with `extra` after the existing arguments.
    pub fn appended<S: AsRef<str>>(&self, extra: &[S]) -> ArgVector {
        let mut args = self.0.clone();
        args.extend(extra.iter().map(|s| s.as_ref().to_string()));
        ArgVector(args)
    }

    /// True if `flag` appears as a whole argument.
    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|a| a == flag)
    }
}

impl From<Vec<String>> for ArgVector {
    fn from(args: Vec<String>) -> Self {
        ArgVector(args)
    }
}

impl<S: Into<String>> FromIterator<S> for ArgVector {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ArgVector(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a ArgVector {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ArgVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appended_leaves_original_untouched() {
        let base: ArgVector = ["monitor", "status"].into_iter().collect();
        let full = base.appended(&["--format", "json"]);
        assert_eq!(base.as_slice(), ["monitor", "status"]);
        assert_eq!(full.as_slice(), ["monitor", "status", "--format", "json"]);
    }

    #[test]
    fn test_display_joins_with_spaces() {
        let args: ArgVector = ["batch", "inspect", "plan", "b-1"].into_iter().collect();
        assert_eq!(args.to_string(), "batch inspect plan b-1");
        assert!(args.contains("plan"));
        assert!(!args.contains("--jobs-only"));
    }
}
