//! Namespace prefix map built from `@namespace` rules.

/// The namespace a selector or attribute selector is constrained to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    /// Matches elements in any namespace (`*|`), or no constraint at all.
    #[default]
    Any,
    /// Matches only elements with no namespace (`|`).
    None,
    /// Matches elements in the namespace with this URL.
    Url(String),
}

/// Maps `@namespace` prefixes to namespace URLs.
///
/// The `None` prefix is the default namespace. Without an explicit default the
/// map reports [`Namespace::Any`] for it. Later declarations of the same
/// prefix replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSpaceMap {
    entries: Vec<(Option<String>, String)>,
}

impl NameSpaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prefix` (or the default namespace when `None`) for `url`.
    pub fn add_prefix(&mut self, prefix: Option<&str>, url: &str) {
        let prefix = prefix.map(|p| p.to_string());
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            entry.1 = url.to_string();
        } else {
            self.entries.push((prefix, url.to_string()));
        }
    }

    /// Resolve a prefix. `None` asks for the default namespace.
    ///
    /// Returns `None` for an undeclared explicit prefix.
    pub fn find_namespace(&self, prefix: Option<&str>) -> Option<Namespace> {
        match self.entries.iter().find(|(p, _)| p.as_deref() == prefix) {
            Some((_, url)) if url.is_empty() => Some(Namespace::None),
            Some((_, url)) => Some(Namespace::Url(url.clone())),
            None if prefix.is_none() => Some(Namespace::Any),
            None => None,
        }
    }

    /// The namespace unprefixed type selectors resolve to.
    pub fn default_namespace(&self) -> Namespace {
        self.find_namespace(None).unwrap_or(Namespace::Any)
    }

    /// The most recently declared explicit prefix bound to `url`.
    pub fn find_prefix(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(p, u)| p.is_some() && u == url)
            .and_then(|(p, _)| p.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_wildcard_until_declared() {
        let mut map = NameSpaceMap::new();
        assert_eq!(map.default_namespace(), Namespace::Any);
        map.add_prefix(None, "http://www.w3.org/1999/xhtml");
        assert_eq!(
            map.default_namespace(),
            Namespace::Url("http://www.w3.org/1999/xhtml".into())
        );
    }

    #[test]
    fn explicit_prefix_lookup() {
        let mut map = NameSpaceMap::new();
        map.add_prefix(Some("svg"), "http://www.w3.org/2000/svg");
        assert_eq!(
            map.find_namespace(Some("svg")),
            Some(Namespace::Url("http://www.w3.org/2000/svg".into()))
        );
        assert_eq!(map.find_namespace(Some("math")), None);
        assert_eq!(map.find_prefix("http://www.w3.org/2000/svg"), Some("svg"));
    }

    #[test]
    fn redeclaring_replaces() {
        let mut map = NameSpaceMap::new();
        map.add_prefix(Some("a"), "one");
        map.add_prefix(Some("a"), "two");
        assert_eq!(map.len(), 1);
        assert_eq!(map.find_namespace(Some("a")), Some(Namespace::Url("two".into())));
    }

    #[test]
    fn empty_url_means_no_namespace() {
        let mut map = NameSpaceMap::new();
        map.add_prefix(Some("n"), "");
        assert_eq!(map.find_namespace(Some("n")), Some(Namespace::None));
    }
}
