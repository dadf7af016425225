//! Group rules: `@media`, `@document`, and `@supports` containers.

use crate::css::namespace::NameSpaceMap;
use crate::css::serialize::write_string;
use crate::error::{CssomError, Result};
use crate::media::query::MediaList;
use crate::rules::{Rule, RuleId};

/// An ordered list of child rules.
///
/// The mutators here do not invalidate anything. Callers go through the
/// owning sheet's will-dirty/did-dirty bracket.
#[derive(Debug, Clone, Default)]
pub struct GroupRule {
    rules: Vec<Rule>,
}

impl GroupRule {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn rules_mut(&mut self) -> &mut Vec<Rule> {
        &mut self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Insert `rules` before `index`. Only ruleset-compatible kinds are allowed.
    pub fn insert_rules_at(&mut self, index: usize, rules: Vec<Rule>) -> Result<()> {
        if index > self.rules.len() {
            return Err(CssomError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        if rules.iter().any(|r| !r.kind().is_ruleset_compatible()) {
            return Err(CssomError::HierarchyViolation(
                "only ruleset-compatible rules may appear in a group",
            ));
        }
        self.rules.try_reserve(rules.len())?;
        self.rules.splice(index..index, rules);
        Ok(())
    }

    pub fn delete_rule_at(&mut self, index: usize) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(CssomError::IndexOutOfRange {
                index,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(index))
    }

    /// Swap the child with id `old` for `new`, returning the old rule.
    pub fn replace_rule(&mut self, old: RuleId, new: Rule) -> Result<Rule> {
        if !new.kind().is_ruleset_compatible() {
            return Err(CssomError::HierarchyViolation(
                "only ruleset-compatible rules may appear in a group",
            ));
        }
        match self.rules.iter().position(|r| r.id() == old) {
            Some(pos) => Ok(std::mem::replace(&mut self.rules[pos], new)),
            None => Err(CssomError::NotFound(format!("rule {}", old.get()))),
        }
    }

    fn write_body(&self, dest: &mut String, namespaces: Option<&NameSpaceMap>) {
        dest.push_str(" {\n");
        for rule in &self.rules {
            dest.push_str("  ");
            dest.push_str(&rule.css_text(namespaces));
            dest.push('\n');
        }
        dest.push('}');
    }
}

/// `@media <list> { ... }`
#[derive(Debug, Clone, Default)]
pub struct MediaRule {
    pub media: MediaList,
    pub group: GroupRule,
}

impl MediaRule {
    pub fn new(media: MediaList, rules: Vec<Rule>) -> Self {
        Self {
            media,
            group: GroupRule::new(rules),
        }
    }

    pub fn css_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut dest = String::from("@media ");
        dest.push_str(&self.media.media_text());
        self.group.write_body(&mut dest, namespaces);
        dest
    }
}

/// Which part of a document URL an `@document` condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentMatch {
    Url,
    UrlPrefix,
    Domain,
    Regexp,
}

impl DocumentMatch {
    pub fn function_name(self) -> &'static str {
        match self {
            DocumentMatch::Url => "url",
            DocumentMatch::UrlPrefix => "url-prefix",
            DocumentMatch::Domain => "domain",
            DocumentMatch::Regexp => "regexp",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "url" => Some(DocumentMatch::Url),
            "url-prefix" => Some(DocumentMatch::UrlPrefix),
            "domain" => Some(DocumentMatch::Domain),
            "regexp" => Some(DocumentMatch::Regexp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCondition {
    pub kind: DocumentMatch,
    pub value: String,
}

/// `@document url-prefix("...") { ... }`
#[derive(Debug, Clone, Default)]
pub struct DocumentRule {
    pub conditions: Vec<DocumentCondition>,
    pub group: GroupRule,
    /// Written with the `-moz-` prefix.
    pub prefixed: bool,
}

impl DocumentRule {
    pub fn css_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut dest = String::from(if self.prefixed {
            "@-moz-document "
        } else {
            "@document "
        });
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                dest.push_str(", ");
            }
            dest.push_str(cond.kind.function_name());
            dest.push('(');
            write_string(&mut dest, &cond.value);
            dest.push(')');
        }
        self.group.write_body(&mut dest, namespaces);
        dest
    }
}

/// `@supports <condition> { ... }`
#[derive(Debug, Clone, Default)]
pub struct SupportsRule {
    /// Normalized condition text.
    pub condition: String,
    pub group: GroupRule,
}

impl SupportsRule {
    pub fn css_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut dest = String::from("@supports ");
        dest.push_str(&self.condition);
        self.group.write_body(&mut dest, namespaces);
        dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::at_rules::{CharsetRule, ImportRule, NamespaceRule};
    use crate::rules::style_rule::StyleRule;
    use crate::rules::RuleBody;
    use crate::css::declaration::Declaration;
    use crate::css::selector::{CompoundSelector, Selector, SelectorList};

    fn style(tag: &str) -> Rule {
        let list = SelectorList::new(vec![Selector::from_compound(CompoundSelector::with_tag(tag))]);
        Rule::new(RuleBody::Style(StyleRule::new(list, Declaration::new())))
    }

    #[test]
    fn insert_and_delete() {
        let mut group = GroupRule::default();
        group.insert_rules_at(0, vec![style("a"), style("c")]).expect("insert");
        group.insert_rules_at(1, vec![style("b")]).expect("insert");
        let names: Vec<String> = group.rules().iter().map(|r| r.css_text(None)).collect();
        assert_eq!(names, vec!["a { }", "b { }", "c { }"]);
        let removed = group.delete_rule_at(0).expect("delete");
        assert_eq!(removed.css_text(None), "a { }");
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn index_bounds() {
        let mut group = GroupRule::default();
        assert_eq!(
            group.insert_rules_at(1, vec![style("a")]),
            Err(CssomError::IndexOutOfRange { index: 1, len: 0 })
        );
        assert!(matches!(
            group.delete_rule_at(0),
            Err(CssomError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn rejects_non_ruleset_kinds() {
        let mut group = GroupRule::default();
        for bad in [
            Rule::new(RuleBody::Charset(CharsetRule::new("UTF-8"))),
            Rule::new(RuleBody::Import(ImportRule::new("x.css", MediaList::new()))),
            Rule::new(RuleBody::Namespace(NamespaceRule::new(None, "ns"))),
        ] {
            assert!(matches!(
                group.insert_rules_at(0, vec![bad]),
                Err(CssomError::HierarchyViolation(_))
            ));
        }
        assert!(group.is_empty());
    }

    #[test]
    fn media_rule_text() {
        let rule = MediaRule::new(MediaList::parse("screen"), vec![style("p")]);
        assert_eq!(rule.css_text(None), "@media screen {\n  p { }\n}");
    }

    #[test]
    fn document_rule_text() {
        let rule = DocumentRule {
            conditions: vec![DocumentCondition {
                kind: DocumentMatch::UrlPrefix,
                value: "http://example.com/".into(),
            }],
            group: GroupRule::default(),
            prefixed: true,
        };
        assert_eq!(
            rule.css_text(None),
            "@-moz-document url-prefix(\"http://example.com/\") {\n}"
        );
    }
}
