//! Read-only, live views over a rule sequence, as `cssRules` exposes them.

use crate::css::namespace::NameSpaceMap;
use crate::error::{CssomError, Result};
use crate::rules::{find_rule, Rule, RuleId};
use crate::sheet::{Cssom, SheetId};

/// A borrowed rule list. Indices are positions in the underlying sequence.
#[derive(Debug, Clone, Copy)]
pub struct RuleListView<'a> {
    rules: &'a [Rule],
    namespaces: Option<&'a NameSpaceMap>,
}

impl<'a> RuleListView<'a> {
    pub fn new(rules: &'a [Rule], namespaces: Option<&'a NameSpaceMap>) -> Self {
        Self { rules, namespaces }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `None` past the end, like `CSSRuleList.item`.
    pub fn item(&self, index: usize) -> Option<&'a Rule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Rule> {
        self.rules.iter()
    }

    pub fn css_text(&self, index: usize) -> Option<String> {
        self.item(index).map(|rule| rule.css_text(self.namespaces))
    }
}

impl<'a> IntoIterator for RuleListView<'a> {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl Cssom {
    /// The child rules of a group rule in `sheet`.
    pub fn group_rules(&self, sheet: SheetId, rule: RuleId) -> Result<RuleListView<'_>> {
        let inner = self.inner_of(sheet)?;
        let group = find_rule(&inner.rules, rule)
            .and_then(Rule::as_group)
            .ok_or(CssomError::WrongSheet)?;
        Ok(RuleListView::new(group.rules(), inner.namespaces.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Caller;

    fn sheet_with(text: &str) -> (Cssom, SheetId) {
        let mut cssom = Cssom::new();
        let sheet = cssom.create_sheet();
        cssom.load_text(sheet, text).expect("load");
        cssom.set_complete(sheet).expect("complete");
        (cssom, sheet)
    }

    #[test]
    fn view_reads_through_to_the_sheet() {
        let (mut cssom, sheet) = sheet_with("a {} @media print { b {} c {} }");
        let list = cssom.css_rules(sheet, &Caller::chrome()).expect("rules");
        assert_eq!(list.len(), 2);
        assert_eq!(list.css_text(0).as_deref(), Some("a { }"));
        assert!(list.item(2).is_none());
        let media = list.item(1).expect("media").id();

        let nested = cssom.group_rules(sheet, media).expect("group");
        let texts: Vec<_> = nested.into_iter().map(|r| r.css_text(None)).collect();
        assert_eq!(texts, vec!["b { }", "c { }"]);
    }

    #[test]
    fn group_rules_rejects_non_groups() {
        let (cssom, sheet) = sheet_with("a {}");
        let id = cssom.style_rule_at(sheet, 0).expect("rule").id();
        assert_eq!(cssom.group_rules(sheet, id).err(), Some(CssomError::WrongSheet));
    }

    #[test]
    fn css_rules_requires_a_complete_sheet() {
        let mut cssom = Cssom::new();
        let sheet = cssom.create_sheet();
        assert!(matches!(
            cssom.css_rules(sheet, &Caller::chrome()),
            Err(CssomError::InvalidState(_))
        ));
    }
}
