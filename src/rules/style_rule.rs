//! Style rules and their `!important` companions.

use std::rc::Rc;

use crate::css::declaration::{Declaration, PropertyDeclaration};
use crate::css::namespace::NameSpaceMap;
use crate::css::selector::SelectorList;

/// A selector list with a declaration block.
///
/// The first call to [`rule_matched`](Self::rule_matched) seals the
/// declaration. If it has `!important` entries an [`ImportantRule`] is
/// created sharing the same block.
#[derive(Debug)]
pub struct StyleRule {
    selectors: SelectorList,
    declaration: Rc<Declaration>,
    important: Option<ImportantRule>,
    was_matched: bool,
}

impl StyleRule {
    pub fn new(selectors: SelectorList, declaration: Declaration) -> Self {
        Self {
            selectors,
            declaration: Rc::new(declaration),
            important: None,
            was_matched: false,
        }
    }

    pub fn selectors(&self) -> &SelectorList {
        &self.selectors
    }

    pub(crate) fn set_selectors(&mut self, selectors: SelectorList) {
        self.selectors = selectors;
    }

    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// Editable access, or `None` once the rule has been matched.
    pub fn declaration_mut(&mut self) -> Option<&mut Declaration> {
        if self.declaration.is_immutable() {
            return None;
        }
        Some(Rc::make_mut(&mut self.declaration))
    }

    /// Note that the rule took part in a match. Returns `true` on the first call.
    pub fn rule_matched(&mut self) -> bool {
        if self.was_matched {
            return false;
        }
        self.was_matched = true;
        Rc::make_mut(&mut self.declaration).seal();
        if self.declaration.has_important() {
            self.important = Some(ImportantRule {
                declaration: Rc::clone(&self.declaration),
            });
        }
        true
    }

    pub fn was_matched(&self) -> bool {
        self.was_matched
    }

    pub fn important_rule(&self) -> Option<&ImportantRule> {
        self.important.as_ref()
    }

    /// A fresh, unmatched copy carrying `declaration` instead of ours.
    pub fn with_declaration(&self, declaration: Declaration) -> StyleRule {
        StyleRule::new(self.selectors.clone(), declaration)
    }

    pub fn selector_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        self.selectors.to_css(namespaces)
    }

    pub fn css_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut text = self.selectors.to_css(namespaces);
        text.push_str(" { ");
        let decl = self.declaration.to_css();
        if !decl.is_empty() {
            text.push_str(&decl);
            text.push(' ');
        }
        text.push('}');
        text
    }
}

impl Clone for StyleRule {
    /// Deep copy that starts out unmatched and editable.
    fn clone(&self) -> Self {
        StyleRule::new(self.selectors.clone(), self.declaration.clone_mutable())
    }
}

/// The `!important` view of a matched style rule's declaration.
#[derive(Debug, Clone)]
pub struct ImportantRule {
    declaration: Rc<Declaration>,
}

impl ImportantRule {
    pub fn declarations(&self) -> impl Iterator<Item = &PropertyDeclaration> {
        self.declaration.important_subset()
    }

    pub fn len(&self) -> usize {
        self.declarations().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this shares its block with `rule`.
    pub fn shares_declaration_with(&self, rule: &StyleRule) -> bool {
        Rc::ptr_eq(&self.declaration, &rule.declaration)
    }
}
