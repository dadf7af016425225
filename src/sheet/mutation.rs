//! CSSOM mutations: rule insertion and deletion, group edits, whole-sheet
//! re-parse, media text edits and import completion.
//!
//! Every externally visible mutation runs inside an [`UpdateBatch`] and a
//! `will_dirty`/`did_dirty` bracket, so shared inners are copied before they
//! are touched and rule processors drop stale cascades afterwards.

use tracing::{debug, trace};

use crate::error::{CssomError, Result};
use crate::media::query::MediaList;
use crate::rules::{find_rule, find_rule_mut, Rule, RuleBody, RuleId, RuleKind};
use crate::sheet::observer::{LoadError, UpdateBatch};
use crate::sheet::security::Caller;
use crate::sheet::{Cssom, SheetId};

/// Which media list a media edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTarget {
    /// The sheet's own media list.
    Sheet,
    /// The list of an `@media` or `@import` rule in the sheet.
    Rule(RuleId),
}

/// Check that `new` may be spliced into `existing` at `index`.
///
/// Only the first and last new rules are checked, against the rules right
/// before and after the insertion point.
pub(crate) fn check_insert_order(existing: &[Rule], index: usize, new: &[Rule]) -> Result<()> {
    let (Some(first), Some(last)) = (new.first(), new.last()) else {
        return Ok(());
    };
    let first = first.kind();
    let last = last.kind();

    if let Some(next) = existing.get(index) {
        match next.kind() {
            RuleKind::Charset => {
                return Err(CssomError::HierarchyViolation(
                    "cannot insert before @charset",
                ));
            }
            RuleKind::Import if !last.may_precede_import() => {
                return Err(CssomError::HierarchyViolation(
                    "only @charset and @import may precede @import",
                ));
            }
            RuleKind::Namespace if !last.may_precede_namespace() => {
                return Err(CssomError::HierarchyViolation(
                    "only @charset, @import and @namespace may precede @namespace",
                ));
            }
            _ => {}
        }
    }

    if first == RuleKind::Charset && index != 0 {
        return Err(CssomError::HierarchyViolation("@charset must be the first rule"));
    }

    if let Some(prev) = index.checked_sub(1).and_then(|i| existing.get(i)) {
        let prev = prev.kind();
        if first == RuleKind::Import && !prev.may_precede_import() {
            return Err(CssomError::HierarchyViolation(
                "@import must follow only @charset and @import",
            ));
        }
        if first == RuleKind::Namespace && !prev.may_precede_namespace() {
            return Err(CssomError::HierarchyViolation(
                "@namespace must follow only @charset, @import and @namespace",
            ));
        }
    }
    Ok(())
}

impl Cssom {
    // ---------- Top-level rules ----------

    /// CSSOM `insertRule`: gated by [`Cssom::check_access`].
    pub fn insert_rule(
        &mut self,
        sheet: SheetId,
        text: &str,
        index: usize,
        caller: &Caller,
    ) -> Result<usize> {
        if !self.inner_of(sheet)?.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        self.check_access(sheet, caller)?;
        self.insert_rule_internal(sheet, text, index)
    }

    /// Parse `text` and insert the resulting rules before `index`.
    ///
    /// Empty text is accepted and inserts nothing.
    pub fn insert_rule_internal(&mut self, sheet: SheetId, text: &str, index: usize) -> Result<usize> {
        let inner = self.inner_of(sheet)?;
        if !inner.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        if text.is_empty() {
            return Ok(index);
        }
        let len = inner.rules.len();
        if index > len {
            return Err(CssomError::IndexOutOfRange { index, len });
        }

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let mut rules =
            self.with_parse_context(sheet, false, |parser, ctx| parser.parse_rule(text, ctx))??;
        if rules.is_empty() {
            return Err(CssomError::Syntax(format!("no rule found in {text:?}")));
        }
        check_insert_order(&self.inner_of(sheet)?.rules, index, &rules)?;

        self.inner_of_mut(sheet)?.rules.try_reserve(rules.len())?;
        self.adopt_rules(sheet, &mut rules, None);
        let ids: Vec<RuleId> = rules.iter().map(Rule::id).collect();
        let has_import = rules.iter().any(|r| r.kind() == RuleKind::Import);
        let inner = self.inner_of_mut(sheet)?;
        for rule in &rules {
            if let Some(ns) = rule.as_namespace() {
                inner.register_namespace_rule(ns);
            }
        }
        inner.rules.splice(index..index, rules);
        if has_import {
            self.rebuild_child_list(sheet)?;
        }
        self.did_dirty(sheet);
        debug!(?sheet, index, count = ids.len(), "inserted rule");
        self.notify_added(sheet, &ids);
        Ok(index)
    }

    /// CSSOM `deleteRule`: gated by [`Cssom::check_access`].
    pub fn delete_rule(&mut self, sheet: SheetId, index: usize, caller: &Caller) -> Result<()> {
        if !self.inner_of(sheet)?.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        self.check_access(sheet, caller)?;
        let len = self.inner_of(sheet)?.rules.len();
        if index >= len {
            return Err(CssomError::IndexOutOfRange { index, len });
        }

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let inner = self.inner_of_mut(sheet)?;
        let mut rule = inner.rules.remove(index);
        rule.set_sheet(None);
        if rule.kind() == RuleKind::Namespace {
            inner.rebuild_namespaces();
        }
        let child = rule.as_import().and_then(|i| i.child_sheet());
        if let Some(child) = child {
            inner.children.retain(|&c| c != child);
        }
        self.did_dirty(sheet);
        debug!(?sheet, index, "deleted rule");
        if let Some(doc) = self.document_of(sheet) {
            trace!(?sheet, "notifying rule removed");
            doc.style_rule_removed(sheet, &rule);
        }
        if let Some(child) = child {
            self.destroy_sheet(child);
        }
        Ok(())
    }

    /// Replace every rule with the result of parsing `text`.
    pub fn parse_sheet(&mut self, sheet: SheetId, text: &str) -> Result<()> {
        if !self.inner_of(sheet)?.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;

        let document = self.document_of(sheet);
        let inner = self.inner_of_mut(sheet)?;
        let old_rules = std::mem::take(&mut inner.rules);
        let old_children = std::mem::take(&mut inner.children);
        inner.namespaces = None;
        for mut rule in old_rules.into_iter().rev() {
            rule.set_sheet(None);
            if let Some(doc) = &document {
                doc.style_rule_removed(sheet, &rule);
            }
        }
        for child in old_children {
            if let Some(c) = self.sheets.get_mut(child) {
                c.parent = None;
                c.document = None;
            }
            self.destroy_sheet(child);
        }

        let allow_unsafe = self.allows_unsafe_rules(sheet);
        let mut rules =
            self.with_parse_context(sheet, allow_unsafe, |parser, ctx| parser.parse_sheet(text, ctx))?;
        self.inner_of_mut(sheet)?.rules.try_reserve(rules.len())?;
        self.adopt_rules(sheet, &mut rules, None);
        let ids: Vec<RuleId> = rules.iter().map(Rule::id).collect();
        let inner = self.inner_of_mut(sheet)?;
        inner.rules = rules;
        inner.rebuild_namespaces();
        self.rebuild_child_list(sheet)?;
        self.did_dirty(sheet);
        debug!(?sheet, rules = ids.len(), "re-parsed sheet");
        self.notify_added(sheet, &ids);
        Ok(())
    }

    /// Announce rules that were just added, holding back imports still loading.
    fn notify_added(&self, sheet: SheetId, ids: &[RuleId]) {
        let Some(doc) = self.document_of(sheet) else {
            return;
        };
        let Ok(inner) = self.inner_of(sheet) else {
            return;
        };
        for &id in ids {
            let Some(rule) = find_rule(&inner.rules, id) else {
                continue;
            };
            if self.has_pending_child(rule) {
                trace!(?sheet, rule = id.get(), "deferring notification until import loads");
                continue;
            }
            trace!(?sheet, rule = id.get(), "notifying rule added");
            doc.style_rule_added(sheet, rule);
        }
    }

    // ---------- Group rules ----------

    fn check_group(&self, sheet: SheetId, group: RuleId) -> Result<usize> {
        let inner = self.inner_of(sheet)?;
        if !inner.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        find_rule(&inner.rules, group)
            .and_then(Rule::as_group)
            .map(|g| g.len())
            .ok_or(CssomError::WrongSheet)
    }

    /// `CSSGroupingRule.insertRule` on a group rule of `sheet`.
    pub fn insert_rule_into_group(
        &mut self,
        sheet: SheetId,
        group: RuleId,
        text: &str,
        index: usize,
    ) -> Result<usize> {
        let len = self.check_group(sheet, group)?;
        if text.is_empty() {
            return Ok(index);
        }
        if index > len {
            return Err(CssomError::IndexOutOfRange { index, len });
        }

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let mut rules =
            self.with_parse_context(sheet, false, |parser, ctx| parser.parse_rule(text, ctx))??;
        if rules.is_empty() {
            return Err(CssomError::Syntax(format!("no rule found in {text:?}")));
        }
        if rules.iter().any(|r| !r.kind().is_ruleset_compatible()) {
            return Err(CssomError::HierarchyViolation(
                "only ruleset-compatible rules may appear in a group",
            ));
        }
        self.adopt_rules(sheet, &mut rules, Some(group));
        let ids: Vec<RuleId> = rules.iter().map(Rule::id).collect();
        let inner = self.inner_of_mut(sheet)?;
        find_rule_mut(&mut inner.rules, group)
            .and_then(Rule::as_group_mut)
            .ok_or(CssomError::WrongSheet)?
            .insert_rules_at(index, rules)?;
        self.did_dirty(sheet);
        debug!(?sheet, group = group.get(), index, "inserted rule into group");
        self.notify_added(sheet, &ids);
        Ok(index)
    }

    /// `CSSGroupingRule.deleteRule` on a group rule of `sheet`.
    pub fn delete_rule_from_group(&mut self, sheet: SheetId, group: RuleId, index: usize) -> Result<()> {
        let len = self.check_group(sheet, group)?;
        if index >= len {
            return Err(CssomError::IndexOutOfRange { index, len });
        }

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let inner = self.inner_of_mut(sheet)?;
        let mut rule = find_rule_mut(&mut inner.rules, group)
            .and_then(Rule::as_group_mut)
            .ok_or(CssomError::WrongSheet)?
            .delete_rule_at(index)?;
        rule.set_sheet(None);
        self.did_dirty(sheet);
        debug!(?sheet, group = group.get(), index, "deleted rule from group");
        if let Some(doc) = self.document_of(sheet) {
            doc.style_rule_removed(sheet, &rule);
        }
        Ok(())
    }

    /// Swap a child of a group rule for `new`, returning the detached old child.
    pub fn replace_rule_in_group(
        &mut self,
        sheet: SheetId,
        group: RuleId,
        old: RuleId,
        mut new: Rule,
    ) -> Result<Rule> {
        self.check_group(sheet, group)?;
        if !new.kind().is_ruleset_compatible() {
            return Err(CssomError::HierarchyViolation(
                "only ruleset-compatible rules may appear in a group",
            ));
        }
        self.will_dirty(sheet)?;
        self.adopt_rules(sheet, std::slice::from_mut(&mut new), Some(group));
        let inner = self.inner_of_mut(sheet)?;
        let mut removed = find_rule_mut(&mut inner.rules, group)
            .and_then(Rule::as_group_mut)
            .ok_or(CssomError::WrongSheet)?
            .replace_rule(old, new)?;
        removed.set_sheet(None);
        self.did_dirty(sheet);
        Ok(removed)
    }

    // ---------- Rule text ----------

    /// `CSSStyleRule.selectorText` setter.
    pub fn set_selector_text(&mut self, sheet: SheetId, rule: RuleId, text: &str) -> Result<()> {
        self.rule(sheet, rule)?.as_style().ok_or(CssomError::WrongSheet)?;
        let selectors = self
            .parser()
            .parse_selector_list(text, self.namespace_map(sheet))?;

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let inner = self.inner_of_mut(sheet)?;
        let target = find_rule_mut(&mut inner.rules, rule)
            .ok_or_else(|| CssomError::NotFound(format!("rule {}", rule.get())))?;
        let old = target.clone();
        target
            .as_style_mut()
            .ok_or(CssomError::WrongSheet)?
            .set_selectors(selectors);
        self.did_dirty(sheet);
        debug!(?sheet, rule = rule.get(), "replaced selector text");
        if let Some(doc) = self.document_of(sheet) {
            let new = self.rule(sheet, rule).ok();
            doc.style_rule_changed(sheet, Some(&old), new);
        }
        Ok(())
    }

    /// `CSSStyleDeclaration.cssText` setter on a style rule.
    ///
    /// The rule keeps its id and position but gets a fresh body, so cascade
    /// data built from the old declaration is never edited in place.
    pub fn set_declaration_text(&mut self, sheet: SheetId, rule: RuleId, text: &str) -> Result<()> {
        self.rule(sheet, rule)?.as_style().ok_or(CssomError::WrongSheet)?;
        let declaration = self.parser().parse_declaration(text)?;

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let inner = self.inner_of_mut(sheet)?;
        let target = find_rule_mut(&mut inner.rules, rule)
            .ok_or_else(|| CssomError::NotFound(format!("rule {}", rule.get())))?;
        let style = target.as_style().ok_or(CssomError::WrongSheet)?;
        let mut replacement = target.clone();
        *replacement.body_mut() = RuleBody::Style(style.with_declaration(declaration));
        let old = std::mem::replace(target, replacement);
        self.did_dirty(sheet);
        if let Some(doc) = self.document_of(sheet) {
            let new = self.rule(sheet, rule).ok();
            doc.style_rule_changed(sheet, Some(&old), new);
        }
        Ok(())
    }

    /// `CSSRule.cssText` setter. Accepted and ignored, as CSSOM specifies.
    pub fn set_css_text(&mut self, sheet: SheetId, rule: RuleId, _text: &str) -> Result<()> {
        self.rule(sheet, rule)?;
        trace!(?sheet, rule = rule.get(), "ignoring cssText assignment");
        Ok(())
    }

    // ---------- Media lists ----------

    /// `MediaList.mediaText` setter.
    pub fn set_media_text(&mut self, sheet: SheetId, target: MediaTarget, text: &str) -> Result<()> {
        self.edit_media(sheet, target, |media| {
            media.set_media_text(text);
            Ok(())
        })
    }

    pub fn append_medium(&mut self, sheet: SheetId, target: MediaTarget, text: &str) -> Result<()> {
        self.edit_media(sheet, target, |media| media.append_medium(text))
    }

    pub fn delete_medium(&mut self, sheet: SheetId, target: MediaTarget, text: &str) -> Result<()> {
        self.edit_media(sheet, target, |media| media.delete_medium(text))
    }

    /// Run `edit` on a media list inside the dirty bracket.
    ///
    /// The sheet is announced as changed even when the edit itself fails.
    fn edit_media(
        &mut self,
        sheet: SheetId,
        target: MediaTarget,
        edit: impl FnOnce(&mut MediaList) -> Result<()>,
    ) -> Result<()> {
        if let MediaTarget::Rule(id) = target {
            if !matches!(self.rule(sheet, id)?.body(), RuleBody::Media(_) | RuleBody::Import(_)) {
                return Err(CssomError::WrongSheet);
            }
        }

        let _batch = self.update_batch(sheet);
        self.will_dirty(sheet)?;
        let mut import_child = None;
        let result = match target {
            MediaTarget::Sheet => edit(&mut self.sheet_mut(sheet)?.media),
            MediaTarget::Rule(id) => {
                let inner = self.inner_of_mut(sheet)?;
                let rule = find_rule_mut(&mut inner.rules, id)
                    .ok_or_else(|| CssomError::NotFound(format!("rule {}", id.get())))?;
                match rule.body_mut() {
                    RuleBody::Media(media) => edit(&mut media.media),
                    RuleBody::Import(import) => {
                        let result = edit(&mut import.media);
                        import_child = import.child.map(|child| (child, import.media.clone()));
                        result
                    }
                    _ => Err(CssomError::WrongSheet),
                }
            }
        };
        // An import's child sheet mirrors the rule's media list.
        if let Some((child, media)) = import_child {
            if let Some(c) = self.sheets.get_mut(child) {
                c.media = media;
            }
        }
        self.did_dirty(sheet);
        if let Some(doc) = self.document_of(sheet) {
            doc.style_rule_changed(sheet, None, None);
        }
        result
    }

    // ---------- Import completion ----------

    /// The loader reports that `child` finished loading.
    ///
    /// The importing `@import` rule is announced now that its sheet is
    /// ready. Failed loads and children whose parent has gone away are
    /// accepted silently.
    pub fn style_sheet_loaded(
        &mut self,
        child: SheetId,
        was_alternate: bool,
        status: std::result::Result<(), LoadError>,
    ) -> Result<()> {
        let Some(loaded) = self.sheets.get(child) else {
            debug!(?child, "load finished for a removed sheet");
            return Ok(());
        };
        let Some(parent) = loaded.parent.filter(|&p| self.sheets.contains_key(p)) else {
            debug!(?child, "load finished for a detached sheet");
            return Ok(());
        };
        let owner_rule = loaded.owner_rule;
        if let Err(err) = status {
            debug!(?child, error = %err, "import load failed");
            return Ok(());
        }
        debug!(?child, ?parent, was_alternate, "import finished loading");
        let Some(doc) = self.document_of(parent) else {
            return Ok(());
        };
        let Some(rule) = owner_rule.and_then(|id| self.rule(parent, id).ok()) else {
            return Ok(());
        };
        let _batch = UpdateBatch::new(Some(doc.clone()));
        doc.style_rule_added(parent, rule);
        Ok(())
    }
}
