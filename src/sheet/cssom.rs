//! The arena owning every outer sheet and shared inner.
//!
//! Sheets and inners live in two slotmaps. A [`SheetId`] is the handle an
//! embedder holds; several sheets may point at one [`StyleSheetInner`] until
//! a mutation forces [`Cssom::ensure_unique_inner`] to give the mutating
//! sheet its own copy.

use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::SlotMap;
use tracing::{debug, trace};
use url::Url;

use crate::config::CssomConfig;
use crate::css::namespace::NameSpaceMap;
use crate::css::parser::{CssParser, ParseContext, RuleParser};
use crate::error::{CssomError, Result};
use crate::media::cache_key::MediaQueryResultCacheKey;
use crate::media::device::MediaContext;
use crate::media::query::MediaList;
use crate::rules::{find_rule, find_rule_mut, Rule, RuleId};
use crate::sheet::inner::{InnerId, StyleSheetInner};
use crate::sheet::observer::{
    DocumentObserver, ImportRequest, Loader, RuleProcessor, RuleProcessorRegistry, UpdateBatch,
};
use crate::sheet::outer::{OwnerNode, SheetId, StyleSheet};
use crate::sheet::security::{CorsMode, Principal};

/// Outcome of [`Cssom::ensure_unique_inner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueInner {
    /// The sheet was the only owner; nothing was copied.
    AlreadyUnique,
    /// The sheet now owns a fresh copy of what it used to share.
    ClonedInner,
}

/// Owner of all sheets, their shared inners, and the collaborators they use.
pub struct Cssom {
    pub(crate) sheets: SlotMap<SheetId, StyleSheet>,
    pub(crate) inners: SlotMap<InnerId, StyleSheetInner>,
    next_rule_id: u64,
    config: CssomConfig,
    parser: Box<dyn RuleParser>,
    loader: Option<Rc<dyn Loader>>,
}

impl Default for Cssom {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cssom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cssom")
            .field("sheets", &self.sheets.len())
            .field("inners", &self.inners.len())
            .field("next_rule_id", &self.next_rule_id)
            .field("config", &self.config)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

/// Resolve an `@import` href against the importing sheet.
fn resolve_href(base: Option<&Url>, href: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

impl Cssom {
    pub fn new() -> Self {
        Self::with_config(CssomConfig::default())
    }

    pub fn with_config(config: CssomConfig) -> Self {
        Self {
            sheets: SlotMap::with_key(),
            inners: SlotMap::with_key(),
            next_rule_id: 0,
            config,
            parser: Box::new(CssParser),
            loader: None,
        }
    }

    /// Replace the default [`CssParser`].
    pub fn with_parser(mut self, parser: Box<dyn RuleParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Install the loader that fetches `@import`ed sheets.
    pub fn with_loader(mut self, loader: Rc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn set_loader(&mut self, loader: Option<Rc<dyn Loader>>) {
        self.loader = loader;
    }

    pub fn config(&self) -> &CssomConfig {
        &self.config
    }

    pub fn parser(&self) -> &dyn RuleParser {
        self.parser.as_ref()
    }

    // ---------- Lookup ----------

    pub fn get(&self, sheet: SheetId) -> Option<&StyleSheet> {
        self.sheets.get(sheet)
    }

    pub fn contains(&self, sheet: SheetId) -> bool {
        self.sheets.contains_key(sheet)
    }

    /// The inner `sheet` currently reads from.
    pub fn inner(&self, sheet: SheetId) -> Option<&StyleSheetInner> {
        self.sheets
            .get(sheet)
            .and_then(|s| self.inners.get(s.inner))
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn inner_count(&self) -> usize {
        self.inners.len()
    }

    pub(crate) fn sheet(&self, sheet: SheetId) -> Result<&StyleSheet> {
        self.sheets.get(sheet).ok_or(CssomError::NoSuchSheet)
    }

    pub(crate) fn sheet_mut(&mut self, sheet: SheetId) -> Result<&mut StyleSheet> {
        self.sheets.get_mut(sheet).ok_or(CssomError::NoSuchSheet)
    }

    pub(crate) fn inner_of(&self, sheet: SheetId) -> Result<&StyleSheetInner> {
        self.inner(sheet).ok_or(CssomError::NoSuchSheet)
    }

    pub(crate) fn inner_of_mut(&mut self, sheet: SheetId) -> Result<&mut StyleSheetInner> {
        let inner = self.sheet(sheet)?.inner;
        self.inners.get_mut(inner).ok_or(CssomError::NoSuchSheet)
    }

    pub(crate) fn document_of(&self, sheet: SheetId) -> Option<Rc<dyn DocumentObserver>> {
        self.sheets.get(sheet).and_then(StyleSheet::document)
    }

    pub(crate) fn update_batch(&self, sheet: SheetId) -> UpdateBatch {
        UpdateBatch::new(self.document_of(sheet))
    }

    // ---------- Creation and configuration ----------

    /// A new building sheet with a null principal and the configured CORS mode.
    pub fn create_sheet(&mut self) -> SheetId {
        let cors_mode = self.config.default_cors_mode;
        let inners = &mut self.inners;
        let sheet = self.sheets.insert_with_key(|id| {
            let inner = inners.insert(StyleSheetInner::new(id, Principal::null(), cors_mode));
            StyleSheet::new(inner)
        });
        trace!(?sheet, "created sheet");
        sheet
    }

    pub fn set_uris(
        &mut self,
        sheet: SheetId,
        sheet_uri: Option<Url>,
        original_uri: Option<Url>,
        base_uri: Option<Url>,
    ) -> Result<()> {
        let inner = self.inner_of_mut(sheet)?;
        if inner.complete {
            return Err(CssomError::InvalidState("URIs can only be set while loading"));
        }
        inner.sheet_uri = sheet_uri;
        inner.original_uri = original_uri;
        inner.base_uri = base_uri;
        Ok(())
    }

    pub fn set_principal(&mut self, sheet: SheetId, principal: Principal) -> Result<()> {
        let inner = self.inner_of_mut(sheet)?;
        if inner.complete {
            return Err(CssomError::InvalidState(
                "the principal can only be set while loading",
            ));
        }
        inner.principal = principal;
        Ok(())
    }

    pub fn set_cors_mode(&mut self, sheet: SheetId, mode: CorsMode) -> Result<()> {
        let inner = self.inner_of_mut(sheet)?;
        if inner.complete {
            return Err(CssomError::InvalidState(
                "the CORS mode can only be set while loading",
            ));
        }
        inner.cors_mode = mode;
        Ok(())
    }

    pub fn set_title(&mut self, sheet: SheetId, title: Option<String>) -> Result<()> {
        self.sheet_mut(sheet)?.title = title;
        Ok(())
    }

    pub fn set_owner_node(&mut self, sheet: SheetId, node: Option<OwnerNode>) -> Result<()> {
        self.sheet_mut(sheet)?.owner_node = node;
        Ok(())
    }

    /// Attach `sheet`, and every child it parents, to `document`.
    pub fn set_owning_document(
        &mut self,
        sheet: SheetId,
        document: Option<&Rc<dyn DocumentObserver>>,
    ) -> Result<()> {
        self.set_document_weak(sheet, document.map(Rc::downgrade))
    }

    fn set_document_weak(
        &mut self,
        sheet: SheetId,
        document: Option<Weak<dyn DocumentObserver>>,
    ) -> Result<()> {
        self.sheet_mut(sheet)?.document = document.clone();
        let children = self.inner_of(sheet)?.children.clone();
        for child in children {
            if self.sheets.get(child).is_some_and(|c| c.parent == Some(sheet)) {
                self.set_document_weak(child, document.clone())?;
            }
        }
        Ok(())
    }

    pub fn set_media(&mut self, sheet: SheetId, media: MediaList) -> Result<()> {
        self.sheet_mut(sheet)?.media = media;
        Ok(())
    }

    // ---------- Queries ----------

    pub fn style_rule_count(&self, sheet: SheetId) -> Result<usize> {
        Ok(self.inner_of(sheet)?.rules.len())
    }

    pub fn style_rule_at(&self, sheet: SheetId, index: usize) -> Result<&Rule> {
        let rules = &self.inner_of(sheet)?.rules;
        rules.get(index).ok_or(CssomError::IndexOutOfRange {
            index,
            len: rules.len(),
        })
    }

    pub fn style_sheet_count(&self, sheet: SheetId) -> Result<usize> {
        Ok(self.inner_of(sheet)?.children.len())
    }

    pub fn child_sheets(&self, sheet: SheetId) -> Result<&[SheetId]> {
        Ok(&self.inner_of(sheet)?.children)
    }

    /// Find a rule at any depth of the sheet.
    pub fn rule(&self, sheet: SheetId, id: RuleId) -> Result<&Rule> {
        find_rule(&self.inner_of(sheet)?.rules, id)
            .ok_or_else(|| CssomError::NotFound(format!("rule {}", id.get())))
    }

    pub fn css_text_of(&self, sheet: SheetId, id: RuleId) -> Result<String> {
        let rule = self.rule(sheet, id)?;
        Ok(rule.css_text(self.namespace_map(sheet)))
    }

    pub fn selector_text(&self, sheet: SheetId, id: RuleId) -> Result<String> {
        let style = self.rule(sheet, id)?.as_style().ok_or(CssomError::WrongSheet)?;
        Ok(style.selector_text(self.namespace_map(sheet)))
    }

    /// The URI the sheet was originally requested from.
    pub fn href(&self, sheet: SheetId) -> Option<&Url> {
        self.inner(sheet).and_then(|i| i.original_uri.as_ref())
    }

    pub fn sheet_uri(&self, sheet: SheetId) -> Option<&Url> {
        self.inner(sheet).and_then(|i| i.sheet_uri.as_ref())
    }

    pub fn base_uri(&self, sheet: SheetId) -> Option<&Url> {
        self.inner(sheet).and_then(|i| i.base_uri.as_ref())
    }

    pub fn principal(&self, sheet: SheetId) -> Option<&Principal> {
        self.inner(sheet).map(|i| &i.principal)
    }

    pub fn title(&self, sheet: SheetId) -> Option<&str> {
        self.sheets.get(sheet).and_then(StyleSheet::title)
    }

    pub fn parent(&self, sheet: SheetId) -> Option<SheetId> {
        self.sheets.get(sheet).and_then(|s| s.parent)
    }

    pub fn owner_rule(&self, sheet: SheetId) -> Option<RuleId> {
        self.sheets.get(sheet).and_then(|s| s.owner_rule)
    }

    pub fn owning_document(&self, sheet: SheetId) -> Option<Rc<dyn DocumentObserver>> {
        self.document_of(sheet)
    }

    pub fn media(&self, sheet: SheetId) -> Result<&MediaList> {
        Ok(&self.sheet(sheet)?.media)
    }

    pub fn is_complete(&self, sheet: SheetId) -> bool {
        self.inner(sheet).is_some_and(|i| i.complete)
    }

    pub fn is_applicable(&self, sheet: SheetId) -> bool {
        self.sheets.get(sheet).is_some_and(|s| !s.disabled) && self.is_complete(sheet)
    }

    pub fn has_rules(&self, sheet: SheetId) -> bool {
        self.inner(sheet).is_some_and(|i| !i.rules.is_empty())
    }

    pub fn namespace_map(&self, sheet: SheetId) -> Option<&NameSpaceMap> {
        self.inner(sheet).and_then(|i| i.namespaces.as_ref())
    }

    /// Whether two sheets currently read from the same inner.
    pub fn shares_inner_with(&self, a: SheetId, b: SheetId) -> bool {
        match (self.sheets.get(a), self.sheets.get(b)) {
            (Some(a), Some(b)) => a.inner == b.inner,
            _ => false,
        }
    }

    /// Whether the sheet's media list matches `ctx`.
    pub fn use_for_presentation(
        &self,
        sheet: SheetId,
        ctx: &dyn MediaContext,
        key: Option<&mut MediaQueryResultCacheKey>,
    ) -> Result<bool> {
        Ok(self.sheet(sheet)?.media.matches(ctx, key))
    }

    // ---------- Copy-on-write ----------

    /// Give `sheet` an inner no other sheet reads from.
    ///
    /// The copy is fully built before the swap; on failure the sheet stays on
    /// its old inner and nothing shared has changed.
    pub fn ensure_unique_inner(&mut self, sheet: SheetId) -> Result<UniqueInner> {
        let old_inner = self.sheet(sheet)?.inner;
        self.sheet_mut(sheet)?.dirty = true;
        let source = self.inners.get(old_inner).ok_or(CssomError::NoSuchSheet)?;
        if source.sheets.len() == 1 {
            return Ok(UniqueInner::AlreadyUnique);
        }
        let mut clone = source.clone_for(sheet)?;
        let old_children = source.children.clone();
        let document = self.sheet(sheet)?.document.clone();

        // Every child gets a new outer sheet that shares the old child's inner.
        let mut children = Vec::new();
        let mut failure = None;
        for rule in clone.rules.iter_mut() {
            let rule_id = rule.id();
            let Some(import) = rule.as_import_mut() else {
                continue;
            };
            let Some(old_child) = import.child else {
                continue;
            };
            if !self.sheets.contains_key(old_child) {
                import.child = None;
                continue;
            }
            match self.clone_sheet_with(old_child, Some(sheet), Some(rule_id), document.clone(), None) {
                Ok(child) => {
                    import.child = Some(child);
                    children.push(child);
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            for old_child in old_children {
                if !self.sheets.get(old_child).is_some_and(|c| c.owner_rule.is_none()) {
                    continue;
                }
                match self.clone_sheet_with(old_child, Some(sheet), None, document.clone(), None) {
                    Ok(child) => children.push(child),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }
        if let Some(err) = failure {
            for child in children {
                self.destroy_sheet(child);
            }
            return Err(err);
        }
        clone.children = children;

        let rule_count = clone.rules.len();
        let new_inner = self.inners.insert(clone);
        self.detach_from_inner(sheet, old_inner);
        self.sheet_mut(sheet)?.inner = new_inner;
        // Processors still point at the old rules.
        self.clear_rule_cascades(sheet);
        debug!(?sheet, rules = rule_count, "copy-on-write cloned shared inner");
        Ok(UniqueInner::ClonedInner)
    }

    /// Take `sheet` out of the owner set of `inner_id`.
    ///
    /// The last owner frees the inner along with the sheets its imports
    /// created. When the primary leaves, rules and children are re-pointed
    /// at the next owner.
    fn detach_from_inner(&mut self, sheet: SheetId, inner_id: InnerId) {
        let Some(inner) = self.inners.get_mut(inner_id) else {
            return;
        };
        let was_primary = inner.sheets.first() == Some(&sheet);
        inner.sheets.retain(|&s| s != sheet);
        let Some(primary) = inner.sheets.first().copied() else {
            if let Some(freed) = self.inners.remove(inner_id) {
                trace!(?sheet, children = freed.children.len(), "freed inner");
                for child in freed.children {
                    self.destroy_sheet(child);
                }
            }
            return;
        };
        if !was_primary {
            return;
        }
        for rule in inner.rules.iter_mut() {
            rule.set_sheet(Some(primary));
        }
        let children = inner.children.clone();
        let document = self.sheets.get(primary).and_then(|s| s.document.clone());
        for child in children {
            if let Some(c) = self.sheets.get_mut(child) {
                c.parent = Some(primary);
                c.document = document.clone();
            }
        }
    }

    /// Open a mutation on `sheet`: a complete sheet is made unique first.
    pub fn will_dirty(&mut self, sheet: SheetId) -> Result<()> {
        if !self.inner_of(sheet)?.complete {
            return Ok(());
        }
        self.ensure_unique_inner(sheet).map(|_| ())
    }

    /// Close a mutation on `sheet`.
    pub fn did_dirty(&mut self, sheet: SheetId) {
        self.clear_rule_cascades(sheet);
    }

    /// Invalidate the processors of `sheet` and of every ancestor sheet.
    pub fn clear_rule_cascades(&mut self, sheet: SheetId) {
        let mut current = Some(sheet);
        while let Some(id) = current {
            let Some(s) = self.sheets.get_mut(id) else {
                break;
            };
            trace!(sheet = ?id, processors = s.processors.len(), "clearing rule cascades");
            s.processors.notify_all();
            current = s.parent;
        }
    }

    // ---------- Cloning and removal ----------

    /// A new outer sheet sharing `src`'s inner.
    ///
    /// Title, disabled state and media list are copied. A dirty source hands
    /// the clone its own inner straight away.
    pub fn clone_sheet(
        &mut self,
        src: SheetId,
        parent: Option<SheetId>,
        owner_rule: Option<RuleId>,
        document: Option<&Rc<dyn DocumentObserver>>,
        owner_node: Option<OwnerNode>,
    ) -> Result<SheetId> {
        self.clone_sheet_with(src, parent, owner_rule, document.map(Rc::downgrade), owner_node)
    }

    fn clone_sheet_with(
        &mut self,
        src: SheetId,
        parent: Option<SheetId>,
        owner_rule: Option<RuleId>,
        document: Option<Weak<dyn DocumentObserver>>,
        owner_node: Option<OwnerNode>,
    ) -> Result<SheetId> {
        let source = self.sheet(src)?;
        let copy = StyleSheet {
            title: source.title.clone(),
            parent,
            owner_rule,
            document,
            owner_node,
            disabled: source.disabled,
            dirty: false,
            media: source.media.clone(),
            processors: RuleProcessorRegistry::new(),
            inner: source.inner,
        };
        let source_dirty = source.dirty;
        let inner = self
            .inners
            .get_mut(copy.inner)
            .ok_or(CssomError::NoSuchSheet)?;
        inner.sheets.try_reserve(1)?;
        let id = self.sheets.insert(copy);
        inner.sheets.push(id);
        if source_dirty {
            if let Err(err) = self.ensure_unique_inner(id) {
                self.destroy_sheet(id);
                return Err(err);
            }
        }
        trace!(?src, clone = ?id, "cloned sheet");
        Ok(id)
    }

    /// Destroy a sheet that no `@import` rule still owns.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> Result<()> {
        let parent = self.sheet(sheet)?.parent;
        if parent.is_some_and(|p| self.sheets.contains_key(p)) {
            return Err(CssomError::InvalidState("sheet still has a parent"));
        }
        self.destroy_sheet(sheet);
        debug!(?sheet, "removed sheet");
        Ok(())
    }

    pub(crate) fn destroy_sheet(&mut self, sheet: SheetId) {
        let Some(removed) = self.sheets.remove(sheet) else {
            return;
        };
        if let Some(inner) = self.inners.get(removed.inner) {
            for &child in &inner.children {
                if let Some(c) = self.sheets.get_mut(child) {
                    if c.parent == Some(sheet) {
                        c.parent = None;
                        c.document = None;
                    }
                }
            }
        }
        self.detach_from_inner(sheet, removed.inner);
    }

    // ---------- State ----------

    /// Finish loading. An enabled sheet in a document becomes applicable.
    pub fn set_complete(&mut self, sheet: SheetId) -> Result<()> {
        self.inner_of_mut(sheet)?.complete = true;
        if self.sheet(sheet)?.disabled {
            return Ok(());
        }
        if let Some(doc) = self.document_of(sheet) {
            let _batch = UpdateBatch::new(Some(doc.clone()));
            doc.style_sheet_applicable_state_changed(sheet, true);
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, sheet: SheetId, enabled: bool) -> Result<()> {
        let complete = self.inner_of(sheet)?.complete;
        let s = self.sheet_mut(sheet)?;
        let was_disabled = s.disabled;
        s.disabled = !enabled;
        if complete && was_disabled == enabled {
            self.clear_rule_cascades(sheet);
            if let Some(doc) = self.document_of(sheet) {
                doc.style_sheet_applicable_state_changed(sheet, enabled);
            }
            debug!(?sheet, enabled, "sheet applicability changed");
        }
        Ok(())
    }

    /// The DOM `disabled` attribute setter.
    pub fn set_disabled(&mut self, sheet: SheetId, disabled: bool) -> Result<()> {
        let _batch = self.update_batch(sheet);
        self.set_enabled(sheet, !disabled)
    }

    // ---------- Rule processors ----------

    pub fn add_rule_processor(
        &mut self,
        sheet: SheetId,
        processor: &Rc<dyn RuleProcessor>,
    ) -> Result<()> {
        self.sheet_mut(sheet)?.processors.add(processor)
    }

    pub fn drop_rule_processor(
        &mut self,
        sheet: SheetId,
        processor: &Rc<dyn RuleProcessor>,
    ) -> Result<()> {
        self.sheet_mut(sheet)?.processors.drop_processor(processor)
    }

    /// Record that a style rule took part in a match.
    ///
    /// Returns `true` the first time. Match state is not CSSOM-visible, so
    /// this does not copy a shared inner.
    pub fn rule_matched(&mut self, sheet: SheetId, rule: RuleId) -> Result<bool> {
        let inner = self.inner_of_mut(sheet)?;
        let target = find_rule_mut(&mut inner.rules, rule)
            .ok_or_else(|| CssomError::NotFound(format!("rule {}", rule.get())))?;
        let style = target.as_style_mut().ok_or(CssomError::WrongSheet)?;
        Ok(style.rule_matched())
    }

    // ---------- Building phase ----------

    /// Append a rule while building, or as a direct (non-CSSOM) edit.
    pub fn append_style_rule(&mut self, sheet: SheetId, mut rule: Rule) -> Result<RuleId> {
        self.will_dirty(sheet)?;
        self.inner_of_mut(sheet)?.rules.try_reserve(1)?;
        self.adopt_rules(sheet, std::slice::from_mut(&mut rule), None);
        let id = rule.id();
        let is_import = rule.as_import().is_some();
        let inner = self.inner_of_mut(sheet)?;
        if let Some(ns) = rule.as_namespace() {
            inner.register_namespace_rule(ns);
        }
        inner.rules.push(rule);
        if is_import {
            self.rebuild_child_list(sheet)?;
        }
        self.did_dirty(sheet);
        Ok(id)
    }

    pub fn prepend_style_rule(&mut self, sheet: SheetId, mut rule: Rule) -> Result<RuleId> {
        self.will_dirty(sheet)?;
        self.inner_of_mut(sheet)?.rules.try_reserve(1)?;
        self.adopt_rules(sheet, std::slice::from_mut(&mut rule), None);
        let id = rule.id();
        let is_import = rule.as_import().is_some();
        let inner = self.inner_of_mut(sheet)?;
        inner.rules.insert(0, rule);
        inner.rebuild_namespaces();
        if is_import {
            self.rebuild_child_list(sheet)?;
        }
        self.did_dirty(sheet);
        Ok(id)
    }

    /// Swap a top-level rule for `new`, returning the detached old rule.
    pub fn replace_style_rule(&mut self, sheet: SheetId, old: RuleId, mut new: Rule) -> Result<Rule> {
        let index = self
            .inner_of(sheet)?
            .index_of(old)
            .ok_or_else(|| CssomError::NotFound(format!("rule {}", old.get())))?;
        self.will_dirty(sheet)?;
        self.adopt_rules(sheet, std::slice::from_mut(&mut new), None);
        let inner = self.inner_of_mut(sheet)?;
        let mut removed = std::mem::replace(&mut inner.rules[index], new);
        removed.set_sheet(None);
        inner.rebuild_namespaces();
        let stale_child = removed.as_import_mut().and_then(|i| i.child.take());
        self.rebuild_child_list(sheet)?;
        self.did_dirty(sheet);
        if let Some(child) = stale_child {
            self.destroy_sheet(child);
        }
        Ok(removed)
    }

    pub fn append_style_sheet(&mut self, sheet: SheetId, child: SheetId) -> Result<()> {
        let len = self.inner_of(sheet)?.children.len();
        self.insert_style_sheet_at(sheet, child, len)
    }

    /// Parent `child` to `sheet` outside of any `@import` rule.
    pub fn insert_style_sheet_at(&mut self, sheet: SheetId, child: SheetId, index: usize) -> Result<()> {
        self.sheet(child)?;
        if self.is_ancestor_or_self(child, sheet) {
            return Err(CssomError::HierarchyViolation("a sheet cannot contain its own ancestor"));
        }
        if self.parent(child).is_some_and(|parent| self.sheets.contains_key(parent)) {
            return Err(CssomError::HierarchyViolation("sheet already has a parent"));
        }
        let len = self.inner_of(sheet)?.children.len();
        if index > len {
            return Err(CssomError::IndexOutOfRange { index, len });
        }
        self.will_dirty(sheet)?;
        let document = self.sheet(sheet)?.document.clone();
        {
            let c = self.sheet_mut(child)?;
            c.parent = Some(sheet);
            c.owner_rule = None;
        }
        self.set_document_weak(child, document)?;
        let inner = self.inner_of_mut(sheet)?;
        inner.children.try_reserve(1)?;
        inner.children.insert(index, child);
        self.did_dirty(sheet);
        Ok(())
    }

    /// Parse `text` into a building sheet, appending to its rules.
    pub fn load_text(&mut self, sheet: SheetId, text: &str) -> Result<()> {
        let inner = self.inner_of(sheet)?;
        if inner.complete {
            return Err(CssomError::InvalidState("sheet is already complete"));
        }
        let allow_unsafe = self.allows_unsafe_rules(sheet);
        let mut rules =
            self.with_parse_context(sheet, allow_unsafe, |parser, ctx| parser.parse_sheet(text, ctx))?;
        self.inner_of_mut(sheet)?.rules.try_reserve(rules.len())?;
        self.adopt_rules(sheet, &mut rules, None);
        let count = rules.len();
        let inner = self.inner_of_mut(sheet)?;
        inner.rules.append(&mut rules);
        inner.rebuild_namespaces();
        self.rebuild_child_list(sheet)?;
        debug!(?sheet, rules = count, "loaded sheet text");
        Ok(())
    }

    // ---------- Shared plumbing ----------

    /// Full sheet parses under the system principal may use privileged rules.
    pub(crate) fn allows_unsafe_rules(&self, sheet: SheetId) -> bool {
        self.config.allow_unsafe_rules_for_system
            && self.inner(sheet).is_some_and(|i| i.principal.is_system())
    }

    pub(crate) fn with_parse_context<T>(
        &self,
        sheet: SheetId,
        allow_unsafe_rules: bool,
        parse: impl FnOnce(&dyn RuleParser, &ParseContext<'_>) -> T,
    ) -> Result<T> {
        let inner = self.inner_of(sheet)?;
        let ctx = ParseContext::new(&inner.principal)
            .with_uris(inner.sheet_uri.as_ref(), inner.base_uri.as_ref())
            .with_namespaces(inner.namespaces.as_ref())
            .with_unsafe_rules(allow_unsafe_rules);
        Ok(parse(self.parser.as_ref(), &ctx))
    }

    /// Give freshly parsed rules ids, point them at the sheet, and start
    /// loading their imports.
    pub(crate) fn adopt_rules(&mut self, sheet: SheetId, rules: &mut [Rule], parent: Option<RuleId>) {
        let owner = self
            .inner(sheet)
            .and_then(StyleSheetInner::primary)
            .unwrap_or(sheet);
        for rule in rules.iter_mut() {
            rule.assign_ids(&mut self.next_rule_id, parent);
            rule.set_sheet(Some(owner));
            if rule.as_import().is_some() {
                self.create_import_child(owner, rule);
            }
        }
    }

    /// Whether `candidate` is `sheet` or one of its ancestors.
    fn is_ancestor_or_self(&self, candidate: SheetId, sheet: SheetId) -> bool {
        let mut current = Some(sheet);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn import_depth(&self, sheet: SheetId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(sheet);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Create the child sheet for an `@import` and hand it to the loader.
    fn create_import_child(&mut self, parent: SheetId, rule: &mut Rule) {
        let Some(loader) = self.loader.clone() else {
            return;
        };
        let depth = self.import_depth(parent) + 1;
        if depth > self.config.max_import_depth {
            debug!(?parent, depth, "@import nested too deeply; not loading");
            return;
        }
        let rule_id = rule.id();
        let Some(import) = rule.as_import_mut() else {
            return;
        };
        let Ok(parent_inner) = self.inner_of(parent) else {
            return;
        };
        let base = parent_inner.base_uri.as_ref().or(parent_inner.sheet_uri.as_ref());
        let url = resolve_href(base, &import.href);
        let cors_mode = parent_inner.cors_mode;
        let document = self.sheets.get(parent).and_then(|s| s.document.clone());

        let child = self.create_sheet();
        if let Some(c) = self.sheets.get_mut(child) {
            c.parent = Some(parent);
            c.owner_rule = Some(rule_id);
            c.document = document;
            c.media = import.media.clone();
        }
        if let Ok(inner) = self.inner_of_mut(child) {
            inner.sheet_uri = url.clone();
            inner.original_uri = url.clone();
            inner.base_uri = url.clone();
            inner.cors_mode = cors_mode;
            if let Some(url) = &url {
                inner.principal = Principal::from_url(url);
            }
        }
        import.child = Some(child);

        let request = ImportRequest {
            parent,
            child,
            url,
            href: import.href.clone(),
            media: import.media.clone(),
        };
        debug!(?parent, ?child, href = %request.href, "requesting @import load");
        if let Err(err) = loader.load_child_sheet(&request) {
            debug!(?child, error = %err, "loader refused @import");
        }
    }

    /// Recompute the child list: import children in rule order, then sheets
    /// appended directly.
    pub(crate) fn rebuild_child_list(&mut self, sheet: SheetId) -> Result<()> {
        let inner = self.inner_of(sheet)?;
        let mut children: Vec<SheetId> = inner
            .import_children()
            .map(|(_, child)| child)
            .filter(|&child| self.sheets.contains_key(child))
            .collect();
        for &child in &inner.children {
            if !children.contains(&child)
                && self.sheets.get(child).is_some_and(|c| c.owner_rule.is_none())
            {
                children.push(child);
            }
        }
        self.inner_of_mut(sheet)?.children = children;
        Ok(())
    }

    /// Whether `rule` is an `@import` whose child sheet is still loading.
    pub(crate) fn has_pending_child(&self, rule: &Rule) -> bool {
        rule.as_import()
            .and_then(|import| import.child_sheet())
            .and_then(|child| self.inner(child))
            .is_some_and(|inner| !inner.complete)
    }
}
