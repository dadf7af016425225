//! The shared, copy-on-write rule store behind one or more outer sheets.

use slotmap::new_key_type;
use url::Url;

use crate::css::namespace::NameSpaceMap;
use crate::error::Result;
use crate::rules::{NamespaceRule, Rule, RuleId, RuleKind};
use crate::sheet::security::{CorsMode, Principal};
use crate::sheet::SheetId;

new_key_type! {
    pub struct InnerId;
}

/// Rules, namespaces, URIs and origin shared by every sheet in `sheets`.
///
/// `sheets[0]` is the primary owner: top-level rules and child sheets point
/// back at it.
#[derive(Debug)]
pub struct StyleSheetInner {
    pub(crate) sheets: Vec<SheetId>,
    pub(crate) rules: Vec<Rule>,
    /// Child sheets from `@import` rules, in rule order, then any appended directly.
    pub(crate) children: Vec<SheetId>,
    /// `None` until an `@namespace` rule is seen.
    pub(crate) namespaces: Option<NameSpaceMap>,
    pub(crate) sheet_uri: Option<Url>,
    pub(crate) original_uri: Option<Url>,
    pub(crate) base_uri: Option<Url>,
    pub(crate) principal: Principal,
    pub(crate) cors_mode: CorsMode,
    pub(crate) complete: bool,
}

impl StyleSheetInner {
    pub(crate) fn new(owner: SheetId, principal: Principal, cors_mode: CorsMode) -> Self {
        Self {
            sheets: vec![owner],
            rules: Vec::new(),
            children: Vec::new(),
            namespaces: None,
            sheet_uri: None,
            original_uri: None,
            base_uri: None,
            principal,
            cors_mode,
            complete: false,
        }
    }

    /// A private copy for `owner`.
    ///
    /// Rules keep their ids and point at `owner`. Children are left empty
    /// for the caller to fill with fresh sheets, and the namespace map is
    /// rebuilt from the copied rules.
    pub(crate) fn clone_for(&self, owner: SheetId) -> Result<Self> {
        let mut rules = Vec::new();
        rules.try_reserve_exact(self.rules.len())?;
        rules.extend(self.rules.iter().map(|rule| {
            let mut copy = rule.clone();
            copy.set_sheet(Some(owner));
            copy
        }));
        let mut clone = Self {
            sheets: vec![owner],
            rules,
            children: Vec::new(),
            namespaces: None,
            sheet_uri: self.sheet_uri.clone(),
            original_uri: self.original_uri.clone(),
            base_uri: self.base_uri.clone(),
            principal: self.principal.clone(),
            cors_mode: self.cors_mode,
            complete: self.complete,
        };
        clone.rebuild_namespaces();
        Ok(clone)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn children(&self) -> &[SheetId] {
        &self.children
    }

    pub fn owners(&self) -> &[SheetId] {
        &self.sheets
    }

    pub fn primary(&self) -> Option<SheetId> {
        self.sheets.first().copied()
    }

    pub fn namespaces(&self) -> Option<&NameSpaceMap> {
        self.namespaces.as_ref()
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn cors_mode(&self) -> CorsMode {
        self.cors_mode
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn index_of(&self, id: RuleId) -> Option<usize> {
        self.rules.iter().position(|r| r.id() == id)
    }

    /// Recreate the namespace map from the leading `@namespace` rules.
    pub(crate) fn rebuild_namespaces(&mut self) {
        let mut map: Option<NameSpaceMap> = None;
        for rule in &self.rules {
            match rule.kind() {
                RuleKind::Charset | RuleKind::Import => {}
                RuleKind::Namespace => {
                    if let Some(ns) = rule.as_namespace() {
                        map.get_or_insert_with(NameSpaceMap::new)
                            .add_prefix(ns.prefix.as_deref(), &ns.url);
                    }
                }
                _ => break,
            }
        }
        self.namespaces = map;
    }

    pub(crate) fn register_namespace_rule(&mut self, rule: &NamespaceRule) {
        self.namespaces
            .get_or_insert_with(NameSpaceMap::new)
            .add_prefix(rule.prefix.as_deref(), &rule.url);
    }

    /// Child sheets referenced by top-level `@import` rules, in rule order.
    pub(crate) fn import_children(&self) -> impl Iterator<Item = (RuleId, SheetId)> + '_ {
        self.rules.iter().filter_map(|rule| {
            rule.as_import()
                .and_then(|import| import.child_sheet())
                .map(|child| (rule.id(), child))
        })
    }
}
