//! CSS rules as a closed sum type.
//!
//! Every rule carries a [`RuleId`], a back-reference to the sheet whose inner
//! holds it, and the id of its enclosing group rule, if any. Ids are handed
//! out when a rule is adopted into a sheet; copy-on-write clones keep them.

pub mod at_rules;
pub mod group;
pub mod style_rule;

pub use at_rules::{CharsetRule, FontFaceRule, ImportRule, Keyframe, KeyframesRule, NamespaceRule, PageRule};
pub use group::{DocumentCondition, DocumentMatch, DocumentRule, GroupRule, MediaRule, SupportsRule};
pub use style_rule::{ImportantRule, StyleRule};

use crate::css::namespace::NameSpaceMap;
use crate::sheet::SheetId;

/// Identity of a rule within the sheets that can see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u64);

impl RuleId {
    /// Placeholder carried by parsed rules until a sheet adopts them.
    pub const UNASSIGNED: RuleId = RuleId(0);

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

/// Discriminant used for structural ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Charset,
    Import,
    Namespace,
    Style,
    Media,
    FontFace,
    Page,
    Keyframes,
    Document,
    Supports,
}

impl RuleKind {
    /// Whether the kind may appear inside a group rule.
    pub fn is_ruleset_compatible(self) -> bool {
        match self {
            RuleKind::Style
            | RuleKind::Media
            | RuleKind::FontFace
            | RuleKind::Page
            | RuleKind::Keyframes
            | RuleKind::Document
            | RuleKind::Supports => true,
            RuleKind::Charset | RuleKind::Import | RuleKind::Namespace => false,
        }
    }

    /// Kinds that may precede an `@import`.
    pub fn may_precede_import(self) -> bool {
        matches!(self, RuleKind::Charset | RuleKind::Import)
    }

    /// Kinds that may precede an `@namespace`.
    pub fn may_precede_namespace(self) -> bool {
        matches!(self, RuleKind::Charset | RuleKind::Import | RuleKind::Namespace)
    }
}

#[derive(Debug, Clone)]
pub enum RuleBody {
    Style(StyleRule),
    Media(MediaRule),
    Import(ImportRule),
    Namespace(NamespaceRule),
    Charset(CharsetRule),
    FontFace(FontFaceRule),
    Page(PageRule),
    Keyframes(KeyframesRule),
    Document(DocumentRule),
    Supports(SupportsRule),
}

#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleId,
    sheet: Option<SheetId>,
    parent: Option<RuleId>,
    line: u32,
    body: RuleBody,
}

impl Rule {
    pub fn new(body: RuleBody) -> Self {
        Self {
            id: RuleId::UNASSIGNED,
            sheet: None,
            parent: None,
            line: 0,
            body,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    /// The sheet whose inner stores this rule; the primary owner when shared.
    pub fn sheet(&self) -> Option<SheetId> {
        self.sheet
    }

    pub fn parent_rule(&self) -> Option<RuleId> {
        self.parent
    }

    /// 1-based source line, or 0 when built programmatically.
    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn body(&self) -> &RuleBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut RuleBody {
        &mut self.body
    }

    pub fn kind(&self) -> RuleKind {
        match &self.body {
            RuleBody::Style(_) => RuleKind::Style,
            RuleBody::Media(_) => RuleKind::Media,
            RuleBody::Import(_) => RuleKind::Import,
            RuleBody::Namespace(_) => RuleKind::Namespace,
            RuleBody::Charset(_) => RuleKind::Charset,
            RuleBody::FontFace(_) => RuleKind::FontFace,
            RuleBody::Page(_) => RuleKind::Page,
            RuleBody::Keyframes(_) => RuleKind::Keyframes,
            RuleBody::Document(_) => RuleKind::Document,
            RuleBody::Supports(_) => RuleKind::Supports,
        }
    }

    pub fn as_style(&self) -> Option<&StyleRule> {
        match &self.body {
            RuleBody::Style(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_style_mut(&mut self) -> Option<&mut StyleRule> {
        match &mut self.body {
            RuleBody::Style(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_import(&self) -> Option<&ImportRule> {
        match &self.body {
            RuleBody::Import(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_import_mut(&mut self) -> Option<&mut ImportRule> {
        match &mut self.body {
            RuleBody::Import(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&NamespaceRule> {
        match &self.body {
            RuleBody::Namespace(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupRule> {
        match &self.body {
            RuleBody::Media(m) => Some(&m.group),
            RuleBody::Document(d) => Some(&d.group),
            RuleBody::Supports(s) => Some(&s.group),
            _ => None,
        }
    }

    pub(crate) fn as_group_mut(&mut self) -> Option<&mut GroupRule> {
        match &mut self.body {
            RuleBody::Media(m) => Some(&mut m.group),
            RuleBody::Document(d) => Some(&mut d.group),
            RuleBody::Supports(s) => Some(&mut s.group),
            _ => None,
        }
    }

    pub fn css_text(&self, namespaces: Option<&NameSpaceMap>) -> String {
        match &self.body {
            RuleBody::Style(s) => s.css_text(namespaces),
            RuleBody::Media(m) => m.css_text(namespaces),
            RuleBody::Import(i) => i.css_text(),
            RuleBody::Namespace(n) => n.css_text(),
            RuleBody::Charset(c) => c.css_text(),
            RuleBody::FontFace(f) => f.css_text(),
            RuleBody::Page(p) => p.css_text(),
            RuleBody::Keyframes(k) => k.css_text(),
            RuleBody::Document(d) => d.css_text(namespaces),
            RuleBody::Supports(s) => s.css_text(namespaces),
        }
    }

    /// Give this rule and any unassigned descendants fresh ids.
    pub(crate) fn assign_ids(&mut self, next_id: &mut u64, parent: Option<RuleId>) {
        if !self.id.is_assigned() {
            *next_id += 1;
            self.id = RuleId(*next_id);
        }
        self.parent = parent;
        let id = self.id;
        if let Some(group) = self.as_group_mut() {
            for child in group.rules_mut() {
                child.assign_ids(next_id, Some(id));
            }
        }
    }

    /// Point this rule and its descendants at `sheet`.
    pub(crate) fn set_sheet(&mut self, sheet: Option<SheetId>) {
        self.sheet = sheet;
        if let Some(group) = self.as_group_mut() {
            for child in group.rules_mut() {
                child.set_sheet(sheet);
            }
        }
    }
}

/// Depth-first search for a rule by id.
pub fn find_rule(rules: &[Rule], id: RuleId) -> Option<&Rule> {
    for rule in rules {
        if rule.id == id {
            return Some(rule);
        }
        if let Some(found) = rule.as_group().and_then(|g| find_rule(g.rules(), id)) {
            return Some(found);
        }
    }
    None
}

pub(crate) fn find_rule_mut(rules: &mut [Rule], id: RuleId) -> Option<&mut Rule> {
    for rule in rules.iter_mut() {
        if rule.id == id {
            return Some(rule);
        }
        if let Some(group) = rule.as_group_mut() {
            if let Some(found) = find_rule_mut(group.rules_mut(), id) {
                return Some(found);
            }
        }
    }
    None
}
