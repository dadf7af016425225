//! The per-reference-site sheet handle.

use std::rc::{Rc, Weak};

use slotmap::new_key_type;

use crate::media::query::MediaList;
use crate::rules::RuleId;
use crate::sheet::inner::InnerId;
use crate::sheet::observer::{DocumentObserver, RuleProcessorRegistry};

new_key_type! {
    /// Handle to a sheet inside a [`Cssom`](crate::sheet::Cssom).
    pub struct SheetId;
}

/// Opaque identity of the DOM node (`<link>`, `<style>`) owning a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerNode(pub u64);

/// One outer sheet. Several may share a [`StyleSheetInner`](crate::sheet::StyleSheetInner).
#[derive(Debug)]
pub struct StyleSheet {
    pub(crate) title: Option<String>,
    pub(crate) parent: Option<SheetId>,
    /// The `@import` rule in the parent that created this sheet.
    pub(crate) owner_rule: Option<RuleId>,
    pub(crate) document: Option<Weak<dyn DocumentObserver>>,
    pub(crate) owner_node: Option<OwnerNode>,
    pub(crate) disabled: bool,
    /// Set once the sheet has been modified through the CSSOM.
    pub(crate) dirty: bool,
    pub(crate) media: MediaList,
    pub(crate) processors: RuleProcessorRegistry,
    pub(crate) inner: InnerId,
}

impl StyleSheet {
    pub(crate) fn new(inner: InnerId) -> Self {
        Self {
            title: None,
            parent: None,
            owner_rule: None,
            document: None,
            owner_node: None,
            disabled: false,
            dirty: false,
            media: MediaList::new(),
            processors: RuleProcessorRegistry::new(),
            inner,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn parent(&self) -> Option<SheetId> {
        self.parent
    }

    pub fn owner_rule(&self) -> Option<RuleId> {
        self.owner_rule
    }

    pub fn owner_node(&self) -> Option<OwnerNode> {
        self.owner_node
    }

    /// The owning document, if it is still alive.
    pub fn document(&self) -> Option<Rc<dyn DocumentObserver>> {
        self.document.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn media(&self) -> &MediaList {
        &self.media
    }

    pub fn rule_processor_count(&self) -> usize {
        self.processors.len()
    }
}
