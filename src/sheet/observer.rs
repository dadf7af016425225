//! Collaborators the object model talks to: the owning document, rule
//! processors caching match data, and the loader fetching `@import`s.
//!
//! All of them are held weakly or shared through `Rc`. The model runs on a
//! single thread and never calls back into itself from a notification.

use std::fmt;
use std::rc::{Rc, Weak};

use url::Url;

use crate::error::{CssomError, Result};
use crate::media::query::MediaList;
use crate::rules::Rule;
use crate::sheet::SheetId;

/// The document owning a set of sheets.
///
/// Every externally visible mutation is wrapped in
/// `begin_update`/`end_update`.
pub trait DocumentObserver {
    fn begin_update(&self) {}
    fn end_update(&self) {}
    fn style_rule_added(&self, _sheet: SheetId, _rule: &Rule) {}
    fn style_rule_removed(&self, _sheet: SheetId, _rule: &Rule) {}
    /// `None` for both rules means "something about the sheet changed",
    /// such as its media list.
    fn style_rule_changed(&self, _sheet: SheetId, _old: Option<&Rule>, _new: Option<&Rule>) {}
    fn style_sheet_applicable_state_changed(&self, _sheet: SheetId, _applicable: bool) {}
}

/// A consumer caching rule-cascade data computed from a sheet.
pub trait RuleProcessor {
    fn clear_rule_cascades(&self);
}

/// Weak registry of the rule processors built from one sheet.
#[derive(Debug, Default)]
pub struct RuleProcessorRegistry {
    processors: Vec<Weak<dyn RuleProcessor>>,
}

impl RuleProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, processor: &Rc<dyn RuleProcessor>) -> Result<()> {
        let weak = Rc::downgrade(processor);
        if self.processors.iter().any(|p| Weak::ptr_eq(p, &weak)) {
            return Err(CssomError::InvalidState("rule processor already registered"));
        }
        self.processors.push(weak);
        Ok(())
    }

    pub fn drop_processor(&mut self, processor: &Rc<dyn RuleProcessor>) -> Result<()> {
        let weak = Rc::downgrade(processor);
        match self.processors.iter().position(|p| Weak::ptr_eq(p, &weak)) {
            Some(pos) => {
                self.processors.remove(pos);
                Ok(())
            }
            None => Err(CssomError::NotFound("rule processor".into())),
        }
    }

    /// Tell every live processor to drop its cascade. Dead entries are pruned.
    pub fn notify_all(&mut self) {
        self.processors.retain(|p| match p.upgrade() {
            Some(processor) => {
                processor.clear_rule_cascades();
                true
            }
            None => false,
        });
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

/// A request to fetch the sheet behind an `@import`.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// The importing sheet.
    pub parent: SheetId,
    /// The building sheet created for the import. Feed it with
    /// [`Cssom::load_text`](crate::sheet::Cssom::load_text), mark it complete,
    /// then report back through
    /// [`Cssom::style_sheet_loaded`](crate::sheet::Cssom::style_sheet_loaded).
    pub child: SheetId,
    /// `href` resolved against the importing sheet's base URI.
    pub url: Option<Url>,
    pub href: String,
    pub media: MediaList,
}

/// Why an import could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("style sheet load failed: {0}")]
pub struct LoadError(pub String);

/// Fetches imported sheets on the model's behalf.
pub trait Loader {
    fn load_child_sheet(&self, request: &ImportRequest) -> std::result::Result<(), LoadError>;
}

/// Scoped `begin_update`/`end_update` bracket around a mutation batch.
pub struct UpdateBatch {
    document: Option<Rc<dyn DocumentObserver>>,
}

impl UpdateBatch {
    pub fn new(document: Option<Rc<dyn DocumentObserver>>) -> Self {
        if let Some(doc) = &document {
            doc.begin_update();
        }
        Self { document }
    }
}

impl Drop for UpdateBatch {
    fn drop(&mut self) {
        if let Some(doc) = &self.document {
            doc.end_update();
        }
    }
}

impl fmt::Debug for UpdateBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateBatch")
            .field("has_document", &self.document.is_some())
            .finish()
    }
}
