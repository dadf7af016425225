//! Observers that record what the object model tells them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::rules::Rule;
use crate::sheet::{DocumentObserver, RuleProcessor, SheetId};

// ---------------------------------------------------------------------------
// DocEvent
// ---------------------------------------------------------------------------

/// One notification received by a [`RecordingDocument`].
///
/// Rules are captured as their serialization at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocEvent {
    BeginUpdate,
    EndUpdate,
    RuleAdded { sheet: SheetId, rule: String },
    RuleRemoved { sheet: SheetId, rule: String },
    RuleChanged {
        sheet: SheetId,
        old: Option<String>,
        new: Option<String>,
    },
    ApplicableState { sheet: SheetId, applicable: bool },
}

// ---------------------------------------------------------------------------
// RecordingDocument
// ---------------------------------------------------------------------------

/// A [`DocumentObserver`] that appends every call to an event log.
///
/// # Examples
///
/// ```
/// use gilt_cssom::sheet::Cssom;
/// use gilt_cssom::testing::{DocEvent, RecordingDocument};
///
/// let doc = RecordingDocument::new();
/// let mut cssom = Cssom::new();
/// let sheet = cssom.create_sheet();
/// cssom.set_owning_document(sheet, Some(&doc.as_observer())).unwrap();
/// cssom.set_complete(sheet).unwrap();
/// assert!(doc.events().contains(&DocEvent::ApplicableState { sheet, applicable: true }));
/// ```
#[derive(Debug, Default)]
pub struct RecordingDocument {
    events: RefCell<Vec<DocEvent>>,
}

impl RecordingDocument {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// The same document as a trait object, for attaching to sheets.
    pub fn as_observer(self: &Rc<Self>) -> Rc<dyn DocumentObserver> {
        self.clone()
    }

    pub fn events(&self) -> Vec<DocEvent> {
        self.events.borrow().clone()
    }

    /// Drain the log.
    pub fn take_events(&self) -> Vec<DocEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Serializations of every added rule, in order.
    pub fn added(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                DocEvent::RuleAdded { rule, .. } => Some(rule.clone()),
                _ => None,
            })
            .collect()
    }

    /// Serializations of every removed rule, in order.
    pub fn removed(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                DocEvent::RuleRemoved { rule, .. } => Some(rule.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether every `BeginUpdate` is closed by an `EndUpdate`, never going negative.
    pub fn batches_balanced(&self) -> bool {
        let mut depth: i64 = 0;
        for event in self.events.borrow().iter() {
            match event {
                DocEvent::BeginUpdate => depth += 1,
                DocEvent::EndUpdate => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
        }
        depth == 0
    }

    fn push(&self, event: DocEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl DocumentObserver for RecordingDocument {
    fn begin_update(&self) {
        self.push(DocEvent::BeginUpdate);
    }

    fn end_update(&self) {
        self.push(DocEvent::EndUpdate);
    }

    fn style_rule_added(&self, sheet: SheetId, rule: &Rule) {
        self.push(DocEvent::RuleAdded {
            sheet,
            rule: rule.css_text(None),
        });
    }

    fn style_rule_removed(&self, sheet: SheetId, rule: &Rule) {
        self.push(DocEvent::RuleRemoved {
            sheet,
            rule: rule.css_text(None),
        });
    }

    fn style_rule_changed(&self, sheet: SheetId, old: Option<&Rule>, new: Option<&Rule>) {
        self.push(DocEvent::RuleChanged {
            sheet,
            old: old.map(|r| r.css_text(None)),
            new: new.map(|r| r.css_text(None)),
        });
    }

    fn style_sheet_applicable_state_changed(&self, sheet: SheetId, applicable: bool) {
        self.push(DocEvent::ApplicableState { sheet, applicable });
    }
}

// ---------------------------------------------------------------------------
// CountingProcessor
// ---------------------------------------------------------------------------

/// A [`RuleProcessor`] that counts cascade invalidations.
#[derive(Debug, Default)]
pub struct CountingProcessor {
    clears: Cell<usize>,
}

impl CountingProcessor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn as_processor(self: &Rc<Self>) -> Rc<dyn RuleProcessor> {
        self.clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.get()
    }
}

impl RuleProcessor for CountingProcessor {
    fn clear_rule_cascades(&self) {
        self.clears.set(self.clears.get() + 1);
    }
}
