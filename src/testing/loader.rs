//! A loader that queues `@import` requests for the test to fulfil.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::sheet::{ImportRequest, LoadError, Loader};

/// Records every [`ImportRequest`] and optionally refuses them.
///
/// Tests complete a load by hand: feed the child with
/// [`Cssom::load_text`](crate::sheet::Cssom::load_text), mark it complete and
/// call [`Cssom::style_sheet_loaded`](crate::sheet::Cssom::style_sheet_loaded).
#[derive(Debug, Default)]
pub struct RecordingLoader {
    requests: RefCell<Vec<ImportRequest>>,
    refuse: Cell<bool>,
}

impl RecordingLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn as_loader(self: &Rc<Self>) -> Rc<dyn Loader> {
        self.clone()
    }

    /// Make later requests fail. The request is still recorded.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.set(refuse);
    }

    pub fn requests(&self) -> Vec<ImportRequest> {
        self.requests.borrow().clone()
    }

    pub fn take_requests(&self) -> Vec<ImportRequest> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }
}

impl Loader for RecordingLoader {
    fn load_child_sheet(&self, request: &ImportRequest) -> Result<(), LoadError> {
        self.requests.borrow_mut().push(request.clone());
        if self.refuse.get() {
            return Err(LoadError(format!("refused {}", request.href)));
        }
        Ok(())
    }
}
