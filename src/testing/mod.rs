//! Headless test doubles: a recording document, counting rule processors,
//! and a loader that remembers what it was asked to fetch.
//!
//! Use [`RecordingDocument`] to assert the exact notification sequence a
//! mutation produces, and [`RecordingLoader`] to drive `@import` loading by
//! hand.

pub mod loader;
pub mod recorder;

pub use loader::RecordingLoader;
pub use recorder::{CountingProcessor, DocEvent, RecordingDocument};
