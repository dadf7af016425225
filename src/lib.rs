//! # gilt-cssom
//!
//! A CSS style sheet object model: parsed rules, selectors with weighted
//! specificity, media queries with cacheable evaluation, and sheets that share
//! their rule storage copy-on-write until a CSSOM mutation forces a private copy.
//!
//! Every mutation runs inside a will-dirty/did-dirty bracket that invalidates
//! the registered rule processors of the sheet and of every ancestor sheet, and
//! reports added, removed and changed rules to the owning document.
//!
//! ## Core Systems
//!
//! - **[`css`]**: Tokenizer, recursive-descent parser, selectors, specificity, declarations
//! - **[`media`]**: Media features, expressions, queries, lists, and result cache keys
//! - **[`rules`]**: The closed `Rule` sum type: style rules, group rules, at-rules
//! - **[`sheet`]**: The `Cssom` arena, shared inners, mutation protocol, origin checks
//! - **[`testing`]**: Recording document, counting rule processors, manual loader
//! - **[`config`]** / **[`error`]**: Arena defaults and the error taxonomy
//!
//! ## Example
//!
//! ```
//! use gilt_cssom::sheet::{Caller, Cssom};
//!
//! let mut cssom = Cssom::new();
//! let sheet = cssom.create_sheet();
//! cssom.load_text(sheet, "a { color: red }").unwrap();
//! cssom.set_complete(sheet).unwrap();
//!
//! cssom.insert_rule(sheet, "div > p { margin: 0 }", 1, &Caller::chrome()).unwrap();
//! let rules = cssom.css_rules(sheet, &Caller::chrome()).unwrap();
//! assert_eq!(rules.css_text(1).as_deref(), Some("div > p { margin: 0; }"));
//! ```

// Foundation
pub mod config;
pub mod error;

// CSS text and media
pub mod css;
pub mod media;

// Object model
pub mod rules;
pub mod sheet;

// Test doubles
pub mod testing;

pub use config::CssomConfig;
pub use error::{CssomError, Result};
pub use rules::{Rule, RuleBody, RuleId, RuleKind};
pub use sheet::{Caller, Cssom, SheetId};
