//! Style sheets: the [`Cssom`] arena, shared inners, the mutation protocol,
//! origin checks and the collaborators notified along the way.

pub mod cssom;
pub mod inner;
pub mod mutation;
pub mod observer;
pub mod outer;
pub mod rule_list;
pub mod security;

pub use cssom::{Cssom, UniqueInner};
pub use inner::{InnerId, StyleSheetInner};
pub use mutation::MediaTarget;
pub use observer::{
    DocumentObserver, ImportRequest, LoadError, Loader, RuleProcessor, RuleProcessorRegistry,
    UpdateBatch,
};
pub use outer::{OwnerNode, SheetId, StyleSheet};
pub use rule_list::RuleListView;
pub use security::{Caller, CorsMode, Principal};
