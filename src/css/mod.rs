//! CSS text layer: tokenizer, parser, selectors, specificity, declarations, namespaces.

pub mod declaration;
pub mod namespace;
pub mod parser;
pub mod selector;
pub mod serialize;
pub mod specificity;
pub mod tokenizer;

pub use declaration::{ComponentValue, Declaration, PropertyDeclaration};
pub use namespace::{NameSpaceMap, Namespace};
pub use parser::{parse_media_list, CssParser, ParseContext, ParseError, RuleParser};
pub use selector::{
    AttrOperator, AttrSelector, Combinator, CompoundSelector, PseudoClass, PseudoClassArg,
    Selector, SelectorList,
};
pub use specificity::Specificity;
