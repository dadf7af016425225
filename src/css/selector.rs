//! Selector data model.
//!
//! A [`Selector`] is a chain of [`CompoundSelector`]s stored right-to-left:
//! index 0 is the key (subject) compound, and each later entry sits further
//! left in the source text. Every compound except the leftmost carries the
//! [`Combinator`] that joins it to its left neighbour.
//!
//! Pseudo-elements are stored as an extra key compound whose `tag` is the
//! pseudo-element name, joined to the element it applies to by
//! [`Combinator::Child`]. Serialization writes no combinator before them.

use crate::css::namespace::{NameSpaceMap, Namespace};
use crate::css::serialize::{write_ident, write_string};
use crate::css::specificity::Specificity;

/// Combinator joining a compound to the compound on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Whitespace: `A B`.
    Descendant,
    /// `A > B`.
    Child,
    /// `A + B`.
    NextSibling,
    /// `A ~ B`.
    LaterSibling,
}

impl Combinator {
    pub fn as_char(self) -> char {
        match self {
            Combinator::Descendant => ' ',
            Combinator::Child => '>',
            Combinator::NextSibling => '+',
            Combinator::LaterSibling => '~',
        }
    }
}

/// Comparison performed by an attribute selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOperator {
    /// `[attr]`
    Exists,
    /// `[attr=value]`
    Equals,
    /// `[attr~=value]`
    Includes,
    /// `[attr|=value]`
    DashMatch,
    /// `[attr^=value]`
    Prefix,
    /// `[attr$=value]`
    Suffix,
    /// `[attr*=value]`
    Substring,
}

impl AttrOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            AttrOperator::Exists => "",
            AttrOperator::Equals => "=",
            AttrOperator::Includes => "~=",
            AttrOperator::DashMatch => "|=",
            AttrOperator::Prefix => "^=",
            AttrOperator::Suffix => "$=",
            AttrOperator::Substring => "*=",
        }
    }
}

/// An attribute selector such as `[xlink|href^="http"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub namespace: Namespace,
    /// Attribute name as written.
    pub name: String,
    pub op: AttrOperator,
    pub value: String,
    /// Whether the value comparison is case sensitive.
    pub case_sensitive: bool,
}

impl AttrSelector {
    /// `[name]` with no namespace.
    pub fn exists(name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::None,
            name: name.into(),
            op: AttrOperator::Exists,
            value: String::new(),
            case_sensitive: true,
        }
    }

    /// `[name <op> "value"]` with no namespace.
    pub fn with_value(name: impl Into<String>, op: AttrOperator, value: impl Into<String>) -> Self {
        Self {
            op,
            value: value.into(),
            ..Self::exists(name)
        }
    }

    pub fn lowercase_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }
}

/// Argument carried by a pseudo-class.
#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClassArg {
    None,
    /// `:lang(en)`
    Ident(String),
    /// `:nth-child(an+b)`
    Nth { a: i32, b: i32 },
    /// `:-moz-any(a, b)`
    Selectors(SelectorList),
}

/// A pseudo-class, stored without its leading colon.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoClass {
    pub name: String,
    pub arg: PseudoClassArg,
}

impl PseudoClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg: PseudoClassArg::None,
        }
    }

    pub fn with_arg(name: impl Into<String>, arg: PseudoClassArg) -> Self {
        Self {
            name: name.into(),
            arg,
        }
    }

    fn write_css(&self, dest: &mut String, namespaces: Option<&NameSpaceMap>) {
        dest.push(':');
        write_ident(dest, &self.name);
        match &self.arg {
            PseudoClassArg::None => {}
            PseudoClassArg::Ident(value) => {
                dest.push('(');
                write_ident(dest, value);
                dest.push(')');
            }
            PseudoClassArg::Nth { a, b } => {
                dest.push('(');
                write_nth(dest, *a, *b);
                dest.push(')');
            }
            PseudoClassArg::Selectors(list) => {
                dest.push('(');
                list.write_css(dest, namespaces);
                dest.push(')');
            }
        }
    }
}

/// Write an `an+b` pair in its shortest form.
fn write_nth(dest: &mut String, a: i32, b: i32) {
    if a != 0 {
        match a {
            -1 => dest.push('-'),
            1 => {}
            _ => dest.push_str(&a.to_string()),
        }
        dest.push('n');
    }
    if b != 0 || a == 0 {
        if b >= 0 && a != 0 {
            dest.push('+');
        }
        dest.push_str(&b.to_string());
    }
}

/// Pseudo-elements that CSS2 allowed with a single colon.
const CSS2_PSEUDO_ELEMENTS: &[&str] = &["before", "after", "first-line", "first-letter"];

pub fn is_css2_pseudo_element(name: &str) -> bool {
    CSS2_PSEUDO_ELEMENTS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name))
}

/// One compound selector: a run of simple selectors with no combinator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundSelector {
    pub namespace: Namespace,
    /// Type selector as written, or the pseudo-element name. `None` is universal.
    pub tag: Option<String>,
    /// Whether `tag` names a pseudo-element.
    pub pseudo_element: bool,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub pseudo_classes: Vec<PseudoClass>,
    pub attributes: Vec<AttrSelector>,
    /// `:not(...)` arguments. Each is a single compound with no negations of its own.
    pub(crate) negations: Vec<CompoundSelector>,
    /// Combinator joining this compound to the next one in the chain. `None` only on the last.
    pub combinator: Option<Combinator>,
}

impl CompoundSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn pseudo_element(name: impl Into<String>) -> Self {
        Self {
            tag: Some(name.into()),
            pseudo_element: true,
            ..Self::default()
        }
    }

    pub fn is_pseudo_element(&self) -> bool {
        self.pseudo_element
    }

    pub fn lowercase_tag(&self) -> Option<String> {
        self.tag.as_ref().map(|t| t.to_ascii_lowercase())
    }

    pub fn negations(&self) -> &[CompoundSelector] {
        &self.negations
    }

    /// Append a `:not()` argument.
    ///
    /// Returns `false` and leaves `self` untouched if `negation` has its own
    /// negations or a combinator.
    pub fn add_negation(&mut self, negation: CompoundSelector) -> bool {
        if !negation.negations.is_empty() || negation.combinator.is_some() {
            return false;
        }
        self.negations.push(negation);
        true
    }

    fn has_simple_selectors(&self) -> bool {
        !self.ids.is_empty()
            || !self.classes.is_empty()
            || !self.pseudo_classes.is_empty()
            || !self.attributes.is_empty()
    }

    /// Whether an explicit `*|` can be written for this compound.
    fn can_be_namespaced(&self, negated: bool) -> bool {
        !negated || !self.has_simple_selectors()
    }

    pub fn weight_without_negations(&self) -> i32 {
        Specificity::of_compound(self).weight()
    }

    /// Weight of this compound plus every negation.
    pub fn weight(&self) -> i32 {
        self.negations
            .iter()
            .fold(self.weight_without_negations(), |acc, n| {
                acc.wrapping_add(n.weight_without_negations())
            })
    }

    /// Copy of this compound, optionally without its negations.
    fn clone_shallow(&self, deep_negations: bool) -> CompoundSelector {
        let mut copy = self.clone();
        if !deep_negations {
            copy.negations.clear();
        }
        copy
    }

    /// Write the compound plus its `:not()` arguments.
    ///
    /// `has_next` tells whether a compound sits to the left of this one.
    fn write_with_negations(
        &self,
        dest: &mut String,
        namespaces: Option<&NameSpaceMap>,
        has_next: bool,
    ) {
        self.write_simple(dest, namespaces, has_next, false);
        for negation in &self.negations {
            dest.push_str(":not(");
            negation.write_simple(dest, namespaces, false, true);
            dest.push(')');
        }
    }

    fn write_simple(
        &self,
        dest: &mut String,
        namespaces: Option<&NameSpaceMap>,
        has_next: bool,
        negated: bool,
    ) {
        let mut wrote_namespace = false;
        if !self.pseudo_element || !has_next {
            match namespaces {
                None => {
                    if self.namespace == Namespace::None {
                        dest.push('|');
                        wrote_namespace = true;
                    }
                }
                Some(map) => {
                    if map.default_namespace() == self.namespace {
                        // Matches the default; nothing to write.
                    } else {
                        match &self.namespace {
                            Namespace::None => {
                                dest.push('|');
                                wrote_namespace = true;
                            }
                            Namespace::Url(url) => {
                                if let Some(prefix) = map.find_prefix(url) {
                                    write_ident(dest, prefix);
                                    dest.push('|');
                                    wrote_namespace = true;
                                }
                            }
                            Namespace::Any => {
                                if self.can_be_namespaced(negated) {
                                    dest.push_str("*|");
                                    wrote_namespace = true;
                                }
                            }
                        }
                    }
                }
            }
        }

        match &self.tag {
            None => {
                if wrote_namespace
                    || (!self.has_simple_selectors() && (negated || self.negations.is_empty()))
                {
                    dest.push('*');
                }
            }
            Some(tag) if self.pseudo_element => {
                if !has_next {
                    dest.push('*');
                }
                dest.push(':');
                if !is_css2_pseudo_element(tag) {
                    dest.push(':');
                }
                write_ident(dest, tag);
            }
            Some(tag) => write_ident(dest, tag),
        }

        for id in &self.ids {
            dest.push('#');
            write_ident(dest, id);
        }
        for class in &self.classes {
            dest.push('.');
            write_ident(dest, class);
        }
        for attr in &self.attributes {
            dest.push('[');
            match &attr.namespace {
                Namespace::Any => dest.push_str("*|"),
                Namespace::None => {}
                Namespace::Url(url) => {
                    if let Some(prefix) = namespaces.and_then(|m| m.find_prefix(url)) {
                        write_ident(dest, prefix);
                        dest.push('|');
                    }
                }
            }
            write_ident(dest, &attr.name);
            if attr.op != AttrOperator::Exists {
                dest.push_str(attr.op.as_str());
                write_string(dest, &attr.value);
            }
            dest.push(']');
        }
        for pseudo in &self.pseudo_classes {
            pseudo.write_css(dest, namespaces);
        }
    }
}

/// A complex selector: compounds stored key-first with a cached weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    compounds: Vec<CompoundSelector>,
    weight: i32,
}

impl Selector {
    /// Build a selector from compounds in storage order (key first).
    ///
    /// Returns `None` if the chain is empty, a non-last compound lacks a
    /// combinator, or the last compound has one.
    pub fn new(compounds: Vec<CompoundSelector>) -> Option<Self> {
        let last = compounds.len().checked_sub(1)?;
        for (i, compound) in compounds.iter().enumerate() {
            if compound.combinator.is_some() != (i != last) {
                return None;
            }
        }
        let weight = compounds
            .iter()
            .fold(0i32, |acc, c| acc.wrapping_add(c.weight()));
        Some(Self { compounds, weight })
    }

    /// A single-compound selector.
    pub fn from_compound(mut compound: CompoundSelector) -> Self {
        compound.combinator = None;
        let weight = compound.weight();
        Self {
            compounds: vec![compound],
            weight,
        }
    }

    /// Compounds in storage order: key first, leftmost last.
    pub fn compounds(&self) -> &[CompoundSelector] {
        &self.compounds
    }

    pub fn key(&self) -> &CompoundSelector {
        &self.compounds[0]
    }

    /// Cached specificity weight summed over the chain and its negations.
    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn calc_weight(&self) -> i32 {
        self.compounds
            .iter()
            .fold(0i32, |acc, c| acc.wrapping_add(c.weight()))
    }

    /// Clone with control over how much of the chain is copied.
    ///
    /// Without `deep_next` only the key compound is copied and it loses its
    /// combinator. Without `deep_negations` every copied compound drops its
    /// `:not()` arguments.
    pub fn clone_with(&self, deep_next: bool, deep_negations: bool) -> Selector {
        let compounds: Vec<CompoundSelector> = if deep_next {
            self.compounds
                .iter()
                .map(|c| c.clone_shallow(deep_negations))
                .collect()
        } else {
            let mut key = self.compounds[0].clone_shallow(deep_negations);
            key.combinator = None;
            vec![key]
        };
        let weight = compounds
            .iter()
            .fold(0i32, |acc, c| acc.wrapping_add(c.weight()));
        Selector { compounds, weight }
    }

    pub fn to_css(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut dest = String::new();
        self.write_css(&mut dest, namespaces);
        dest
    }

    /// Write the chain left-to-right, the reverse of storage order.
    pub fn write_css(&self, dest: &mut String, namespaces: Option<&NameSpaceMap>) {
        let last = self.compounds.len() - 1;
        for i in (0..=last).rev() {
            let compound = &self.compounds[i];
            if i != last && !compound.is_pseudo_element() {
                dest.push(' ');
                match compound.combinator {
                    Some(Combinator::Descendant) | None => {}
                    Some(c) => {
                        dest.push(c.as_char());
                        dest.push(' ');
                    }
                }
            }
            compound.write_with_negations(dest, namespaces, i != last);
        }
    }
}

/// Comma-separated alternatives, each with its own weight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectorList {
    pub selectors: Vec<Selector>,
}

impl SelectorList {
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Highest weight among the alternatives.
    pub fn max_weight(&self) -> i32 {
        self.selectors.iter().map(Selector::weight).max().unwrap_or(0)
    }

    pub fn to_css(&self, namespaces: Option<&NameSpaceMap>) -> String {
        let mut dest = String::new();
        self.write_css(&mut dest, namespaces);
        dest
    }

    pub fn write_css(&self, dest: &mut String, namespaces: Option<&NameSpaceMap>) {
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                dest.push_str(", ");
            }
            selector.write_css(dest, namespaces);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain(mut compounds: Vec<(CompoundSelector, Option<Combinator>)>) -> Selector {
        let built = compounds
            .drain(..)
            .map(|(mut c, comb)| {
                c.combinator = comb;
                c
            })
            .collect();
        Selector::new(built).expect("valid chain")
    }

    fn class(name: &str) -> CompoundSelector {
        let mut c = CompoundSelector::new();
        c.classes.push(name.into());
        c
    }

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn new_rejects_bad_combinator_layout() {
        assert!(Selector::new(vec![]).is_none());
        let mut lonely = CompoundSelector::with_tag("a");
        lonely.combinator = Some(Combinator::Child);
        assert!(Selector::new(vec![lonely]).is_none());
        assert!(Selector::new(vec![CompoundSelector::new(), CompoundSelector::new()]).is_none());
    }

    #[test]
    fn negation_cannot_nest() {
        let mut inner = class("a");
        inner.negations.push(class("b"));
        let mut outer = CompoundSelector::new();
        assert!(!outer.add_negation(inner));
        assert!(outer.negations().is_empty());
        assert!(outer.add_negation(class("c")));
        assert_eq!(outer.negations(), [class("c")].as_slice());
    }

    // ── Weight ───────────────────────────────────────────────────────

    #[test]
    fn weight_sums_chain_and_negations() {
        let mut key = CompoundSelector::with_tag("a");
        key.ids.push("x".into());
        key.add_negation(class("hidden"));
        let sel = chain(vec![
            (key, Some(Combinator::Child)),
            (class("nav"), None),
        ]);
        assert_eq!(sel.weight(), 0x010000 + 0x100 + 1 + 0x100);
        assert_eq!(sel.weight(), sel.calc_weight());
    }

    #[test]
    fn universal_contributes_nothing() {
        let sel = Selector::from_compound(CompoundSelector::new());
        assert_eq!(sel.weight(), 0);
    }

    // ── Clone ────────────────────────────────────────────────────────

    #[test]
    fn shallow_clone_keeps_only_key() {
        let mut key = class("k");
        key.add_negation(class("n"));
        let sel = chain(vec![
            (key, Some(Combinator::Descendant)),
            (CompoundSelector::with_tag("div"), None),
        ]);
        let shallow = sel.clone_with(false, false);
        assert_eq!(shallow.compounds().len(), 1);
        assert!(shallow.key().negations.is_empty());
        assert_eq!(shallow.key().combinator, None);
        assert_eq!(shallow.weight(), 0x100);

        let deep = sel.clone_with(true, true);
        assert_eq!(deep, sel);
    }

    // ── Serialization ────────────────────────────────────────────────

    #[test]
    fn combinators_written_once() {
        let sel = chain(vec![
            (CompoundSelector::with_tag("em"), Some(Combinator::LaterSibling)),
            (CompoundSelector::with_tag("p"), Some(Combinator::NextSibling)),
            (CompoundSelector::with_tag("h1"), Some(Combinator::Child)),
            (CompoundSelector::with_tag("div"), Some(Combinator::Descendant)),
            (CompoundSelector::with_tag("body"), None),
        ]);
        assert_eq!(sel.to_css(None), "body div > h1 + p ~ em");
    }

    #[test]
    fn universal_written_only_when_needed() {
        assert_eq!(Selector::from_compound(CompoundSelector::new()).to_css(None), "*");
        assert_eq!(Selector::from_compound(class("a")).to_css(None), ".a");

        let mut only_not = CompoundSelector::new();
        only_not.add_negation(class("b"));
        assert_eq!(Selector::from_compound(only_not).to_css(None), ":not(.b)");

        let mut not_universal = CompoundSelector::new();
        not_universal.add_negation(CompoundSelector::new());
        assert_eq!(Selector::from_compound(not_universal).to_css(None), ":not(*)");
    }

    #[test]
    fn simple_selector_order() {
        let mut c = CompoundSelector::with_tag("a");
        c.pseudo_classes.push(PseudoClass::new("hover"));
        c.attributes.push(AttrSelector::with_value("href", AttrOperator::Prefix, "http"));
        c.classes.push("ext".into());
        c.ids.push("top".into());
        assert_eq!(
            Selector::from_compound(c).to_css(None),
            r#"a#top.ext[href^="http"]:hover"#
        );
    }

    #[test]
    fn pseudo_element_has_no_combinator() {
        let sel = chain(vec![
            (CompoundSelector::pseudo_element("before"), Some(Combinator::Child)),
            (CompoundSelector::with_tag("p"), None),
        ]);
        assert_eq!(sel.to_css(None), "p:before");

        let sel = chain(vec![
            (CompoundSelector::pseudo_element("selection"), Some(Combinator::Child)),
            (class("x"), None),
        ]);
        assert_eq!(sel.to_css(None), ".x::selection");
    }

    #[test]
    fn lone_pseudo_element_gets_star() {
        let sel = Selector::from_compound(CompoundSelector::pseudo_element("selection"));
        assert_eq!(sel.to_css(None), "*::selection");
    }

    #[test]
    fn nth_formatting() {
        let cases = [
            ((2, 1), "2n+1"),
            ((-1, 3), "-n+3"),
            ((1, 0), "n"),
            ((-1, 0), "-n"),
            ((0, 5), "5"),
            ((0, 0), "0"),
            ((3, -2), "3n-2"),
        ];
        for ((a, b), expected) in cases {
            let mut out = String::new();
            write_nth(&mut out, a, b);
            assert_eq!(out, expected, "a={a} b={b}");
        }
    }

    #[test]
    fn pseudo_class_arguments() {
        let mut c = CompoundSelector::new();
        c.pseudo_classes
            .push(PseudoClass::with_arg("lang", PseudoClassArg::Ident("en".into())));
        c.pseudo_classes
            .push(PseudoClass::with_arg("nth-child", PseudoClassArg::Nth { a: 2, b: 1 }));
        let list = SelectorList::new(vec![
            Selector::from_compound(CompoundSelector::with_tag("a")),
            Selector::from_compound(class("b")),
        ]);
        c.pseudo_classes
            .push(PseudoClass::with_arg("-moz-any", PseudoClassArg::Selectors(list)));
        assert_eq!(
            Selector::from_compound(c).to_css(None),
            ":lang(en):nth-child(2n+1):-moz-any(a, .b)"
        );
    }

    // ── Namespaces ───────────────────────────────────────────────────

    #[test]
    fn null_namespace_without_map() {
        let mut c = CompoundSelector::with_tag("x");
        c.namespace = Namespace::None;
        assert_eq!(Selector::from_compound(c).to_css(None), "|x");
    }

    #[test]
    fn namespace_prefixes_with_map() {
        let mut map = NameSpaceMap::new();
        map.add_prefix(None, "html");
        map.add_prefix(Some("svg"), "svgns");

        let mut default_ns = CompoundSelector::with_tag("p");
        default_ns.namespace = Namespace::Url("html".into());
        assert_eq!(Selector::from_compound(default_ns).to_css(Some(&map)), "p");

        let mut svg = CompoundSelector::with_tag("rect");
        svg.namespace = Namespace::Url("svgns".into());
        assert_eq!(Selector::from_compound(svg).to_css(Some(&map)), "svg|rect");

        let mut any = class("c");
        any.namespace = Namespace::Any;
        assert_eq!(Selector::from_compound(any).to_css(Some(&map)), "*|*.c");
    }

    #[test]
    fn attribute_namespaces() {
        let mut map = NameSpaceMap::new();
        map.add_prefix(Some("xl"), "xlinkns");
        let mut c = CompoundSelector::new();
        let mut href = AttrSelector::exists("href");
        href.namespace = Namespace::Url("xlinkns".into());
        c.attributes.push(href);
        let mut any = AttrSelector::exists("title");
        any.namespace = Namespace::Any;
        c.attributes.push(any);
        assert_eq!(
            Selector::from_compound(c).to_css(Some(&map)),
            "[xl|href][*|title]"
        );
    }

    #[test]
    fn list_joined_with_comma() {
        let list = SelectorList::new(vec![
            Selector::from_compound(CompoundSelector::with_tag("h1")),
            Selector::from_compound(class("title")),
        ]);
        assert_eq!(list.to_css(None), "h1, .title");
        assert_eq!(list.max_weight(), 0x100);
    }
}
