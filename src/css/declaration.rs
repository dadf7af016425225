//! Declaration blocks: ordered property/value pairs with `!important` tracking.

use crate::css::serialize::{write_ident, write_string};

/// A single component of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Ident(String),
    Number(f32),
    Percentage(f32),
    /// Number with a unit suffix: `10px`, `2em`.
    Dimension(f32, String),
    /// `#abc`, stored without the `#`.
    Hash(String),
    String(String),
    Url(String),
    /// `rgb(1, 2, 3)`: name plus arguments.
    Function(String, Vec<ComponentValue>),
    Comma,
    Slash,
    Delim(char),
}

impl ComponentValue {
    fn write_css(&self, dest: &mut String) {
        match self {
            ComponentValue::Ident(s) => write_ident(dest, s),
            ComponentValue::Number(n) => dest.push_str(&n.to_string()),
            ComponentValue::Percentage(n) => {
                dest.push_str(&n.to_string());
                dest.push('%');
            }
            ComponentValue::Dimension(n, unit) => {
                dest.push_str(&n.to_string());
                dest.push_str(unit);
            }
            ComponentValue::Hash(h) => {
                dest.push('#');
                dest.push_str(h);
            }
            ComponentValue::String(s) => write_string(dest, s),
            ComponentValue::Url(u) => {
                dest.push_str("url(");
                write_string(dest, u);
                dest.push(')');
            }
            ComponentValue::Function(name, args) => {
                write_ident(dest, name);
                dest.push('(');
                write_values(dest, args);
                dest.push(')');
            }
            ComponentValue::Comma => dest.push(','),
            ComponentValue::Slash => dest.push('/'),
            ComponentValue::Delim(c) => dest.push(*c),
        }
    }
}

/// Write a value list with single spaces, tight around `/` and before `,`.
pub fn write_values(dest: &mut String, values: &[ComponentValue]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            let tight = matches!(value, ComponentValue::Comma | ComponentValue::Slash)
                || matches!(values[i - 1], ComponentValue::Slash);
            if !tight {
                dest.push(' ');
            }
        }
        value.write_css(dest);
    }
}

/// One `name: value [!important]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    /// Lowercased property name.
    pub name: String,
    pub value: Vec<ComponentValue>,
    pub important: bool,
}

impl PropertyDeclaration {
    pub fn new(name: impl Into<String>, value: Vec<ComponentValue>, important: bool) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            value,
            important,
        }
    }

    pub fn value_text(&self) -> String {
        let mut out = String::new();
        write_values(&mut out, &self.value);
        out
    }

    fn write_css(&self, dest: &mut String) {
        dest.push_str(&self.name);
        dest.push_str(": ");
        write_values(dest, &self.value);
        if self.important {
            dest.push_str(" !important");
        }
        dest.push(';');
    }
}

/// An ordered declaration block.
///
/// Once a style rule has been matched its declaration is sealed; further
/// edits go through a fresh copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declaration {
    entries: Vec<PropertyDeclaration>,
    immutable: bool,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any earlier entry of the same name.
    ///
    /// A normal entry never overrides an important one. Returns `false` if
    /// the block is sealed.
    pub fn set(&mut self, decl: PropertyDeclaration) -> bool {
        if self.immutable {
            return false;
        }
        if let Some(pos) = self.entries.iter().position(|e| e.name == decl.name) {
            if self.entries[pos].important && !decl.important {
                return true;
            }
            self.entries.remove(pos);
        }
        self.entries.push(decl);
        true
    }

    /// Remove a property. Returns `false` if sealed or absent.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.immutable {
            return false;
        }
        let name = name.to_ascii_lowercase();
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDeclaration> {
        let name = name.to_ascii_lowercase();
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDeclaration> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_important(&self) -> bool {
        self.entries.iter().any(|e| e.important)
    }

    /// Only the `!important` entries.
    pub fn important_subset(&self) -> impl Iterator<Item = &PropertyDeclaration> {
        self.entries.iter().filter(|e| e.important)
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub(crate) fn seal(&mut self) {
        self.immutable = true;
    }

    /// An editable copy of this block.
    pub fn clone_mutable(&self) -> Declaration {
        Declaration {
            entries: self.entries.clone(),
            immutable: false,
        }
    }

    pub fn to_css(&self) -> String {
        let mut dest = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                dest.push(' ');
            }
            entry.write_css(&mut dest);
        }
        dest
    }
}
