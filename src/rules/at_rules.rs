//! Leaf at-rules: `@charset`, `@import`, `@namespace`, `@font-face`, `@page`, `@keyframes`.

use crate::css::declaration::Declaration;
use crate::css::serialize::{write_ident, write_string};
use crate::media::query::MediaList;
use crate::sheet::SheetId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetRule {
    pub encoding: String,
}

impl CharsetRule {
    pub fn new(encoding: impl Into<String>) -> Self {
        Self {
            encoding: encoding.into(),
        }
    }

    pub fn css_text(&self) -> String {
        let mut dest = String::from("@charset ");
        write_string(&mut dest, &self.encoding);
        dest.push(';');
        dest
    }
}

/// `@import url(...) <media>;`
///
/// `child` is the sheet created for the import, if a loader was available.
#[derive(Debug, Clone)]
pub struct ImportRule {
    pub href: String,
    pub media: MediaList,
    pub(crate) child: Option<SheetId>,
}

impl ImportRule {
    pub fn new(href: impl Into<String>, media: MediaList) -> Self {
        Self {
            href: href.into(),
            media,
            child: None,
        }
    }

    pub fn child_sheet(&self) -> Option<SheetId> {
        self.child
    }

    pub fn css_text(&self) -> String {
        let mut dest = String::from("@import url(");
        write_string(&mut dest, &self.href);
        dest.push(')');
        if !self.media.is_empty() {
            dest.push(' ');
            dest.push_str(&self.media.media_text());
        }
        dest.push(';');
        dest
    }
}

/// `@namespace [prefix] url(...);`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRule {
    pub prefix: Option<String>,
    pub url: String,
}

impl NamespaceRule {
    pub fn new(prefix: Option<&str>, url: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            url: url.into(),
        }
    }

    pub fn css_text(&self) -> String {
        let mut dest = String::from("@namespace ");
        if let Some(prefix) = &self.prefix {
            write_ident(&mut dest, prefix);
            dest.push(' ');
        }
        dest.push_str("url(");
        write_string(&mut dest, &self.url);
        dest.push_str(");");
        dest
    }
}

fn write_block(dest: &mut String, declaration: &Declaration) {
    dest.push_str(" { ");
    let text = declaration.to_css();
    if !text.is_empty() {
        dest.push_str(&text);
        dest.push(' ');
    }
    dest.push('}');
}

#[derive(Debug, Clone, Default)]
pub struct FontFaceRule {
    pub declaration: Declaration,
}

impl FontFaceRule {
    pub fn css_text(&self) -> String {
        let mut dest = String::from("@font-face");
        write_block(&mut dest, &self.declaration);
        dest
    }
}

/// `@page [:pseudo] { ... }`
#[derive(Debug, Clone, Default)]
pub struct PageRule {
    /// Page pseudo-class without the colon, e.g. `first`.
    pub pseudo: Option<String>,
    pub declaration: Declaration,
}

impl PageRule {
    pub fn css_text(&self) -> String {
        let mut dest = String::from("@page");
        if let Some(pseudo) = &self.pseudo {
            dest.push_str(" :");
            write_ident(&mut dest, pseudo);
        }
        write_block(&mut dest, &self.declaration);
        dest
    }
}

/// One keyframe: offsets in percent plus a declaration block.
#[derive(Debug, Clone, Default)]
pub struct Keyframe {
    pub offsets: Vec<f32>,
    pub declaration: Declaration,
}

impl Keyframe {
    pub fn key_text(&self) -> String {
        self.offsets
            .iter()
            .map(|o| format!("{o}%"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyframesRule {
    pub name: String,
    pub keyframes: Vec<Keyframe>,
}

impl KeyframesRule {
    pub fn css_text(&self) -> String {
        let mut dest = String::from("@keyframes ");
        write_ident(&mut dest, &self.name);
        dest.push_str(" {\n");
        for frame in &self.keyframes {
            dest.push_str("  ");
            dest.push_str(&frame.key_text());
            write_block(&mut dest, &frame.declaration);
            dest.push('\n');
        }
        dest.push('}');
        dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::declaration::{ComponentValue, PropertyDeclaration};
    use pretty_assertions::assert_eq;

    #[test]
    fn leaf_rule_text() {
        assert_eq!(CharsetRule::new("UTF-8").css_text(), "@charset \"UTF-8\";");
        assert_eq!(
            ImportRule::new("x.css", MediaList::parse("print")).css_text(),
            "@import url(\"x.css\") print;"
        );
        assert_eq!(
            NamespaceRule::new(Some("svg"), "http://www.w3.org/2000/svg").css_text(),
            "@namespace svg url(\"http://www.w3.org/2000/svg\");"
        );
        assert_eq!(NamespaceRule::new(None, "x").css_text(), "@namespace url(\"x\");");
    }

    #[test]
    fn keyframes_text() {
        let mut decl = Declaration::new();
        decl.set(PropertyDeclaration::new(
            "opacity",
            vec![ComponentValue::Number(0.0)],
            false,
        ));
        let rule = KeyframesRule {
            name: "fade".into(),
            keyframes: vec![Keyframe {
                offsets: vec![0.0, 50.0],
                declaration: decl,
            }],
        };
        assert_eq!(rule.css_text(), "@keyframes fade {\n  0%, 50% { opacity: 0; }\n}");
    }

    #[test]
    fn page_text() {
        let rule = PageRule {
            pseudo: Some("first".into()),
            declaration: Declaration::new(),
        };
        assert_eq!(rule.css_text(), "@page :first { }");
    }
}
