//! Origin checks gating CSSOM access to a sheet's rules.

use url::{Origin, Url};

use crate::error::{CssomError, Result};
use crate::sheet::rule_list::RuleListView;
use crate::sheet::{Cssom, SheetId};

/// The security identity a sheet was loaded under, or a caller acts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Privileged code. Subsumes every other principal.
    System,
    /// Content from one origin.
    Origin(Origin),
}

impl Principal {
    /// A fresh opaque origin that only subsumes itself.
    pub fn null() -> Self {
        Principal::Origin(Origin::new_opaque())
    }

    pub fn from_url(url: &Url) -> Self {
        Principal::Origin(url.origin())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Principal::System)
    }

    /// Whether code running as `self` may act on content owned by `other`.
    pub fn subsumes(&self, other: &Principal) -> bool {
        match (self, other) {
            (Principal::System, _) => true,
            (Principal::Origin(_), Principal::System) => false,
            (Principal::Origin(a), Principal::Origin(b)) => a == b,
        }
    }
}

/// Cross-origin permission a sheet was fetched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorsMode {
    #[default]
    None,
    Anonymous,
    UseCredentials,
}

/// Who is calling a CSSOM entry point.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Principal,
    /// Privileged callers skip the CORS requirement.
    pub chrome: bool,
}

impl Caller {
    pub fn content(principal: Principal) -> Self {
        Self {
            principal,
            chrome: false,
        }
    }

    pub fn chrome() -> Self {
        Self {
            principal: Principal::System,
            chrome: true,
        }
    }
}

impl Cssom {
    /// Check that `caller` may read or write the rules of `sheet`.
    ///
    /// A caller whose principal does not subsume the sheet's needs a CORS
    /// mode other than `None` and a complete sheet. The sheet then takes the
    /// caller's principal, which goes through copy-on-write.
    pub fn check_access(&mut self, sheet: SheetId, caller: &Caller) -> Result<()> {
        let inner = self.inner_of(sheet)?;
        if caller.principal.subsumes(&inner.principal) || caller.chrome {
            return Ok(());
        }
        if inner.cors_mode == CorsMode::None {
            return Err(CssomError::Security);
        }
        if !inner.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        self.will_dirty(sheet)?;
        self.inner_of_mut(sheet)?.principal = caller.principal.clone();
        self.did_dirty(sheet);
        Ok(())
    }

    /// The sheet's top-level rules, as CSSOM `cssRules` exposes them.
    pub fn css_rules(&mut self, sheet: SheetId, caller: &Caller) -> Result<RuleListView<'_>> {
        if !self.inner_of(sheet)?.complete {
            return Err(CssomError::InvalidState("sheet is still loading"));
        }
        self.check_access(sheet, caller)?;
        let inner = self.inner_of(sheet)?;
        Ok(RuleListView::new(&inner.rules, inner.namespaces.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid url")
    }

    #[test]
    fn system_subsumes_everything() {
        let content = Principal::from_url(&url("https://a.example/x.css"));
        assert!(Principal::System.subsumes(&content));
        assert!(Principal::System.subsumes(&Principal::System));
        assert!(!content.subsumes(&Principal::System));
    }

    #[test]
    fn same_origin_subsumes() {
        let a = Principal::from_url(&url("https://a.example/one.css"));
        let a2 = Principal::from_url(&url("https://a.example/two.css"));
        let b = Principal::from_url(&url("https://b.example/one.css"));
        assert!(a.subsumes(&a2));
        assert!(!a.subsumes(&b));
    }

    #[test]
    fn null_principals_are_distinct() {
        let one = Principal::null();
        let two = Principal::null();
        assert!(one.subsumes(&one.clone()));
        assert!(!one.subsumes(&two));
    }
}
