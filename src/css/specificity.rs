//! Selector specificity and its packed weight.
//!
//! The cascade compares selectors by a single packed integer:
//!
//! ```text
//! weight = ids * 0x010000 + (classes + pseudo-classes + attributes) * 0x000100 + tag
//! ```
//!
//! where `tag` is 1 when the compound names an element or pseudo-element and 0
//! for the universal selector. Each tier is one byte, so counts above 255
//! carry into the next tier exactly as existing cascades expect.

use std::ops::Add;

use crate::css::selector::CompoundSelector;

/// Unpacked specificity counts for one compound selector (or a sum of them).
///
/// Field order makes the derived `Ord` agree with the packed weight as long as
/// no tier overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity {
    /// Number of ID selectors (`#id`).
    pub ids: u32,
    /// Number of class, pseudo-class, and attribute selectors.
    pub classes: u32,
    /// Number of type or pseudo-element names.
    pub tags: u32,
}

impl Specificity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts for a compound selector, ignoring its negations.
    pub fn of_compound(compound: &CompoundSelector) -> Self {
        Self {
            ids: compound.ids.len() as u32,
            classes: (compound.classes.len()
                + compound.pseudo_classes.len()
                + compound.attributes.len()) as u32,
            tags: u32::from(compound.tag.is_some()),
        }
    }

    /// The packed base-256 weight.
    pub fn weight(&self) -> i32 {
        (self.ids as i32)
            .wrapping_mul(0x010000)
            .wrapping_add((self.classes as i32).wrapping_mul(0x000100))
            .wrapping_add(self.tags as i32)
    }
}

impl Add for Specificity {
    type Output = Specificity;

    fn add(self, rhs: Specificity) -> Specificity {
        Specificity {
            ids: self.ids + rhs.ids,
            classes: self.classes + rhs.classes,
            tags: self.tags + rhs.tags,
        }
    }
}
