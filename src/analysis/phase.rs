//! Phase classification of functions.
//!
//! Scaffolding functions are tagged with the lowering phase that is supposed to eliminate them.
//! The tag is stored as text (see [`LOWER_PHASE_ATTRIBUTE`]) because it travels through the
//! module's attribute system; this module turns that text back into a decision.

use crate::{ir::FunctionId, Result};

/// Name of the function attribute carrying the lowering phase.
pub const LOWER_PHASE_ATTRIBUTE: &str = "lower-phase";

/// Read access to the lowering-relevant attributes of a module's functions.
pub trait PhaseAttributes {
    /// Returns the raw phase tag of `function`, or `None` if it carries none (or does not
    /// exist).
    fn phase_tag(&self, function: FunctionId) -> Option<&str>;

    /// Returns `true` if `function` must never be removed.
    fn is_protected(&self, function: FunctionId) -> bool;
}

/// Parses the text of a phase tag.
///
/// # Arguments
///
/// * `tag` - Raw attribute value
///
/// # Returns
///
/// The phase number.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `tag` is not a non-negative decimal integer that fits
/// in a `u32`.
pub fn parse_phase_tag(tag: &str) -> Result<u32> {
    if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed_error!("Invalid lowering phase tag - '{}'", tag));
    }

    tag.parse::<u32>()
        .map_err(|_| malformed_error!("Lowering phase tag out of range - '{}'", tag))
}

/// Decides whether a function belongs to the phase currently being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClassifier {
    phase: u32,
}

impl PhaseClassifier {
    /// Creates a classifier for `phase`.
    #[must_use]
    pub const fn new(phase: u32) -> Self {
        Self { phase }
    }

    /// Returns the phase this classifier matches.
    #[must_use]
    pub const fn phase(&self) -> u32 {
        self.phase
    }

    /// Returns the parsed phase tag of `function`.
    ///
    /// # Arguments
    ///
    /// * `attrs` - Attribute source of the module
    /// * `function` - The function to inspect
    ///
    /// # Returns
    ///
    /// `Some(phase)` if the function is tagged, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the tag cannot be parsed. The message names the
    /// function.
    pub fn tag_of<A>(&self, attrs: &A, function: FunctionId) -> Result<Option<u32>>
    where
        A: PhaseAttributes + ?Sized,
    {
        let Some(tag) = attrs.phase_tag(function) else {
            return Ok(None);
        };

        match parse_phase_tag(tag) {
            Ok(phase) => Ok(Some(phase)),
            Err(_) => Err(malformed_error!(
                "Function {} carries invalid '{}' attribute - '{}'",
                function,
                LOWER_PHASE_ATTRIBUTE,
                tag
            )),
        }
    }

    /// Returns `true` iff `function` is tagged with exactly this classifier's phase.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the function's tag cannot be parsed.
    pub fn is_phase_tagged<A>(&self, attrs: &A, function: FunctionId) -> Result<bool>
    where
        A: PhaseAttributes + ?Sized,
    {
        Ok(self.tag_of(attrs, function)? == Some(self.phase))
    }
}
