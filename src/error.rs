use thiserror::Error;

use crate::ir::FunctionId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Lowering distinguishes between conditions that abort a pass and conditions that are merely
/// recorded. Only the former surface as an [`Error`]; a call site the inliner refuses, or a
/// call cycle that keeps scaffolding alive, end up in the pass trace instead.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::Malformed`] - A function carries a phase tag that is not a decimal integer
///
/// ## Invariant Violations
/// - [`Error::InvariantViolation`] - A protected function is tagged for the phase being lowered
/// - [`Error::UnknownFunction`] - A function identifier does not name a live function
///
/// ## Module Construction Errors
/// - [`Error::DuplicateFunction`] - A function name is already taken in the module
/// - [`Error::IdentifiersExhausted`] - The module has no identifiers left to hand out
///
/// ## Strategy Errors
/// - [`Error::FixpointDiverged`] - The fallback inliner kept changing the module at its cap
///
/// # Examples
///
/// ```rust
/// use phaselower::{Error, ir::{Function, Module}, compiler::{LoweringConfig, TransformDriver}};
///
/// let mut module = Module::new("broken");
/// module.add_function(Function::new("helper").with_attribute("lower-phase", "one"))?;
///
/// match TransformDriver::new(LoweringConfig::for_phase(1)).run(&mut module) {
///     Err(Error::Malformed { message, .. }) => println!("corrupt module: {message}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(outcome) => println!("changed: {}", outcome.changed),
/// }
/// # Ok::<(), phaselower::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A function carries a phase tag that could not be parsed.
    ///
    /// Phase tags are produced by an earlier pipeline stage; a tag that is not a non-negative
    /// decimal integer means that stage emitted a corrupt module. The pass refuses to run.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A structural invariant of the module does not hold.
    ///
    /// Raised when a protected function (an entry point the pass may never delete) is tagged for
    /// the phase being lowered. This is a bug in whatever stage produced the module.
    #[error("Invariant violation - {0}")]
    InvariantViolation(String),

    /// The referenced function does not exist in the module.
    ///
    /// The associated [`FunctionId`] identifies the slot that was addressed.
    #[error("Unknown function - {0}")]
    UnknownFunction(FunctionId),

    /// A function with the same name already exists in the module.
    ///
    /// Names are how trace events and lookups refer to functions, so they must be unique.
    #[error("Duplicate function - {0}")]
    DuplicateFunction(String),

    /// The module ran out of 32-bit identifiers of the given kind.
    #[error("Identifiers exhausted - no {0} identifiers left")]
    IdentifiersExhausted(&'static str),

    /// The fixpoint fallback inliner was still changing the module when it hit its cap.
    ///
    /// This indicates recursion among phase functions that the recursion guard could not see
    /// (for example a cycle longer than two functions). The module is left well-formed but partially
    /// flattened.
    #[error("Fixpoint inlining for phase {phase} did not converge after {iterations} iterations")]
    FixpointDiverged {
        /// The phase being lowered
        phase: u32,
        /// The iteration cap that was reached
        iterations: usize,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
