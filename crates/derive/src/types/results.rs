//! Result types for the derivation pipeline.

use crate::errors::PipelineErrorKind;

/// A result type for the derivation pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineErrorKind>;

/// The outcome of a single [Pipeline::step].
///
/// [Pipeline::step]: crate::traits::Pipeline::step
#[derive(Debug, PartialEq, Eq)]
pub enum StepResult {
    /// Attributes were successfully prepared.
    PreparedAttributes,
    /// Origin was advanced.
    AdvancedOrigin,
    /// Origin advance failed.
    OriginAdvanceErr(PipelineErrorKind),
    /// Step failed.
    StepFailed(PipelineErrorKind),
    /// Prepared attributes have not been confirmed by the consumer yet.
    AttributesInFlight,
}
