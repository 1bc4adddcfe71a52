use gat_core::GatError;
use thiserror::Error;

/// SCOPF formulation and solve errors.
#[derive(Debug, Error)]
pub enum ScopfError {
    /// Input data validation error
    #[error("SCOPF data validation: {0}")]
    DataValidation(String),

    /// Missing or inconsistent branch flow-limit data
    #[error("SCOPF flow limit data: {0}")]
    FlowLimit(String),

    /// More than one in-service generator sits on the reference bus
    #[error("SCOPF needs exactly one reference generator, found {} (generators {:?})", .0.len(), .0)]
    MultipleReferenceGenerators(Vec<usize>),

    /// No in-service generator sits on the reference bus
    #[error("SCOPF reference bus {0} has no in-service generator")]
    NoReferenceGenerator(usize),

    /// Contingency list problem (bad branch index, islanding outage)
    #[error("SCOPF contingency: {0}")]
    InvalidContingency(String),

    /// A callback produced a value outside the declared sparsity structure
    #[error("SCOPF structure violation: entry ({row}, {col}) is not in the declared pattern")]
    StructureViolation { row: usize, col: usize },

    /// Callback buffer or vector of the wrong length
    #[error("SCOPF dimension mismatch: {what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Solver engine setup or invocation failure
    #[error("SCOPF solver: {0}")]
    Solver(String),

    /// Case data error from the network layer
    #[error(transparent)]
    Network(#[from] GatError),
}

impl ScopfError {
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(ScopfError::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
