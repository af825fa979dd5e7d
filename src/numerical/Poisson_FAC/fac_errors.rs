use std::fmt;

/// Error types of the FAC operator and its collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum FacError {
    /// an operation that needs hierarchy-dependent state was called before initialization
    NotInitialized(String),
    /// vectors or hierarchies handed to the operator do not match its configuration
    HierarchyMismatch(String),
    InvalidLevelRange {
        coarsest: usize,
        finest: usize,
        available: usize,
    },
    InvalidHierarchy(String),
    /// unrecognized choice strings or malformed configuration documents
    Configuration(String),
    InvalidBoundaryCoefs(String),
    SolverFailure(String),
}

impl fmt::Display for FacError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FacError::NotInitialized(op) => {
                write!(f, "{}: operator state is not initialized", op)
            }
            FacError::HierarchyMismatch(msg) => write!(f, "hierarchy mismatch: {}", msg),
            FacError::InvalidLevelRange {
                coarsest,
                finest,
                available,
            } => write!(
                f,
                "invalid level range [{}, {}] for a hierarchy with {} levels",
                coarsest, finest, available
            ),
            FacError::InvalidHierarchy(msg) => write!(f, "invalid hierarchy: {}", msg),
            FacError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            FacError::InvalidBoundaryCoefs(msg) => {
                write!(f, "invalid Robin boundary coefficients: {}", msg)
            }
            FacError::SolverFailure(msg) => write!(f, "coarse solver failure: {}", msg),
        }
    }
}

impl std::error::Error for FacError {}
