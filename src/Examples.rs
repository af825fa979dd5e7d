//! examples of usage of RustedPoissonFAC
/// FAC operator examples: direct coarse solves, two-level smoothing, configuration from a task document
pub mod fac_examples;
