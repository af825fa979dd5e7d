//! numerical methods: the FAC level operator for side-centered Poisson-type problems
pub mod Poisson_FAC;
