//! some linear algebra functions used throughout the code
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// sparse LU and GMRES wrappers over faer and faer_gmres
pub mod faer_solvers;
