//! Operator configuration: smoother ordering, coarsest-level solver and its stopping criteria,
//! pass-through transfer method tags and the log level.
use crate::Utils::task_parser::{ConfigSection, parse_config_document};
use crate::numerical::Poisson_FAC::fac_errors::FacError;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Ordering of point relaxation across the patches of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum SmootherChoice {
    /// every patch relaxes against the ghost values of the previous sweep
    #[strum(serialize = "additive")]
    Additive,
    /// patches relax in order, reading already relaxed neighbors with the same owner
    #[strum(serialize = "multiplicative")]
    Multiplicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum CoarseSolverChoice {
    /// a fixed number of smoothing sweeps
    #[strum(serialize = "block_jacobi")]
    BlockJacobi,
    /// per-patch sparse LU factorizations
    #[strum(serialize = "sparse_lu")]
    SparseLu,
    /// per-patch restarted GMRES
    #[strum(serialize = "krylov")]
    Krylov,
}

impl SmootherChoice {
    pub fn parse(s: &str) -> Result<Self, FacError> {
        SmootherChoice::from_str(s)
            .map_err(|_| FacError::Configuration(format!("unknown smoother choice `{}`", s)))
    }
}

impl CoarseSolverChoice {
    pub fn parse(s: &str) -> Result<Self, FacError> {
        CoarseSolverChoice::from_str(s).map_err(|_| {
            FacError::Configuration(format!("unknown coarse solver choice `{}`", s))
        })
    }
}

pub const DEFAULT_PROLONGATION_METHOD: &str = "CONSTANT_REFINE";
pub const DEFAULT_RESTRICTION_METHOD: &str = "CONSERVATIVE_COARSEN";

pub const CONFIG_SECTION: &str = "fac_operator";
const KEYS: [&str; 7] = [
    "smoother_choice",
    "coarse_solver_choice",
    "coarse_solver_tolerance",
    "coarse_solver_max_iterations",
    "prolongation_method",
    "restriction_method",
    "loglevel",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FacConfig {
    pub smoother_choice: SmootherChoice,
    pub coarse_solver_choice: CoarseSolverChoice,
    pub coarse_solver_tolerance: f64,
    pub coarse_solver_max_iterations: usize,
    /// consumed by the cycle driver, stored here for pass-through
    pub prolongation_method: String,
    pub restriction_method: String,
    pub loglevel: Option<String>,
}

impl Default for FacConfig {
    fn default() -> Self {
        Self {
            smoother_choice: SmootherChoice::Additive,
            coarse_solver_choice: CoarseSolverChoice::BlockJacobi,
            coarse_solver_tolerance: 1.0e-6,
            coarse_solver_max_iterations: 10,
            prolongation_method: DEFAULT_PROLONGATION_METHOD.to_string(),
            restriction_method: DEFAULT_RESTRICTION_METHOD.to_string(),
            loglevel: None,
        }
    }
}

impl FacConfig {
    /// Read the `fac_operator` section of a task document; missing keys keep their defaults.
    pub fn from_document(text: &str) -> Result<Self, FacError> {
        let document = parse_config_document(text)?;
        let section = ConfigSection::from_document(&document, CONFIG_SECTION)?;
        section.check_keys(&KEYS)?;
        let mut config = FacConfig::default();
        if let Some(s) = section.get_string("smoother_choice")? {
            config.smoother_choice = SmootherChoice::parse(&s)?;
        }
        if let Some(s) = section.get_string("coarse_solver_choice")? {
            config.coarse_solver_choice = CoarseSolverChoice::parse(&s)?;
        }
        if let Some(tol) = section.get_f64("coarse_solver_tolerance")? {
            config.coarse_solver_tolerance = tol;
        }
        if let Some(n) = section.get_usize("coarse_solver_max_iterations")? {
            config.coarse_solver_max_iterations = n;
        }
        if let Some(s) = section.get_string("prolongation_method")? {
            config.prolongation_method = s;
        }
        if let Some(s) = section.get_string("restriction_method")? {
            config.restriction_method = s;
        }
        config.loglevel = section.get_string("loglevel")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FacError> {
        if !(self.coarse_solver_tolerance > 0.0 && self.coarse_solver_tolerance.is_finite()) {
            return Err(FacError::Configuration(format!(
                "coarse solver tolerance must be positive, got {}",
                self.coarse_solver_tolerance
            )));
        }
        if self.coarse_solver_max_iterations == 0 {
            return Err(FacError::Configuration(
                "coarse solver needs at least one iteration".to_string(),
            ));
        }
        if let Some(level) = &self.loglevel {
            if !matches!(level.as_str(), "debug" | "info" | "warn" | "error" | "off" | "none") {
                return Err(FacError::Configuration(format!("unknown loglevel `{}`", level)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_defaults() {
        let config = FacConfig::default();
        assert_eq!(config.smoother_choice, SmootherChoice::Additive);
        assert_eq!(config.coarse_solver_choice, CoarseSolverChoice::BlockJacobi);
        assert_eq!(config.coarse_solver_tolerance, 1.0e-6);
        assert_eq!(config.coarse_solver_max_iterations, 10);
        assert_eq!(config.prolongation_method, "CONSTANT_REFINE");
        assert_eq!(config.restriction_method, "CONSERVATIVE_COARSEN");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_choice_strings_round_trip() {
        for choice in SmootherChoice::iter() {
            assert_eq!(SmootherChoice::parse(&choice.to_string()).unwrap(), choice);
        }
        for choice in CoarseSolverChoice::iter() {
            assert_eq!(CoarseSolverChoice::parse(&choice.to_string()).unwrap(), choice);
        }
        assert!(matches!(
            SmootherChoice::parse("red_black"),
            Err(FacError::Configuration(_))
        ));
        assert!(CoarseSolverChoice::parse("hypre").is_err());
    }

    #[test]
    fn test_from_document() {
        let text = "
        fac_operator
        smoother_choice: multiplicative
        coarse_solver_choice: sparse_lu
        coarse_solver_tolerance: 1.0e-10
        coarse_solver_max_iterations: 25
        loglevel: warn
        ";
        let config = FacConfig::from_document(text).unwrap();
        assert_eq!(config.smoother_choice, SmootherChoice::Multiplicative);
        assert_eq!(config.coarse_solver_choice, CoarseSolverChoice::SparseLu);
        assert_eq!(config.coarse_solver_tolerance, 1.0e-10);
        assert_eq!(config.coarse_solver_max_iterations, 25);
        assert_eq!(config.loglevel.as_deref(), Some("warn"));
        assert_eq!(config.restriction_method, DEFAULT_RESTRICTION_METHOD);
    }

    #[test]
    fn test_from_document_rejects_bad_input() {
        let unknown_key = "fac_operator\nsmoother: additive";
        assert!(FacConfig::from_document(unknown_key).is_err());
        let bad_choice = "fac_operator\ncoarse_solver_choice: petsc";
        assert!(FacConfig::from_document(bad_choice).is_err());
        let bad_tol = "fac_operator\ncoarse_solver_tolerance: -1.0";
        assert!(FacConfig::from_document(bad_tol).is_err());
        let wrong_section = "logging\nloglevel: info";
        assert!(FacConfig::from_document(wrong_section).is_err());
    }
}
