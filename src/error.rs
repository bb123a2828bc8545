use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core and its scenario loader.
///
/// Stale events and particles that never collide again are ordinary control
/// flow and never show up here.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected particle, domain or engine settings (non-positive mass/radius,
    /// particle outside the domain, inverted bounds, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid argument passed to an engine operation.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A run was started while another one is still active.
    #[error("simulation is already running")]
    AlreadyRunning,

    /// A host-loop operation was called while no run is active.
    #[error("simulation is not running")]
    NotRunning,

    /// Root finding received non-finite input or produced a non-finite value.
    ///
    /// A polynomial that simply has no real root is not an error; the solver
    /// returns an empty root set for it.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// Scenario file I/O.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Scenario file parsing.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degeneracy_message_keeps_its_detail() {
        let e = Error::NumericDegeneracy("quartic coefficient is NaN".into());
        assert_eq!(e.to_string(), "numeric degeneracy: quartic coefficient is NaN");
    }

    #[test]
    fn already_running_display() {
        assert_eq!(Error::AlreadyRunning.to_string(), "simulation is already running");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "scenario.yaml");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
