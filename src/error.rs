use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse problem document JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing required initial assignment: {0}")]
    MissingInitialAssignment(String),

    #[error("Current schedule is provably infeasible")]
    ProvenInfeasible,

    #[error("New reservation is infeasible: {0}")]
    NewReservationInfeasible(String),

    #[error("Solver did not find a result within the time limit")]
    SolverTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;
