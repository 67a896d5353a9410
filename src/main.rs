use std::io::Write;
use std::process::ExitCode;

use clap::Parser;

use hotel_stay_optimizer::api::convert::to_result_dto;
use hotel_stay_optimizer::api::dto::ProblemDto;
use hotel_stay_optimizer::domain::problem::Problem;
use hotel_stay_optimizer::domain::solve::{self, FailureKind};
use hotel_stay_optimizer::error::Error;
use hotel_stay_optimizer::loader::parser::{parse_json_file, parse_json_stdin};
use hotel_stay_optimizer::logger;

/// Room-assignment and stay-restriction optimizer.
#[derive(Parser, Debug)]
#[command(name = "hotel-stay-optimizer", version, about)]
struct Cli {
    /// Problem document path; reads from stdin when omitted.
    #[arg(long)]
    input: Option<String>,

    /// Output document path; writes to stdout when omitted.
    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    logger::init();
    let cli = Cli::parse();

    let dto_result: Result<ProblemDto, Error> = match &cli.input {
        Some(path) => {
            log::info!("Loading problem document from '{path}'.");
            parse_json_file(path)
        }
        None => {
            log::info!("Reading problem document from stdin.");
            parse_json_stdin()
        }
    };

    let dto = match dto_result {
        Ok(dto) => dto,
        Err(e) => {
            log::error!("Failed to read problem document: {e}");
            return ExitCode::from(2);
        }
    };

    let problem = match Problem::from_dto(dto) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Invalid input: {e}");
            return ExitCode::from(2);
        }
    };

    let outcome = match solve::run(&problem) {
        Ok(o) => o,
        Err(e) => {
            log::error!("Solve failed: {e}");
            return ExitCode::from(2);
        }
    };

    let exit_code = match outcome.failure_kind {
        None => 0,
        Some(FailureKind::ProvenInfeasible) => 3,
        Some(FailureKind::NewReservationInfeasible) => 3,
        Some(FailureKind::SolverTimeout) => 4,
        Some(FailureKind::MissingInitialAssignment) => 5,
    };

    let result_dto = to_result_dto(&outcome);
    let json = match serde_json::to_string_pretty(&result_dto) {
        Ok(j) => j,
        Err(e) => {
            log::error!("Failed to serialize result document: {e}");
            return ExitCode::from(2);
        }
    };

    let write_result = match &cli.output {
        Some(path) => std::fs::write(path, &json),
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(json.as_bytes()).and_then(|_| stdout.write_all(b"\n"))
        }
    };

    if let Err(e) = write_result {
        log::error!("Failed to write result document: {e}");
        return ExitCode::from(2);
    }

    ExitCode::from(exit_code)
}
