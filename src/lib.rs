use crate::api::convert::to_result_dto;
use crate::api::dto::{ProblemDto, ResultDto};
use crate::domain::problem::Problem;
use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Parses a problem document and runs the full optimization pipeline,
/// returning the output document ready to serialize.
pub fn solve_problem(dto: ProblemDto) -> Result<ResultDto> {
    let problem = Problem::from_dto(dto)?;
    log::info!("Problem '{}' parsed: {} reservation(s), {} room(s).", problem.problem_id, problem.reservations.len(), problem.rooms.len());

    let outcome = domain::solve::run(&problem)?;
    log::info!("Problem '{}' solved: succeeded={}.", outcome.problem_id, outcome.succeeded);

    Ok(to_result_dto(&outcome))
}
