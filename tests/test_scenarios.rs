//! End-to-end scenario tests driving the solver through the same JSON
//! documents the wire accepts.

use hotel_stay_optimizer::api::dto::ProblemDto;
use hotel_stay_optimizer::domain::date::DateOrd;
use hotel_stay_optimizer::domain::problem::Problem;
use hotel_stay_optimizer::domain::solve::{self, FailureKind};
use serde_json::json;

fn problem_from(value: serde_json::Value) -> Problem {
    let dto: ProblemDto = serde_json::from_value(value).expect("valid problem document");
    Problem::from_dto(dto).expect("valid problem")
}

fn day(s: &str) -> DateOrd {
    DateOrd::parse(s).unwrap()
}

#[test]
fn two_rooms_two_stays_leave_a_one_night_gap() {
    let problem = problem_from(json!({
        "ProblemId": "s1",
        "MinimumStay": 5,
        "Reservations": [
            {"Name": "A", "Arrival": "2026-01-01", "Length": 3},
            {"Name": "B", "Arrival": "2026-01-05", "Length": 3}
        ],
        "Rooms": [
            {"RoomNumber": "101"},
            {"RoomNumber": "102"}
        ]
    }));

    let outcome = solve::run(&problem).unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.optimized_plan.len(), 2);

    // Only a single night fits between A's departure and B's arrival.
    assert_eq!(outcome.min_stays[&day("2026-01-04")], 1);

    for d in ["2026-01-01", "2026-01-02", "2026-01-03", "2026-01-04"] {
        assert!(!outcome.closed_arrivals.contains(&day(d)), "{d} should not be closed for arrival");
    }
}

#[test]
fn adjacency_group_is_seated_in_adjacent_rooms() {
    let problem = problem_from(json!({
        "ProblemId": "s2",
        "MinimumStay": 2,
        "Reservations": [
            {"Name": "C", "Arrival": "2026-02-01", "Length": 3, "AdjacencyGroup": "grp1"},
            {"Name": "D", "Arrival": "2026-02-01", "Length": 3, "AdjacencyGroup": "grp1"}
        ],
        "Rooms": [
            {"RoomNumber": "201", "AdjacentRooms": ["202"]},
            {"RoomNumber": "202", "AdjacentRooms": ["201"]}
        ]
    }));

    let outcome = solve::run(&problem).unwrap();
    assert!(outcome.succeeded);

    let rooms: std::collections::HashSet<String> = outcome.optimized_plan.iter().map(|a| a.room.clone()).collect();
    assert_eq!(rooms, ["201".to_string(), "202".to_string()].into_iter().collect());
    assert_eq!(outcome.non_adjacent_assignments["grp1"], Vec::<String>::new());
}

#[test]
fn overlapping_locked_reservations_are_provably_infeasible() {
    let problem = problem_from(json!({
        "ProblemId": "s3",
        "MinimumStay": 2,
        "Reservations": [
            {"Name": "L1", "Arrival": "2026-03-01", "Length": 3, "IsLocked": true, "AssignedRoom": "301"},
            {"Name": "L2", "Arrival": "2026-03-01", "Length": 3, "IsLocked": true, "AssignedRoom": "301"},
            {"Name": "L3", "Arrival": "2026-03-02", "Length": 3, "IsLocked": true, "AssignedRoom": "301"}
        ],
        "Rooms": [
            {"RoomNumber": "301"},
            {"RoomNumber": "302"}
        ]
    }));

    let outcome = solve::run(&problem).unwrap();
    assert!(!outcome.succeeded);
    assert!(outcome.current_schedule_infeasible);
    assert_eq!(outcome.failure_kind, Some(FailureKind::ProvenInfeasible));
}

#[test]
fn max_stay_tightens_once_a_room_is_blocked() {
    use hotel_stay_optimizer::domain::context::{ContextOptions, SolverContext};
    use hotel_stay_optimizer::domain::final_restrictions::FinalRestrictions;
    use hotel_stay_optimizer::domain::initial_plan_solver;
    use hotel_stay_optimizer::domain::restriction_solver::{self, CancellationToken};
    use hotel_stay_optimizer::domain::restrictions;

    let problem = problem_from(json!({
        "ProblemId": "s4",
        "MinimumStay": 2,
        "RequestStartDate": "2026-03-05",
        "RequestEndDate": "2026-03-20",
        "Reservations": [
            {"Name": "A", "Arrival": "2026-03-10", "Length": 3}
        ],
        "Rooms": [
            {"RoomNumber": "401"},
            {"RoomNumber": "402"}
        ]
    }));

    let mut ctx = SolverContext::build(&problem, ContextOptions::default()).unwrap();
    let outcome = initial_plan_solver::solve(&mut ctx).unwrap();
    let initial = restrictions::generate(&ctx, &outcome.assignments);
    let mut finalr = FinalRestrictions::from_initial(&initial);
    restriction_solver::run(&mut ctx, &mut finalr, true, &outcome.non_adjacent_per_group, &CancellationToken::default());

    // With 402 never occupied, nothing is fully booked, so a stay starting
    // 03-09 can run to the end of the schedule.
    let start_day = day("2026-03-09");
    assert_eq!(finalr.absolute_max_stay_starting_on_day[&start_day], 11);
    assert_eq!(finalr.fixed_max_stay_starting_on_day[&start_day], 11);

    // Two days later the remaining horizon is shorter and 401 is taken.
    let later = day("2026-03-11");
    assert_eq!(finalr.fixed_max_stay_starting_on_day[&later], 9);
    assert!(finalr.fixed_max_stay_starting_on_day[&later] < finalr.fixed_max_stay_starting_on_day[&start_day]);
}

#[test]
fn new_reservation_fits_only_after_reoptimization() {
    // The suite guest arrives 04-04 for four nights; pinned as-is, room 501
    // is blocked by A on the arrival night, but moving A into 502 frees the
    // suite for the whole window.
    let problem = problem_from(json!({
        "ProblemId": "s5",
        "MinimumStay": 3,
        "Reservations": [
            {"Name": "A", "Arrival": "2026-04-02", "Length": 3, "AssignedRoom": "501"},
            {"Name": "X", "Arrival": "2026-04-05", "Length": 3, "AssignedRoom": "502"},
            {"Name": "B", "Arrival": "2026-04-10", "Length": 3, "AssignedRoom": "501"},
            {"Name": "D", "Arrival": "2026-04-10", "Length": 3, "AssignedRoom": "502"}
        ],
        "NewReservations": [
            {"Name": "N", "Arrival": "2026-04-04", "Length": 4, "RoomType": "Suite"}
        ],
        "Rooms": [
            {"RoomNumber": "501", "RoomType": "Suite"},
            {"RoomNumber": "502", "RoomType": "Standard"}
        ]
    }));

    let outcome = solve::run(&problem).unwrap();
    assert!(outcome.succeeded);

    // The pinned variant could not place the new guest at all.
    assert!(outcome.initial_plan.is_none());
    let changes = outcome.room_change_comparison.as_ref().unwrap();
    assert_eq!(changes["N_N"], (-1, 0));

    // The free plan seats all four nights in the suite as one segment.
    let new_segments: Vec<_> = outcome.optimized_plan.iter().filter(|a| a.test).collect();
    assert_eq!(new_segments.len(), 1);
    assert_eq!(new_segments[0].room, "501");
    assert_eq!(new_segments[0].length, 4);

    let quality = outcome.quality_comparison.as_ref().unwrap();
    let optimized_total: i64 = quality.values().map(|&(_, opt)| opt).sum();
    assert!(optimized_total > 0);
}

#[test]
fn date_range_minimum_stay_overrides_day_of_week() {
    let problem = problem_from(json!({
        "ProblemId": "s6",
        "MinimumStay": 2,
        "MinimumStayByDay": {"Fri": 3},
        "MinimumStayByDate": [
            {"Start": "2026-05-01", "End": "2026-05-07", "MinimumStay": 7}
        ],
        "Reservations": [
            {"Name": "A", "Arrival": "2026-05-01", "Length": 3}
        ],
        "Rooms": [{"RoomNumber": "601"}]
    }));

    let mut d = day("2026-05-01");
    while d <= day("2026-05-07") {
        assert_eq!(problem.minimum_stay_on(d), 7, "{d} should use the date-range override");
        d = d.succ();
    }
    // 2026-05-08 is a Friday; outside the range the day-of-week override
    // applies again.
    assert_eq!(problem.minimum_stay_on(day("2026-05-08")), 3);
    assert_eq!(problem.minimum_stay_on(day("2026-05-09")), 2);
}
