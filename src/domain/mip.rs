//! The MIP backend abstraction: a small verb set (add variables, add linear
//! constraints, set the objective and limits, optimize, read values) plus
//! one concrete adapter over `good_lp` with its `highs` feature.
//!
//! Everything above this module talks only to [`MipBackend`]; only
//! [`HighsBackend`] knows about `good_lp`, so swapping solvers means writing
//! one adapter.

use std::ops::{Add, Mul, Neg, Sub};

use good_lp::{constraint, solvers::highs::highs, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    FeasibleWithGap,
    Infeasible,
    Timeout,
    /// No `optimize()` call has happened yet.
    NotSolved,
}

/// A linear combination of decision variables plus a constant, independent
/// of any concrete solver crate's expression type.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn constant(c: f64) -> Self {
        LinExpr { terms: Vec::new(), constant: c }
    }

    pub fn term(var: VarId, coef: f64) -> Self {
        LinExpr { terms: vec![(var, coef)], constant: 0.0 }
    }

    pub fn add_term(mut self, var: VarId, coef: f64) -> Self {
        self.terms.push((var, coef));
        self
    }

    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        LinExpr { terms: vars.into_iter().map(|v| (v, 1.0)).collect(), constant: 0.0 }
    }

    pub fn eq(self, rhs: f64) -> Constraint {
        Constraint { expr: self, op: ConstraintOp::Eq, rhs }
    }

    pub fn leq(self, rhs: f64) -> Constraint {
        Constraint { expr: self, op: ConstraintOp::Leq, rhs }
    }

    pub fn geq(self, rhs: f64) -> Constraint {
        Constraint { expr: self, op: ConstraintOp::Geq, rhs }
    }
}

impl From<VarId> for LinExpr {
    fn from(v: VarId) -> Self {
        LinExpr::term(v, 1.0)
    }
}

impl Add for LinExpr {
    type Output = LinExpr;
    fn add(mut self, rhs: LinExpr) -> LinExpr {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl Add<VarId> for LinExpr {
    type Output = LinExpr;
    fn add(self, rhs: VarId) -> LinExpr {
        self + LinExpr::from(rhs)
    }
}

impl Mul<f64> for VarId {
    type Output = LinExpr;
    fn mul(self, coef: f64) -> LinExpr {
        LinExpr::term(self, coef)
    }
}

impl Mul<VarId> for f64 {
    type Output = LinExpr;
    fn mul(self, var: VarId) -> LinExpr {
        LinExpr::term(var, self)
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;
    fn mul(mut self, coef: f64) -> LinExpr {
        for (_, c) in self.terms.iter_mut() {
            *c *= coef;
        }
        self.constant *= coef;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;
    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Sub for LinExpr {
    type Output = LinExpr;
    fn sub(self, rhs: LinExpr) -> LinExpr {
        self + (-rhs)
    }
}

impl Sub<VarId> for LinExpr {
    type Output = LinExpr;
    fn sub(self, rhs: VarId) -> LinExpr {
        self - LinExpr::from(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    Leq,
    Geq,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub expr: LinExpr,
    pub op: ConstraintOp,
    pub rhs: f64,
}

pub trait MipBackend {
    fn add_binary_var(&mut self) -> VarId;
    fn add_continuous_var(&mut self, lower: f64, upper: f64) -> VarId;
    fn add_linear_constraint(&mut self, constraint: Constraint);
    fn set_objective(&mut self, sense: Sense, expr: LinExpr);
    fn set_relative_gap(&mut self, gap: f64);
    fn set_time_limit(&mut self, seconds: f64);
    fn optimize(&mut self) -> SolveStatus;
    fn status(&self) -> SolveStatus;
    fn value(&self, var: VarId) -> f64;
}

/// `good_lp` + HiGHS backed implementation. `threads = 1` and a fixed
/// `random_seed` are set on every solve so repeated runs of the same
/// problem produce the same plan.
pub struct HighsBackend {
    vars: ProblemVariables,
    handles: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Option<(Sense, LinExpr)>,
    relative_gap: f64,
    time_limit_secs: f64,
    random_seed: i32,
    values: Option<Vec<f64>>,
    status: SolveStatus,
}

impl HighsBackend {
    pub fn new() -> Self {
        HighsBackend {
            vars: ProblemVariables::new(),
            handles: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            relative_gap: 0.01,
            time_limit_secs: 60.0,
            random_seed: 1234,
            values: None,
            status: SolveStatus::NotSolved,
        }
    }

    fn to_expression(&self, expr: &LinExpr) -> Expression {
        let mut e = Expression::from(expr.constant);
        for (var, coef) in &expr.terms {
            e = e + *coef * self.handles[var.0 as usize];
        }
        e
    }
}

impl Default for HighsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MipBackend for HighsBackend {
    fn add_binary_var(&mut self) -> VarId {
        let v = self.vars.add(good_lp::variable().binary());
        self.handles.push(v);
        VarId((self.handles.len() - 1) as u32)
    }

    fn add_continuous_var(&mut self, lower: f64, upper: f64) -> VarId {
        let v = self.vars.add(good_lp::variable().min(lower).max(upper));
        self.handles.push(v);
        VarId((self.handles.len() - 1) as u32)
    }

    fn add_linear_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    fn set_objective(&mut self, sense: Sense, expr: LinExpr) {
        self.objective = Some((sense, expr));
    }

    fn set_relative_gap(&mut self, gap: f64) {
        self.relative_gap = gap;
    }

    fn set_time_limit(&mut self, seconds: f64) {
        self.time_limit_secs = seconds;
    }

    fn optimize(&mut self) -> SolveStatus {
        let (sense, expr) = self.objective.clone().unwrap_or((Sense::Minimize, LinExpr::default()));
        let objective = self.to_expression(&expr);
        let pvars = std::mem::replace(&mut self.vars, ProblemVariables::new());

        let mut model = match sense {
            Sense::Minimize => pvars.minimise(objective).using(highs),
            Sense::Maximize => pvars.maximise(objective).using(highs),
        };
        model = model
            .set_option("time_limit", self.time_limit_secs)
            .set_option("threads", 1)
            .set_option("random_seed", self.random_seed)
            .set_option("mip_rel_gap", self.relative_gap);

        for c in &self.constraints {
            let lhs = self.to_expression(&c.expr);
            let built = match c.op {
                ConstraintOp::Eq => good_lp::constraint!(lhs == c.rhs),
                ConstraintOp::Leq => good_lp::constraint!(lhs <= c.rhs),
                ConstraintOp::Geq => good_lp::constraint!(lhs >= c.rhs),
            };
            model = model.with(built);
        }

        let started = std::time::Instant::now();
        self.status = match model.solve() {
            Ok(sol) => {
                self.values = Some(self.handles.iter().map(|&v| sol.value(v)).collect());
                SolveStatus::Optimal
            }
            Err(ResolutionError::Infeasible) => {
                self.values = None;
                SolveStatus::Infeasible
            }
            Err(_) => {
                self.values = None;
                // Other resolution errors don't say whether the wall-clock
                // cap fired; an error surfacing at or past the configured
                // limit is treated as a timeout.
                if started.elapsed().as_secs_f64() >= self.time_limit_secs {
                    SolveStatus::Timeout
                } else {
                    SolveStatus::Infeasible
                }
            }
        };
        self.status
    }

    fn status(&self) -> SolveStatus {
        self.status
    }

    fn value(&self, var: VarId) -> f64 {
        match &self.values {
            Some(values) => values[var.0 as usize],
            None => 0.0,
        }
    }
}
