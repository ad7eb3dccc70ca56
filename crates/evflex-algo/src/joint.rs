//! Simultaneous all-agents program over the full horizon.
//!
//! Far more expensive than [`crate::scheduler::SequentialScheduler`]; used
//! as the exact reference the sequential sweep is measured against.

use crate::objective::assemble_joint_objective;
use crate::program::AgentProgramBuilder;
use crate::qp::{QpModel, SolveStatus, SolverAdapter};
use crate::scheduler::{ScheduleOutcome, ScheduleParams, UnitState, DEMAND_THRESHOLD};
use crate::slack::estimate_slack;
use crate::ScheduleError;
use evflex_core::{Agent, Demand, ResidualLoad};
use tracing::{info, warn};

/// Solve every agent in one model against a fixed residual load.
///
/// The residual load is not modified. Objective value of the returned
/// schedule is `Σ_t [2·r_t·P_t + P_t²]` with `P_t` the fleet power.
pub fn solve_joint(
    agents: &[Agent],
    residual: &ResidualLoad,
    params: &ScheduleParams,
    solver: &dyn SolverAdapter,
) -> Result<ScheduleOutcome, ScheduleError> {
    params.validate()?;
    let eta_dt = params.eta_dt();

    let mut model = QpModel::new();
    let mut programs = Vec::with_capacity(agents.len());
    let mut outcome = ScheduleOutcome::default();

    for agent in agents {
        if let Some(event) = agent.events.iter().find(|e| e.stop() > residual.len()) {
            return Err(ScheduleError::InvalidInput(format!(
                "agent {} has an event ending at step {}, residual load has {} steps",
                agent.id,
                event.stop(),
                residual.len()
            )));
        }
        let start_energy = agent.start_energy(params.soc_start);
        let estimate = estimate_slack(agent, &agent.events, start_energy, eta_dt);
        outcome.slack.insert(agent.id.clone(), estimate.total());
        outcome
            .ledger
            .insert((agent.id.clone(), 0), UnitState::Pending);

        let program = AgentProgramBuilder::new(agent, &agent.events, eta_dt)
            .with_slack(&estimate)
            .with_start_energy(start_energy)
            .with_goal_energy(start_energy)
            .build(&mut model);
        programs.push(program);
    }

    let powers: Vec<_> = programs.iter().map(|p| &p.power).collect();
    assemble_joint_objective(&mut model, &powers, residual.as_slice());

    info!(
        agents = agents.len(),
        variables = model.num_vars(),
        constraints = model.num_constraints(),
        solver = solver.id(),
        "solving joint program"
    );
    let solved = solver.solve(model)?;
    match solved.status {
        SolveStatus::Optimal => {}
        SolveStatus::FeasibleSuboptimal => {
            warn!(status = %solved.raw_status, "joint solution suboptimal, accepting");
            for agent in agents {
                outcome.suboptimal.push((agent.id.clone(), 0));
            }
        }
        SolveStatus::Failed => {
            return Err(ScheduleError::JointSolveFailed {
                status: solved.raw_status,
            });
        }
    }

    for (agent, program) in agents.iter().zip(&programs) {
        let demand: Demand = program
            .power
            .iter()
            .map(|(&t, &p)| (t, solved.value(p)))
            .filter(|&(_, power)| power > DEMAND_THRESHOLD)
            .collect();
        outcome.demand.insert(agent.id.clone(), demand);
        outcome
            .ledger
            .insert((agent.id.clone(), 0), UnitState::Solved);
    }

    Ok(outcome)
}
