//! End-to-end tests of the decomposition loop on small hand-checked models.

use std::sync::{Arc, Mutex};

use gdd_algo::backend::{BackendError, ClarabelBackend, QpProblem, QpSolution, SolverBackend};
use gdd_algo::lagrange::{
    solve_blocks, update_multipliers, BlockVariant, DecompositionSession, FixVariables,
};
use gdd_algo::{
    InitialMultipliers, LagrangeConfig, LagrangeError, LagrangeSolution, LagrangeSolver,
    TerminationStatus, UpdateMethod,
};
use gdd_core::{LinearTerm, LinkTerm, ModelGraph, Objective, ObjectiveSense, Relation, Variable};

const TOL: f64 = 1e-4;

/// Two single-variable blocks on [0, 10] with the given costs, linked by
/// `ca·a + cb·b (relation) rhs`.
fn pair(
    cost_a: f64,
    cost_b: f64,
    link: (f64, f64),
    relation: Relation,
    rhs: f64,
) -> ModelGraph {
    let mut graph = ModelGraph::new("pair");
    let ba = graph.add_block("a");
    let bb = graph.add_block("b");
    let a = graph.add_variable(ba, Variable::continuous("a", 0.0, 10.0));
    let b = graph.add_variable(bb, Variable::continuous("b", 0.0, 10.0));
    graph.set_objective(ba, Objective::linear(vec![LinearTerm::new(0, cost_a)]));
    graph.set_objective(bb, Objective::linear(vec![LinearTerm::new(0, cost_b)]));
    graph.link(
        "link",
        vec![LinkTerm::new(a, link.0), LinkTerm::new(b, link.1)],
        relation,
        rhs,
    );
    graph
}

/// min a + 2b  s.t.  a + b = 4. Optimum 4 at a = 4, b = 0; λ* = −1.
fn shared_demand() -> ModelGraph {
    pair(1.0, 2.0, (1.0, 1.0), Relation::Eq, 4.0)
}

/// Backend that records whether each problem it sees is quadratic.
struct RecordingBackend {
    inner: ClarabelBackend,
    quadratic: Arc<Mutex<Vec<bool>>>,
}

impl SolverBackend for RecordingBackend {
    fn id(&self) -> &str {
        "recording"
    }

    fn supports_quadratic(&self) -> bool {
        true
    }

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, BackendError> {
        self.quadratic.lock().unwrap().push(problem.is_quadratic());
        self.inner.solve(problem)
    }
}

/// Backend without quadratic support.
struct LpOnly;

impl SolverBackend for LpOnly {
    fn id(&self) -> &str {
        "lp-only"
    }

    fn supports_quadratic(&self) -> bool {
        false
    }

    fn solve(&self, problem: &QpProblem) -> Result<QpSolution, BackendError> {
        ClarabelBackend::new().solve(problem)
    }
}

#[test]
fn test_equal_pair_converges_in_first_iteration() {
    // min x1 + x2  s.t.  x1 = x2: both blocks pick 0 at λ = 0
    let graph = pair(1.0, 1.0, (1.0, -1.0), Relation::Eq, 0.0);
    let solution = LagrangeSolver::default()
        .with_epsilon(1e-4)
        .solve(&graph)
        .unwrap();

    assert_eq!(solution.termination, TerminationStatus::Optimal);
    assert_eq!(solution.num_iterations(), 1);
    assert!(solution.dual_bound.unwrap().abs() < TOL);
    assert!(solution.residual_norm < 1e-4);
    // converged before any update
    assert!(solution.primal_bound.is_none());
    assert_eq!(solution.multipliers, vec![0.0]);
}

#[test]
fn test_large_alpha_keeps_iterates_finite() {
    // min a − b  s.t.  a − b = 0 oscillates, so every iteration takes a step
    // λ: 0 → −1000 → 998000
    let graph = pair(1.0, -1.0, (1.0, -1.0), Relation::Eq, 0.0);
    let solution = LagrangeSolver::default()
        .with_alpha(1000.0)
        .with_max_iterations(3)
        .solve(&graph)
        .unwrap();

    assert_eq!(solution.termination, TerminationStatus::MaxIterations);
    assert_eq!(solution.num_iterations(), 3);
    assert!(solution.multipliers.iter().all(|l| l.is_finite()));
    assert!(solution.iterations.iter().all(|r| r.dual_bound.is_finite()));
    assert!((solution.dual_bound.unwrap() + 10.0).abs() < 1e-3);
    assert!(solution.primal_bound.unwrap().abs() < TOL);
}

#[test]
fn test_subgradient_trace_matches_hand_computation() {
    // min a − b  s.t.  a − b = 0
    // λ = 0:  a = 0,  b = 10, Z = −10, res = −10, step 2·10/100 = 0.2 → λ = −2
    // λ = −2: a = 10, b = 0,  Z = −10, res = +10 → λ = 0
    let graph = pair(1.0, -1.0, (1.0, -1.0), Relation::Eq, 0.0);
    let solution = LagrangeSolver::default()
        .with_method(UpdateMethod::Subgradient)
        .with_alpha(2.0)
        .with_max_iterations(3)
        .solve(&graph)
        .unwrap();

    assert_eq!(solution.termination, TerminationStatus::MaxIterations);
    assert_eq!(solution.num_iterations(), 3);
    for (k, record) in solution.iterations.iter().enumerate() {
        assert_eq!(record.iteration, k + 1);
        assert!((record.dual_bound + 10.0).abs() < TOL, "{:?}", record);
        assert!((record.residual_norm - 10.0).abs() < 1e-3);
    }
    assert!((solution.multipliers[0] + 2.0).abs() < 1e-3);
    assert!(solution.primal_bound.unwrap().abs() < TOL);
    assert!((solution.dual_bound.unwrap() + 10.0).abs() < TOL);
}

#[test]
fn test_trace_timing_is_monotone() {
    let solution = LagrangeSolver::default()
        .with_max_iterations(4)
        .solve(&shared_demand())
        .unwrap();
    let elapsed: Vec<f64> = solution.iterations.iter().map(|r| r.elapsed_secs).collect();
    assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
    assert!(solution
        .iterations
        .iter()
        .all(|r| r.iteration_secs >= 0.0 && r.iteration_secs <= r.elapsed_secs));
}

#[test]
fn test_every_method_respects_weak_duality() {
    let graph = shared_demand();
    for method in UpdateMethod::ALL {
        let config = LagrangeConfig {
            update_method: method,
            max_iterations: 12,
            cp_bound: 100.0,
            ..LagrangeConfig::default()
        };
        let solution = LagrangeSolver::new(config).solve(&graph).unwrap();
        let dual = solution.dual_bound.unwrap();
        assert!(dual <= 4.0 + TOL, "{method}: dual {dual} above the optimum");
        assert!(dual >= -TOL, "{method}: best dual below Z(0)");
        assert!(solution.iterations[0].dual_bound.abs() < TOL);

        let primal = solution.primal_bound.unwrap();
        assert!((primal - 4.0).abs() < TOL);
        assert!(dual <= primal + TOL, "{method}: dual {dual} above primal {primal}");
    }
}

#[test]
fn test_admm_best_dual_ignores_penalized_sweeps() {
    let solution = LagrangeSolver::default()
        .with_method(UpdateMethod::Admm)
        .with_max_iterations(12)
        .solve(&shared_demand())
        .unwrap();
    // only the first, unpenalized sweep is a bound: Z(0) = 0
    assert!(solution.dual_bound.unwrap().abs() < TOL);
    assert!(solution.dual_bound.unwrap() <= solution.primal_bound.unwrap() + TOL);
}

#[test]
fn test_cutting_planes_reach_dual_optimum() {
    let config = LagrangeConfig {
        update_method: UpdateMethod::CuttingPlanes,
        max_iterations: 10,
        cp_bound: 100.0,
        ..LagrangeConfig::default()
    };
    let solution = LagrangeSolver::new(config).solve(&shared_demand()).unwrap();
    let dual = solution.dual_bound.unwrap();
    assert!((dual - 4.0).abs() < 1e-2, "{dual}");
    assert_eq!(solution.num_cuts, solution.num_iterations());
    assert!(solution.gap.unwrap() < 1e-2);
    // η bounds the dual function from above
    assert!(solution.last_bound.unwrap() >= dual - 1e-2);
}

#[test]
fn test_master_bound_never_increases() {
    let graph = shared_demand();
    let config = LagrangeConfig {
        update_method: UpdateMethod::CuttingPlanes,
        cp_bound: 100.0,
        ..LagrangeConfig::default()
    };
    let backend = ClarabelBackend::new();
    let heuristic = FixVariables::binaries();
    let mut session = DecompositionSession::new(&graph);
    session.prepare(&config).unwrap();

    let mut previous = f64::INFINITY;
    for iteration in 1..=6 {
        let results = solve_blocks(
            &session,
            session.multipliers(),
            session.value_matrix(),
            BlockVariant::Plain,
            &backend,
        )
        .unwrap();
        session.absorb(&results);
        let outcome = update_multipliers(
            &mut session,
            UpdateMethod::CuttingPlanes,
            iteration,
            &heuristic,
            &backend,
            &config,
        )
        .unwrap();

        assert!(outcome.bound <= previous + 1e-3, "η rose at iteration {iteration}");
        previous = outcome.bound;
        assert_eq!(session.master().num_cuts(), iteration);
        for cut in session.master().cuts() {
            assert!(outcome.bound <= cut.evaluate(&outcome.multipliers) + 1e-3);
        }
        session.set_multipliers(outcome.multipliers).unwrap();
    }
}

#[test]
fn test_bundle_stays_inside_trust_box() {
    let graph = shared_demand();
    let config = LagrangeConfig {
        update_method: UpdateMethod::Bundle,
        ..LagrangeConfig::default()
    };
    let backend = ClarabelBackend::new();
    let heuristic = FixVariables::binaries();
    let mut session = DecompositionSession::new(&graph);
    session.prepare(&config).unwrap();

    for iteration in 1..=4 {
        let results = solve_blocks(
            &session,
            session.multipliers(),
            session.value_matrix(),
            BlockVariant::Plain,
            &backend,
        )
        .unwrap();
        session.absorb(&results);
        let center = session.multipliers()[0];
        let res = session.residual()[0];

        let outcome = update_multipliers(
            &mut session,
            UpdateMethod::Bundle,
            iteration,
            &heuristic,
            &backend,
            &config,
        )
        .unwrap();
        let radius = outcome.step * res.abs();
        let next = outcome.multipliers[0];
        assert!(next >= center - radius - 1e-4 && next <= center + radius + 1e-4);
        session.set_multipliers(outcome.multipliers).unwrap();
    }
}

#[test]
fn test_admm_first_iteration_is_plain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let backend = RecordingBackend {
        inner: ClarabelBackend::new(),
        quadratic: Arc::clone(&log),
    };
    LagrangeSolver::default()
        .with_method(UpdateMethod::Admm)
        .with_max_iterations(2)
        .with_backend(backend)
        .solve(&shared_demand())
        .unwrap();

    let log = log.lock().unwrap();
    // two block solves, then the heuristic, all without a penalty
    assert!(log.len() >= 5);
    assert!(log[..3].iter().all(|q| !q));
    // second sweep carries the consensus penalty
    assert!(log[3..5].iter().all(|q| *q));
}

#[test]
fn test_admm_requires_quadratic_backend() {
    let err = LagrangeSolver::default()
        .with_method(UpdateMethod::Admm)
        .with_backend(LpOnly)
        .solve(&shared_demand())
        .unwrap_err();
    assert!(matches!(err, LagrangeError::InvalidConfig(_)));
}

#[test]
fn test_maximization_reports_bounds_in_graph_sense() {
    // max x1 + x2  s.t.  x1 = x2  →  both at 10, objective 20
    let graph = pair(1.0, 1.0, (1.0, -1.0), Relation::Eq, 0.0).with_sense(ObjectiveSense::Maximize);
    let solution = LagrangeSolver::default().solve(&graph).unwrap();
    assert_eq!(solution.termination, TerminationStatus::Optimal);
    assert!((solution.dual_bound.unwrap() - 20.0).abs() < 1e-3);
}

#[test]
fn test_relaxation_start_is_dual_optimal() {
    let solution = LagrangeSolver::default()
        .with_initial_multipliers(InitialMultipliers::Relaxation)
        .with_max_iterations(2)
        .solve(&shared_demand())
        .unwrap();
    assert!((solution.relaxation_bound.unwrap() - 4.0).abs() < 1e-4);
    assert!((solution.iterations[0].dual_bound - 4.0).abs() < 1e-3);
}

#[test]
fn test_satisfied_inequality_link_converges() {
    // min −a + b  s.t.  a − b ≤ 100: slack at λ = 0
    let graph = pair(-1.0, 1.0, (1.0, -1.0), Relation::Le, 100.0);
    let solution = LagrangeSolver::default().solve(&graph).unwrap();
    assert_eq!(solution.termination, TerminationStatus::Optimal);
    assert!((solution.dual_bound.unwrap() + 10.0).abs() < TOL);
}

#[test]
fn test_violated_inequality_keeps_sign() {
    // min −a + b  s.t.  a − b ≤ 2: optimum −2, multiplier must stay ≥ 0
    let graph = pair(-1.0, 1.0, (1.0, -1.0), Relation::Le, 2.0);
    let solution = LagrangeSolver::default()
        .with_max_iterations(8)
        .solve(&graph)
        .unwrap();
    assert!(solution.multipliers[0] >= 0.0);
    for record in &solution.iterations {
        assert!(record.dual_bound <= -2.0 + TOL);
    }
}

#[test]
fn test_time_limit_stops_before_first_iteration() {
    let solution = LagrangeSolver::default()
        .with_time_limit(1e-12)
        .solve(&shared_demand())
        .unwrap();
    assert_eq!(solution.termination, TerminationStatus::TimeLimit);
    assert!(solution.iterations.is_empty());
    assert!(solution.dual_bound.is_none());

    // the written solution reads back
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("solution.json");
    solution.to_json(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let reloaded: LagrangeSolution = serde_json::from_str(&text).unwrap();
    assert_eq!(reloaded.termination, TerminationStatus::TimeLimit);
    assert!(reloaded.dual_bound.is_none());
}

/// Block a: integer z in [0, 3] with cost −1; block b: y in [0, 2.5];
/// z − y = 0. Integer optimum −2.
fn integer_pair() -> ModelGraph {
    let mut graph = ModelGraph::new("integer");
    let ba = graph.add_block("a");
    let bb = graph.add_block("b");
    let z = graph.add_variable(ba, Variable::integer("z", 0.0, 3.0));
    let y = graph.add_variable(bb, Variable::continuous("y", 0.0, 2.5));
    graph.set_objective(ba, Objective::linear(vec![LinearTerm::new(0, -1.0)]));
    graph.link(
        "match",
        vec![LinkTerm::new(z, 1.0), LinkTerm::new(y, -1.0)],
        Relation::Eq,
        0.0,
    );
    graph
}

#[test]
fn test_fix_binaries_rejects_free_integers_on_continuous_backend() {
    let err = LagrangeSolver::default()
        .solve(&integer_pair())
        .unwrap_err();
    assert!(matches!(err, LagrangeError::InvalidConfig(_)));
}

#[test]
fn test_unknown_method_string() {
    let err = "steepest".parse::<UpdateMethod>().unwrap_err();
    assert!(err.to_string().contains("cuttingplanes"));
}

#[test]
fn test_invalid_graph_is_rejected() {
    let mut graph = shared_demand();
    graph.links[0].terms.truncate(1);
    let err = LagrangeSolver::default().solve(&graph).unwrap_err();
    assert!(matches!(err, LagrangeError::Model(_)));
}
