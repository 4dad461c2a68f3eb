use std::fs;

use anyhow::{anyhow, Context, Result};
use gdd_algo::{
    HeuristicKind, InitialMultipliers, LagrangeConfig, LagrangeSolution, LagrangeSolver,
    LpSolverKind, UpdateMethod,
};
use gdd_cli::cli::SolveArgs;
use gdd_core::load_graph;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{info, warn};

/// Compact summary printed with `--json`.
#[derive(Debug, Serialize)]
struct SolveSummary<'a> {
    graph: &'a str,
    status: String,
    method: String,
    converged: bool,
    iterations: usize,
    dual_bound: Option<f64>,
    primal_bound: Option<f64>,
    gap: Option<f64>,
    residual_norm: f64,
    multipliers: &'a [f64],
    solve_time_ms: u128,
}

/// Settings file first, then command-line overrides.
fn resolve_config(args: &SolveArgs) -> Result<LagrangeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<LagrangeConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => LagrangeConfig::default(),
    };

    if let Some(method) = &args.method {
        config.update_method = method.parse::<UpdateMethod>()?;
    }
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    if let Some(eps) = args.epsilon {
        config.epsilon = eps;
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(limit) = args.time_limit {
        config.time_limit = limit;
    }
    if let Some(h) = &args.heuristic {
        config.heuristic = h.parse::<HeuristicKind>()?;
    }
    if let Some(init) = &args.initial_multipliers {
        config.initial_multipliers = init.parse::<InitialMultipliers>()?;
    }
    if let Some(solver) = &args.master_solver {
        config.master_solver = solver.parse::<LpSolverKind>().map_err(|e| anyhow!(e))?;
    }

    config.validate()?;
    Ok(config)
}

fn configure_threads(count: usize) {
    if count == 0 {
        return;
    }
    if let Err(err) = ThreadPoolBuilder::new().num_threads(count).build_global() {
        warn!("could not size the thread pool: {err}");
    }
}

fn print_summary(graph: &str, solution: &LagrangeSolution) {
    println!("Dual decomposition of {}", graph);
    println!("  Status:        {}", solution.termination);
    println!("  Method:        {}", solution.method);
    println!("  Iterations:    {}", solution.num_iterations());
    match solution.dual_bound {
        Some(d) => println!("  Dual bound:    {:.6}", d),
        None => println!("  Dual bound:    -"),
    }
    match solution.primal_bound {
        Some(p) => println!("  Primal bound:  {:.6}", p),
        None => println!("  Primal bound:  -"),
    }
    if let Some(gap) = solution.gap {
        println!("  Gap:           {:.4}%", 100.0 * gap);
    }
    if let Some(r) = solution.relaxation_bound {
        println!("  LP relaxation: {:.6}", r);
    }
    println!("  Residual norm: {:.3e}", solution.residual_norm);
    if solution.method.uses_cuts() {
        println!("  Cuts:          {}", solution.num_cuts);
    }
    println!("  Solve time:    {} ms", solution.solve_time_ms);
}

pub fn handle(args: &SolveArgs) -> Result<()> {
    let config = resolve_config(args)?;
    configure_threads(args.threads);

    let graph = load_graph(&args.graph)
        .with_context(|| format!("loading {}", args.graph.display()))?;
    info!(
        graph = %graph.name,
        method = %config.update_method,
        "solving model graph"
    );

    let solution = LagrangeSolver::new(config)
        .solve(&graph)
        .with_context(|| format!("decomposing {}", args.graph.display()))?;

    if let Some(path) = &args.out {
        solution.to_json(path)?;
        info!("wrote solution to {}", path.display());
    }
    if let Some(path) = &args.trace {
        solution.trace_to_csv(path)?;
        info!("wrote iteration trace to {}", path.display());
    }

    if args.json {
        let summary = SolveSummary {
            graph: &graph.name,
            status: solution.termination.to_string(),
            method: solution.method.to_string(),
            converged: solution.converged(),
            iterations: solution.num_iterations(),
            dual_bound: solution.dual_bound,
            primal_bound: solution.primal_bound,
            gap: solution.gap,
            residual_norm: solution.residual_norm,
            multipliers: &solution.multipliers,
            solve_time_ms: solution.solve_time_ms,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&graph.name, &solution);
    }
    if !solution.converged() {
        warn!(
            status = %solution.termination,
            residual = solution.residual_norm,
            "linking constraints not satisfied within epsilon"
        );
    }
    Ok(())
}
