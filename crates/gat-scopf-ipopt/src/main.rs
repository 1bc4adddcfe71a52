//! IPOPT driver for security-constrained AC-OPF cases.
//!
//! 1. Reads a JSON [`ScopfCase`](case::ScopfCase) from stdin: the network,
//!    the contingency list, formulation settings and IPOPT options
//! 2. Builds the SCOPF instance and solves it with IPOPT
//! 3. Writes the [`ScopfSolution`] JSON to stdout
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Converged (optimal or acceptable) |
//! | 1 | Invalid input or solver error |
//! | 2 | Solver finished without converging; the solution is still written |
//!
//! # Building
//!
//! Requires IPOPT to be installed on the system:
//! - Ubuntu/Debian: `sudo apt install coinor-libipopt-dev`
//! - macOS: `brew install ipopt`
//!
//! Build with: `cargo build -p gat-scopf-ipopt --features ipopt-sys --release`

mod case;

use anyhow::{Context, Result};
use case::ScopfCase;
use gat_scopf::{ProblemInstance, ScopfSolution};
use std::io::{self, Read, Write};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
enum ExitCode {
    Success = 0,
    Error = 1,
    NotConverged = 2,
}

fn main() {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    info!("gat-scopf-ipopt v{}", env!("CARGO_PKG_VERSION"));

    let exit_code = match run() {
        Ok(true) => ExitCode::Success,
        Ok(false) => ExitCode::NotConverged,
        Err(e) => {
            error!("SCOPF error: {:?}", e);
            ExitCode::Error
        }
    };

    std::process::exit(exit_code as i32);
}

/// Returns whether the solver converged.
fn run() -> Result<bool> {
    debug!("Reading case from stdin...");
    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .context("Failed to read case from stdin")?;

    if input.is_empty() {
        anyhow::bail!("Empty input - no case data received");
    }

    let case = ScopfCase::from_json(&input)?;
    info!(
        "Case: {} buses, {} generators, {} branches, {} contingencies",
        case.network.buses.len(),
        case.network.generators.len(),
        case.network.branches.len(),
        case.contingencies.len()
    );

    let instance = ProblemInstance::new(&case.network, &case.contingencies, case.config.clone())
        .context("Failed to build SCOPF instance")?;

    let solution = solve(&case, &instance)?;
    let converged = solution.success;

    let json = serde_json::to_vec_pretty(&solution).context("Failed to serialize solution")?;
    let mut stdout = io::stdout();
    stdout
        .write_all(&json)
        .and_then(|_| stdout.write_all(b"\n"))
        .context("Failed to write solution to stdout")?;

    if converged {
        info!(
            "Solution written: objective={:.6}, iterations={}",
            solution.objective, solution.iterations
        );
    } else {
        warn!(
            "Solver did not converge (raw status {:?}); last iterate written",
            solution.raw_status
        );
    }

    Ok(converged)
}

#[cfg(feature = "ipopt-sys")]
fn solve(case: &ScopfCase, instance: &ProblemInstance) -> Result<ScopfSolution> {
    use gat_scopf::{IpoptEngine, ScopfSolver};

    let mut solver = ScopfSolver::new(IpoptEngine::new(case.solver.clone()));
    let warm_start = case.warm_start.then(|| instance.warm_start_from_network());
    let outcome = solver
        .solve(instance, warm_start.as_deref())
        .context("IPOPT solve failed")?;
    Ok(ScopfSolution::from_outcome(instance, &outcome)?)
}

#[cfg(not(feature = "ipopt-sys"))]
fn solve(_case: &ScopfCase, _instance: &ProblemInstance) -> Result<ScopfSolution> {
    error!("IPOPT is not available - this binary was built without ipopt-sys feature");
    error!("Rebuild with: cargo build -p gat-scopf-ipopt --features ipopt-sys --release");
    anyhow::bail!("IPOPT not available - rebuild with ipopt-sys feature")
}
