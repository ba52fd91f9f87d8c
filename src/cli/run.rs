use energiebilanz::{
    io::{RawInputs, export_year},
    prelude::*,
    simulation::{YearSummary, run_years},
    tables::{
        build_balance_table,
        build_cost_table,
        build_event_table,
        build_fleet_table,
        build_kpi_table,
        build_storage_table,
        build_validation_table,
    },
};
use rayon::ThreadPoolBuilder;

use crate::cli::RunArgs;

#[instrument(skip_all)]
pub fn run(args: &RunArgs) -> Result {
    let scenario = args.scenario.load()?;
    let inputs = RawInputs::load(&scenario)?;
    let settings = scenario.settings();

    // Zero threads let rayon pick:
    let pool = ThreadPoolBuilder::new()
        .num_threads(args.threads.unwrap_or_default())
        .build()
        .context("failed to build the thread pool")?;
    info!(n_threads = pool.current_num_threads(), n_years = scenario.years.len(), "simulating…");
    let outcomes = pool.install(|| run_years(&scenario.years, &settings, |year| inputs.for_year(year)))?;

    for outcome in &outcomes {
        if !outcome.validation.is_within(args.demand_tolerance) {
            warn!(
                year = outcome.year,
                max_relative_error = outcome.validation.max_relative_error(),
                "synthesized demand misses the targets",
            );
        }
        if let Some(directory) = &args.export {
            export_year(directory, outcome)?;
        }
    }

    if args.json {
        let summaries: Vec<YearSummary> = outcomes.iter().map(|outcome| outcome.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    for outcome in &outcomes {
        println!("{}", build_balance_table(outcome));
        if let Some(fleet) = &outcome.fleet {
            println!("{}", build_fleet_table(fleet));
        }
        println!("{}", build_storage_table(outcome));
        println!("{}", build_event_table(outcome));
        println!("{}", build_cost_table(&outcome.costs));
        println!("{}", build_kpi_table(&outcome.scorecard));
        println!("{}", build_validation_table(&outcome.validation, args.demand_tolerance));
    }
    Ok(())
}
