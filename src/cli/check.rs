use energiebilanz::{io::RawInputs, prelude::*};

use crate::cli::ScenarioArgs;

/// Everything short of the simulation: parse the inputs and conform them to every target year.
#[instrument(skip_all)]
pub fn check(args: &ScenarioArgs) -> Result {
    let scenario = args.load()?;
    let inputs = RawInputs::load(&scenario)?;
    for year in &scenario.years {
        let year_inputs =
            inputs.for_year(year.year).with_context(|| format!("inputs do not fit the year {}", year.year))?;
        for reference in &year_inputs.references {
            info!(
                year = year.year,
                technology = %reference.technology,
                capacity_factor = reference.capacity_factor()?,
                "reference series",
            );
        }
    }
    info!(name = %scenario.name, n_years = scenario.years.len(), "the scenario is valid");
    Ok(())
}
