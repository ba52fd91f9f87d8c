mod check;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use energiebilanz::{prelude::*, scenario::Scenario};

pub use self::{check::check, run::run};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Simulate the target years of a scenario.
    #[clap(name = "run")]
    Run(Box<RunArgs>),

    /// Load and validate a scenario and its inputs without simulating.
    #[clap(name = "check")]
    Check(Box<ScenarioArgs>),
}

#[derive(Parser)]
pub struct ScenarioArgs {
    /// Scenario file in TOML, input paths inside are relative to it.
    #[clap(long = "scenario", env = "ENERGIEBILANZ_SCENARIO")]
    pub path: PathBuf,

    /// Only simulate this target year.
    #[clap(long, env = "ENERGIEBILANZ_YEAR")]
    pub year: Option<i32>,
}

impl ScenarioArgs {
    pub fn load(&self) -> Result<Scenario> {
        let mut scenario = Scenario::from_file(&self.path)?;
        scenario.select_year(self.year)?;
        Ok(scenario)
    }
}

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    pub scenario: ScenarioArgs,

    /// Write the per-interval series of every year into this directory.
    #[clap(long, env = "ENERGIEBILANZ_EXPORT")]
    pub export: Option<PathBuf>,

    /// Print the year summaries as JSON instead of tables.
    #[clap(long)]
    pub json: bool,

    /// Number of years simulated at once, defaults to the number of CPUs.
    #[clap(long, env = "ENERGIEBILANZ_THREADS")]
    pub threads: Option<usize>,

    /// Relative tolerance of the synthesized annual demand.
    #[clap(long = "demand-tolerance", default_value = "0.005", env = "ENERGIEBILANZ_DEMAND_TOLERANCE")]
    pub demand_tolerance: f64,
}
