use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    core::{
        balance::BalanceMetrics,
        demand::ValidationSummary,
        dispatch::{EventKind, StorageKind},
        economics::CostBreakdown,
        mobility::FleetResult,
        scoring::Scorecard,
    },
    fmt::Percent,
    simulation::YearOutcome,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

fn right(content: impl ToString) -> Cell {
    Cell::new(content).set_alignment(CellAlignment::Right)
}

fn autarky_color(autarky: f64) -> Color {
    if autarky >= 0.99 {
        Color::Green
    } else if autarky >= 0.9 {
        Color::DarkYellow
    } else {
        Color::Red
    }
}

/// Balance metrics before and after the storage dispatch.
pub fn build_balance_table(outcome: &YearOutcome) -> Table {
    let before = &outcome.metrics;
    let after = &outcome.metrics_after_dispatch;
    let mut table = new_table();
    table.set_header(vec![
        Cell::new(outcome.year).add_attribute(Attribute::Bold),
        Cell::new("Before dispatch"),
        Cell::new("After dispatch"),
    ]);
    let rows: [(&str, fn(&BalanceMetrics) -> String); 9] = [
        ("Generation", |metrics| metrics.total_generation.to_string()),
        ("Demand", |metrics| metrics.total_demand.to_string()),
        ("Surplus", |metrics| metrics.total_surplus.to_string()),
        ("Deficit", |metrics| metrics.total_deficit.to_string()),
        ("Surplus hours", |metrics| metrics.surplus_hours.to_string()),
        ("Deficit hours", |metrics| metrics.deficit_hours.to_string()),
        ("Max surplus", |metrics| metrics.max_surplus.to_string()),
        ("Max deficit", |metrics| metrics.max_deficit.to_string()),
        ("Residual load p50", |metrics| {
            metrics.residual_load.map_or_else(|| "n/a".to_string(), |percentiles| format!("{:.0} MW", percentiles.p50))
        }),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), right(value(before)), right(value(after))]);
    }
    table.add_row(vec![
        Cell::new("Autarky").add_attribute(Attribute::Bold),
        right(Percent::<1>(before.autarky)).fg(autarky_color(before.autarky)),
        right(Percent::<1>(after.autarky)).fg(autarky_color(after.autarky)),
    ]);
    table
}

pub fn build_storage_table(outcome: &YearOutcome) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Storage", "Capacity", "Charged", "Discharged", "Final SoC", ""]);
    for kind in StorageKind::all() {
        let trace = &outcome.dispatch.traces[kind];
        let state = &outcome.dispatch.final_state.storages[kind];
        table.add_row(vec![
            Cell::new(kind),
            right(state.spec.capacity).add_attribute(Attribute::Dim),
            right(trace.total_charged()).fg(Color::Green),
            right(trace.total_discharged()).fg(Color::Red),
            right(state.soc),
            right(Percent::<1>(state.fraction())),
        ]);
    }
    table
}

pub fn build_event_table(outcome: &YearOutcome) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Event", "Intervals"]);
    for kind in EventKind::ALL {
        let count = outcome.dispatch.event_counts.get(&kind).copied().unwrap_or_default();
        let cell = right(count);
        table.add_row(vec![Cell::new(kind), if count == 0 { cell.add_attribute(Attribute::Dim) } else { cell }]);
    }
    if outcome.dispatch.n_clamped != 0 {
        table.add_row(vec![Cell::new("Clamped").fg(Color::Red), right(outcome.dispatch.n_clamped).fg(Color::Red)]);
    }
    table
}

pub fn build_cost_table(costs: &CostBreakdown) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Asset", "Investment", "Capital", "Fixed O&M", "Variable O&M", "Total", "CO₂, t"]);
    for cost in &costs.assets {
        table.add_row(vec![
            Cell::new(cost.asset),
            right(cost.investment),
            right(cost.annual_capital_cost),
            right(cost.annual_fixed_opex),
            right(cost.annual_variable_opex),
            right(cost.total_annual_cost()).add_attribute(Attribute::Bold),
            right(format!("{:.0}", cost.co2_emissions)).add_attribute(Attribute::Dim),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        right(costs.total_investment),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        right(costs.total_annual_cost).add_attribute(Attribute::Bold),
        right(format!("{:.0}", costs.total_co2_emissions)),
    ]);
    table.add_row(vec![
        Cell::new("LCOE").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        right(costs.system_lcoe),
        right(format!("{:.2} ct/kWh", costs.lcoe_cents_per_kilowatt_hour())).fg(Color::Cyan),
        Cell::new(""),
    ]);
    table
}

pub fn build_fleet_table(fleet: &FleetResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["E-mobility", ""]);
    table.add_row(vec![Cell::new("Capacity"), right(fleet.capacity).add_attribute(Attribute::Dim)]);
    table.add_row(vec![Cell::new("Charged"), right(fleet.charged.total()).fg(Color::Green)]);
    table.add_row(vec![Cell::new("Fed back"), right(fleet.discharged.total()).fg(Color::Red)]);
    table.add_row(vec![Cell::new("Driven"), right(fleet.driven.total())]);
    table.add_row(vec![Cell::new("Mean SoC"), right(Percent::<1>(fleet.mean_soc()))]);
    if fleet.unmet_drive.is_positive() {
        table.add_row(vec![Cell::new("Unmet driving").fg(Color::Red), right(fleet.unmet_drive).fg(Color::Red)]);
    }
    table
}

fn score_color(score: f64) -> Color {
    if score >= 80.0 {
        Color::Green
    } else if score >= 60.0 {
        Color::DarkYellow
    } else if score >= 40.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

pub fn build_kpi_table(scorecard: &Scorecard) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Category", "KPI", "Value", "Score"]);
    for kpi in &scorecard.kpis {
        table.add_row(vec![
            Cell::new(kpi.category).add_attribute(Attribute::Dim),
            Cell::new(kpi.kpi),
            right(format!("{:.4}", kpi.value)),
            right(format!("{:.0}", kpi.score)).fg(score_color(kpi.score)),
        ]);
    }
    for (category, score) in &scorecard.categories {
        table.add_row(vec![
            Cell::new(category).add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(""),
            right(format!("{score:.0}")).fg(score_color(*score)).add_attribute(Attribute::Bold),
        ]);
    }
    table.add_row(vec![
        Cell::new("Overall").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        right(format!("{:.0}", scorecard.overall)).fg(score_color(scorecard.overall)).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn build_validation_table(validation: &ValidationSummary, tolerance: f64) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Sector", "Target", "Achieved", "Error"]);
    for sector in &validation.sectors {
        let error = sector.relative_error();
        table.add_row(vec![
            Cell::new(sector.sector),
            right(sector.target),
            right(sector.achieved),
            right(Percent::<4>(error)).fg(if error <= tolerance { Color::Green } else { Color::Red }),
        ]);
    }
    table
}
