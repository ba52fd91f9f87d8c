//! CSV ingestion of the scenario inputs and export of the per-interval results.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::{
    core::{
        calendar::{DayType, DayWeighting},
        demand::{HeatPumpProfile, LoadProfileShape, Sector, TemperatureBin},
        dispatch::StorageKind,
        generation::{ReferenceSeries, Technology},
        series::{Conform, Sampling, TimeSeries, YearAlignment},
    },
    prelude::*,
    quantity::power::Megawatts,
    scenario::Scenario,
    simulation::{YearInputs, YearOutcome},
};

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Raw inputs of a scenario, read once and conformed to each target year on demand.
pub struct RawInputs {
    profiles: Vec<LoadProfileShape>,
    heat_pump_profile: Option<HeatPumpProfile>,
    temperature: Option<Vec<(NaiveDateTime, f64)>>,
    references: Vec<RawReference>,
    alignment: YearAlignment,
}

struct RawReference {
    technology: Technology,
    capacity: Megawatts,
    points: Vec<(NaiveDateTime, f64)>,
}

impl RawInputs {
    #[instrument(skip_all, fields(scenario = %scenario.name))]
    pub fn load(scenario: &Scenario) -> Result<Self> {
        let inputs = &scenario.inputs;
        let profiles = inputs
            .profiles
            .iter()
            .map(|(sector, path)| read_profile(path, *sector, scenario.weighting(*sector)))
            .collect::<Result<Vec<_>>>()?;
        let heat_pump_profile = inputs.heat_pump_profile.as_deref().map(read_heat_pump_profile).transpose()?;
        let temperature = inputs.temperature.as_deref().map(read_series).transpose()?;
        let references = inputs
            .generation
            .iter()
            .map(|(technology, reference)| {
                Ok(RawReference {
                    technology: *technology,
                    capacity: reference.capacity,
                    points: read_series(&reference.path)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!(
            n_profiles = profiles.len(),
            n_references = references.len(),
            has_temperature = temperature.is_some(),
            "loaded the inputs",
        );
        Ok(Self { profiles, heat_pump_profile, temperature, references, alignment: inputs.alignment })
    }

    /// Conform the time series to the grid of the target year.
    pub fn for_year(&self, year: i32) -> crate::Result<YearInputs> {
        let temperature = self
            .temperature
            .as_ref()
            .map(|points| {
                Conform::builder()
                    .label("temperature")
                    .year(year)
                    .sampling(Sampling::Instantaneous)
                    .alignment(self.alignment)
                    .build()
                    .apply(points.clone())
            })
            .transpose()?;
        let references = self
            .references
            .iter()
            .map(|reference| {
                let label = reference.technology.to_string();
                let series = Conform::builder()
                    .label(&label)
                    .year(year)
                    .sampling(Sampling::Energy)
                    .alignment(self.alignment)
                    .build()
                    .apply(reference.points.clone())?;
                Ok(ReferenceSeries { technology: reference.technology, series, capacity: reference.capacity })
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(YearInputs {
            profiles: self.profiles.clone(),
            heat_pump_profile: self.heat_pump_profile.clone(),
            temperature,
            references,
        })
    }
}

pub fn read_series(path: &Path) -> Result<Vec<(NaiveDateTime, f64)>> {
    let text = read(path)?;
    parse_series(&text).with_context(|| format!("failed to parse the series `{}`", path.display()))
}

pub fn read_profile(path: &Path, sector: Sector, weighting: DayWeighting) -> Result<LoadProfileShape> {
    let text = read(path)?;
    parse_profile(&text, sector, weighting)
        .with_context(|| format!("failed to parse the {sector} load profile `{}`", path.display()))
}

pub fn read_heat_pump_profile(path: &Path) -> Result<HeatPumpProfile> {
    let text = read(path)?;
    parse_heat_pump_profile(&text)
        .with_context(|| format!("failed to parse the heat pump profile `{}`", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))
}

/// Parse `timestamp;value` rows, an optional header is skipped.
fn parse_series(text: &str) -> Result<Vec<(NaiveDateTime, f64)>> {
    let mut points = Vec::new();
    for (index, record) in reader(text, false).records().enumerate() {
        let record = record.with_context(|| format!("failed to read row #{}", index + 1))?;
        let timestamp = field(&record, 0)?;
        let Some(timestamp) = parse_timestamp(timestamp) else {
            if index == 0 {
                debug!(header = timestamp, "skipping the header");
                continue;
            }
            bail!("row #{}: `{timestamp}` is not a timestamp", index + 1);
        };
        let value = parse_number(field(&record, 1)?).with_context(|| format!("row #{}", index + 1))?;
        points.push((timestamp, value));
    }
    ensure!(!points.is_empty(), "the series is empty");
    Ok(points)
}

/// Parse `month;day_type;slot;weight` rows.
fn parse_profile(text: &str, sector: Sector, weighting: DayWeighting) -> Result<LoadProfileShape> {
    let rows = reader(text, true)
        .records()
        .enumerate()
        .map(|(index, record)| {
            let row = index + 2;
            let record = record.with_context(|| format!("failed to read row #{row}"))?;
            let month = field(&record, 0)?.parse::<u32>().with_context(|| format!("row #{row}: invalid month"))?;
            let day_type = parse_day_type(field(&record, 1)?).with_context(|| format!("row #{row}"))?;
            let slot = field(&record, 2)?.parse::<usize>().with_context(|| format!("row #{row}: invalid slot"))?;
            let weight = parse_number(field(&record, 3)?).with_context(|| format!("row #{row}"))?;
            Ok((month, day_type, slot, weight))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LoadProfileShape::from_rows(sector, weighting, rows)?)
}

/// Parse the `slot;LOW;-14;…;17;HIGH` matrix.
fn parse_heat_pump_profile(text: &str) -> Result<HeatPumpProfile> {
    let mut reader = reader(text, true);
    let bins = reader
        .headers()
        .context("failed to read the header")?
        .iter()
        .skip(1)
        .map(str::parse::<TemperatureBin>)
        .collect::<crate::Result<Vec<_>>>()?;
    ensure!(!bins.is_empty(), "the matrix has no temperature columns");

    let mut profile = HeatPumpProfile::default();
    for (index, record) in reader.records().enumerate() {
        let row = index + 2;
        let record = record.with_context(|| format!("failed to read row #{row}"))?;
        let slot = field(&record, 0)?.parse::<usize>().with_context(|| format!("row #{row}: invalid slot"))?;
        for (column, bin) in bins.iter().enumerate() {
            let value = parse_number(field(&record, column + 1)?).with_context(|| format!("row #{row}, {bin}"))?;
            profile.set(slot, *bin, value)?;
        }
    }
    Ok(profile)
}

/// Build a reader with the delimiter detected from the first line.
fn reader(text: &str, has_headers: bool) -> csv::Reader<&[u8]> {
    let first_line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
    let delimiter = if first_line.contains(';') { b';' } else { b',' };
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes())
}

fn field(record: &StringRecord, index: usize) -> Result<&str> {
    record.get(index).with_context(|| format!("missing column #{}", index + 1))
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS.iter().find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Accepts the decimal comma, in which case dots are thousands separators.
fn parse_number(text: &str) -> Result<f64> {
    let normalized = if text.contains(',') { text.replace('.', "").replace(',', ".") } else { text.to_string() };
    let value = normalized.parse::<f64>().with_context(|| format!("`{text}` is not a number"))?;
    ensure!(value.is_finite(), "`{text}` is not a finite number");
    Ok(value)
}

fn parse_day_type(text: &str) -> Result<DayType> {
    match text.to_lowercase().as_str() {
        "workday" | "werktag" | "wt" => Ok(DayType::Workday),
        "saturday" | "samstag" | "sa" => Ok(DayType::Saturday),
        "holiday" | "sunday" | "sonntag" | "feiertag" | "su" => Ok(DayType::Holiday),
        _ => bail!("`{text}` is not a day type"),
    }
}

/// Write the per-interval series of a simulated year to `<directory>/<year>.csv`.
#[instrument(skip_all, fields(year = outcome.year))]
pub fn export_year(directory: &Path, outcome: &YearOutcome) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create `{}`", directory.display()))?;
    let path = directory.join(format!("{}.csv", outcome.year));

    let mut headers = vec!["timestamp".to_string()];
    let mut columns: Vec<&TimeSeries> = Vec::new();
    for demand in &outcome.demands {
        headers.push(format!("demand_{}", column_name(&demand.sector.to_string())));
        columns.push(&demand.series);
    }
    for generation in &outcome.generation {
        headers.push(format!("generation_{}", column_name(&generation.technology.to_string())));
        columns.push(&generation.series);
    }
    headers.extend(["total_demand", "total_generation", "balance"].map(String::from));
    columns.extend([&outcome.balance.demand, &outcome.balance.generation, &outcome.balance.residual]);
    if let Some(fleet) = &outcome.fleet {
        headers.extend(
            ["ev_charged", "ev_discharged", "ev_driven", "ev_energy", "residual_after_ev"].map(String::from),
        );
        columns.extend([&fleet.charged, &fleet.discharged, &fleet.driven, &fleet.energy, &fleet.residual]);
    }
    for kind in StorageKind::all() {
        let trace = &outcome.dispatch.traces[kind];
        let name = column_name(&kind.to_string());
        headers.extend([format!("{name}_charged"), format!("{name}_discharged"), format!("{name}_soc")]);
        columns.extend([&trace.charged, &trace.discharged, &trace.soc]);
    }
    headers.push("residual_after_dispatch".to_string());
    columns.push(&outcome.dispatch.residual);

    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .from_path(&path)
        .with_context(|| format!("failed to create `{}`", path.display()))?;
    writer.write_record(&headers).context("failed to write the header")?;
    for (index, (timestamp, _)) in outcome.balance.residual.points().enumerate() {
        let record = std::iter::once(timestamp.format(EXPORT_TIMESTAMP_FORMAT).to_string())
            .chain(columns.iter().map(|series| series.values()[index].to_string()));
        writer.write_record(record).with_context(|| format!("failed to write the row for {timestamp}"))?;
    }
    writer.flush().context("failed to flush the export")?;
    info!(path = %path.display(), n_columns = headers.len(), "exported");
    Ok(path)
}

fn column_name(display: &str) -> String {
    display.to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;
    use crate::core::calendar::INTERVALS_PER_DAY;

    #[test]
    fn test_parse_series_with_header_and_decimal_comma() {
        let text = "Zeitstempel;Wert\n2023-01-01 00:00;1.234,5\n01.01.2023 00:15;-0,25\n";
        let points = parse_series(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].0, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 15, 0).unwrap());
        assert_abs_diff_eq!(points[0].1, 1234.5);
        assert_abs_diff_eq!(points[1].1, -0.25);
    }

    #[test]
    fn test_parse_series_with_commas() {
        let points = parse_series("2023-01-01T00:00:00,3.5\n2023-01-01T01:00:00,4\n").unwrap();
        assert_abs_diff_eq!(points[0].1, 3.5);
        assert_abs_diff_eq!(points[1].1, 4.0);
    }

    #[test]
    fn test_parse_series_rejects_garbage() {
        assert!(parse_series("2023-01-01 00:00;1\nnot a date;2\n").is_err());
        assert!(parse_series("timestamp;value\n").is_err());
        assert!(parse_series("2023-01-01 00:00;NaN\n").is_err());
        assert!(parse_series("2023-01-01 00:00;inf\n").is_err());
    }

    #[test]
    fn test_parse_profile() {
        let mut text = "month;day_type;slot;weight\n".to_string();
        for day_type in ["workday", "Samstag", "holiday"] {
            for slot in 0..INTERVALS_PER_DAY {
                text.push_str(&format!("1;{day_type};{slot};0,5\n"));
            }
        }
        let shape = parse_profile(&text, Sector::Household, DayWeighting::Uniform).unwrap();
        assert_abs_diff_eq!(shape.weights(1, DayType::Saturday).unwrap()[95], 0.5);
        assert!(shape.weights(2, DayType::Workday).is_err());
    }

    #[test]
    fn test_parse_profile_incomplete_day() {
        let text = "month;day_type;slot;weight\n1;workday;0;1\n";
        assert!(parse_profile(text, Sector::Commerce, DayWeighting::Uniform).is_err());
    }

    #[test]
    fn test_parse_heat_pump_profile() {
        let header = std::iter::once("slot".to_string())
            .chain(std::iter::once("LOW".to_string()))
            .chain((-14..=17).map(|degrees: i32| degrees.to_string()))
            .chain(std::iter::once("HIGH".to_string()))
            .collect::<Vec<_>>()
            .join(";");
        let mut text = format!("{header}\n");
        for slot in 0..INTERVALS_PER_DAY {
            let values = (0..34).map(|column| format!("{column},0")).collect::<Vec<_>>().join(";");
            text.push_str(&format!("{slot};{values}\n"));
        }
        let profile = parse_heat_pump_profile(&text).unwrap();
        assert_abs_diff_eq!(profile.value(0, TemperatureBin::Low).unwrap(), 0.0);
        assert_abs_diff_eq!(profile.value(10, TemperatureBin::Degrees(-14)).unwrap(), 1.0);
        assert_abs_diff_eq!(profile.value(95, TemperatureBin::High).unwrap(), 33.0);
    }

    #[test]
    fn test_parse_heat_pump_profile_bad_header() {
        assert!(parse_heat_pump_profile("slot;LOW;-20\n0;1;1\n").is_err());
    }

    #[test]
    fn test_column_name() {
        assert_eq!(column_name("pumped hydro"), "pumped_hydro");
    }
}
