//! Spreadsheet import of jobs: map CSV columns onto job fields, then turn rows
//! into jobs.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use db::{
    DBService,
    models::{
        customer::Customer,
        job::{CreateJob, Job, JobStatus, PricingUnit},
    },
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::text::normalize_business_name;
use uuid::Uuid;

use super::{claude_api::ClaudeApiClient, jobs::validate_measurements};

pub const MAX_IMPORT_ROWS: usize = 5_000;
const AI_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum JobImportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("no columns to map")]
    NoColumns,
    #[error("import has {0} rows, the limit is {MAX_IMPORT_ROWS}")]
    TooManyRows(usize),
    #[error("mapping refers to unknown column '{0}'")]
    UnknownColumn(String),
    #[error("mapping assigns {0} to more than one column")]
    DuplicateField(ImportField),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, EnumString,
    Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImportField {
    JobDate,
    JobNumber,
    CustomerName,
    Material,
    Source,
    Destination,
    Truck,
    Driver,
    Loads,
    VolumeM3,
    WeightTonnes,
    Hours,
    Price,
    PricingUnit,
    Notes,
}

impl ImportField {
    fn description(self) -> &'static str {
        match self {
            Self::JobDate => "date the job was done",
            Self::JobNumber => "docket, ticket or job reference",
            Self::CustomerName => "customer or client business name",
            Self::Material => "material hauled, e.g. fill, sand, topsoil",
            Self::Source => "pickup site or quarry",
            Self::Destination => "delivery site or tip",
            Self::Truck => "truck or rego",
            Self::Driver => "driver name",
            Self::Loads => "number of loads",
            Self::VolumeM3 => "volume in cubic metres",
            Self::WeightTonnes => "weight in tonnes",
            Self::Hours => "hours worked",
            Self::Price => "rate or unit price",
            Self::PricingUnit => "what the rate is per: load, tonne, m3 or hour",
            Self::Notes => "free-text notes or comments",
        }
    }

    /// Header spellings seen in hauling spreadsheets, already normalised.
    fn synonyms(self) -> &'static [&'static str] {
        match self {
            Self::JobDate => &["date", "job date", "delivery date", "day", "docket date"],
            Self::JobNumber => &["job number", "job no", "docket", "docket no", "ticket", "ticket no", "ref", "reference", "job id"],
            Self::CustomerName => &["customer", "customer name", "client", "client name", "company", "account", "bill to"],
            Self::Material => &["material", "product", "material type", "load type"],
            Self::Source => &["source", "from", "pickup", "pick up", "origin", "quarry", "site from"],
            Self::Destination => &["destination", "to", "delivery", "drop off", "tip", "site", "site to", "address"],
            Self::Truck => &["truck", "rego", "vehicle", "truck rego", "plant"],
            Self::Driver => &["driver", "operator", "driver name"],
            Self::Loads => &["loads", "load count", "no of loads", "trips", "qty", "quantity"],
            Self::VolumeM3 => &["volume", "m3", "cubic metres", "cubic meters", "cubes", "volume m3"],
            Self::WeightTonnes => &["weight", "tonnes", "tons", "tonnage", "t", "weight t", "net weight"],
            Self::Hours => &["hours", "hrs", "time", "hours worked"],
            Self::Price => &["price", "rate", "unit price", "cost", "charge", "amount"],
            Self::PricingUnit => &["unit", "per", "rate unit", "pricing unit", "uom"],
            Self::Notes => &["notes", "note", "comments", "comment", "description", "remarks"],
        }
    }
}

/// Column header → job field.
pub type ColumnMapping = BTreeMap<String, ImportField>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum MappingSource {
    Ai,
    Heuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MappingRequest {
    pub columns: Vec<String>,
    #[serde(default)]
    pub sample_rows: Vec<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MappingSuggestion {
    pub mapping: ColumnMapping,
    pub source: MappingSource,
    pub unmapped_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImportRequest {
    pub mapping: ColumnMapping,
    pub rows: Vec<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RowError {
    /// 1-based, matching the spreadsheet row after the header.
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImportResult {
    pub created: usize,
    pub linked_to_customers: usize,
    pub errors: Vec<RowError>,
}

fn normalize_header(header: &str) -> String {
    static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
    NON_ALNUM
        .replace_all(&header.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// True when `phrase` occurs in `header` on word boundaries.
fn contains_words(header: &str, phrase: &str) -> bool {
    format!(" {header} ").contains(&format!(" {phrase} "))
}

/// Maps columns by header spelling. Exact synonym matches are taken first,
/// then headers containing a synonym as whole words; each field is used once.
pub fn heuristic_mapping(columns: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let mut used: HashSet<ImportField> = HashSet::new();
    let normalized: Vec<(String, String)> = columns
        .iter()
        .map(|column| (column.clone(), normalize_header(column)))
        .collect();

    for (column, header) in &normalized {
        if let Some(field) = ImportField::iter()
            .find(|field| !used.contains(field) && field.synonyms().contains(&header.as_str()))
        {
            used.insert(field);
            mapping.insert(column.clone(), field);
        }
    }

    for (column, header) in &normalized {
        if mapping.contains_key(column) || header.is_empty() {
            continue;
        }
        let found = ImportField::iter().find(|field| {
            !used.contains(field)
                && field
                    .synonyms()
                    .iter()
                    .any(|synonym| synonym.len() > 1 && contains_words(header, synonym))
        });
        if let Some(field) = found {
            used.insert(field);
            mapping.insert(column.clone(), field);
        }
    }

    mapping
}

/// Keeps only entries naming a real column and a known field, first column
/// per field wins.
fn sanitize_ai_mapping(columns: &[String], raw: HashMap<String, Option<String>>) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();
    let mut used: HashSet<ImportField> = HashSet::new();
    for column in columns {
        let Some(Some(field_name)) = raw.get(column) else {
            continue;
        };
        let Ok(field) = field_name.parse::<ImportField>() else {
            continue;
        };
        if used.insert(field) {
            mapping.insert(column.clone(), field);
        }
    }
    mapping
}

fn mapping_prompt(request: &MappingRequest) -> String {
    let fields = ImportField::iter()
        .map(|field| format!("- {field}: {}", field.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let samples: Vec<_> = request.sample_rows.iter().take(AI_SAMPLE_ROWS).collect();
    format!(
        "Map spreadsheet columns from a trucking/haulage job log onto job fields.\n\n\
         Fields:\n{fields}\n\n\
         Columns: {columns}\n\n\
         Sample rows: {samples}\n\n\
         Reply with a single JSON object whose keys are the column names exactly as given \
         and whose values are a field name from the list or null. Use each field at most once.",
        columns = serde_json::to_string(&request.columns).unwrap_or_default(),
        samples = serde_json::to_string(&samples).unwrap_or_default(),
    )
}

fn suggestion(columns: &[String], mapping: ColumnMapping, source: MappingSource) -> MappingSuggestion {
    let unmapped_columns = columns
        .iter()
        .filter(|column| !mapping.contains_key(*column))
        .cloned()
        .collect();
    MappingSuggestion {
        mapping,
        source,
        unmapped_columns,
    }
}

/// Suggests a mapping, asking Claude when a client is configured and falling
/// back to header matching when it is not or the call fails.
pub async fn suggest_mapping(
    claude: Option<&ClaudeApiClient>,
    request: &MappingRequest,
) -> Result<MappingSuggestion, JobImportError> {
    if request.columns.is_empty() {
        return Err(JobImportError::NoColumns);
    }

    if let Some(client) = claude {
        let system = "You map spreadsheet columns to database fields. Reply with JSON only.";
        match client
            .ask_json::<HashMap<String, Option<String>>>(&mapping_prompt(request), Some(system), 1024)
            .await
        {
            Ok(raw) => {
                let mapping = sanitize_ai_mapping(&request.columns, raw);
                if !mapping.is_empty() {
                    return Ok(suggestion(&request.columns, mapping, MappingSource::Ai));
                }
                warn!("AI column mapping matched nothing, using header heuristics");
            }
            Err(e) => warn!(error = %e, "AI column mapping failed, using header heuristics"),
        }
    }

    let mapping = heuristic_mapping(&request.columns);
    Ok(suggestion(&request.columns, mapping, MappingSource::Heuristic))
}

fn validate_mapping(mapping: &ColumnMapping, rows: &[HashMap<String, String>]) -> Result<(), JobImportError> {
    let mut seen = HashSet::new();
    for field in mapping.values() {
        if !seen.insert(*field) {
            return Err(JobImportError::DuplicateField(*field));
        }
    }
    if let Some(first) = rows.first() {
        if let Some(column) = mapping.keys().find(|column| !first.contains_key(*column)) {
            return Err(JobImportError::UnknownColumn(column.clone()));
        }
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d", "%d/%m/%y"];
    let raw = raw.trim();
    // Spreadsheet exports often append a midnight time.
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Reads the first number out of cells like "$1,250.50", "12.5 t" or "3 loads".
pub fn parse_number(raw: &str) -> Option<f64> {
    static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));
    let cleaned = raw.replace(',', "");
    NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub fn parse_pricing_unit(raw: &str) -> Option<PricingUnit> {
    let unit = raw.trim().to_lowercase();
    let unit = unit.trim_start_matches("per ").trim_start_matches('/').trim();
    match unit {
        "load" | "loads" | "ld" | "trip" | "trips" => Some(PricingUnit::Load),
        "t" | "tonne" | "tonnes" | "ton" | "tons" => Some(PricingUnit::Tonne),
        "m3" | "m³" | "cubic metre" | "cubic metres" | "cubic meter" | "cubic meters" | "cube" => {
            Some(PricingUnit::CubicMetre)
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(PricingUnit::Hour),
        _ => None,
    }
}

/// Converts one mapped row into a job, or explains why it cannot.
pub fn parse_row(mapping: &ColumnMapping, row: &HashMap<String, String>) -> Result<CreateJob, String> {
    let mut job = CreateJob {
        status: Some(JobStatus::Completed),
        ..Default::default()
    };
    let mut has_content = false;

    for (column, field) in mapping {
        let Some(value) = row.get(column).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
            continue;
        };
        has_content = true;
        let number = || parse_number(value).ok_or_else(|| format!("{column}: '{value}' is not a number"));
        let text = || Some(value.to_string());

        match field {
            ImportField::JobDate => {
                job.job_date = Some(
                    parse_date(value).ok_or_else(|| format!("{column}: '{value}' is not a date"))?,
                )
            }
            ImportField::JobNumber => job.job_number = text(),
            ImportField::CustomerName => job.customer_name = text(),
            ImportField::Material => job.material = text(),
            ImportField::Source => job.source = text(),
            ImportField::Destination => job.destination = text(),
            ImportField::Truck => job.truck = text(),
            ImportField::Driver => job.driver = text(),
            ImportField::Notes => job.notes = text(),
            ImportField::Loads => job.loads = Some(number()?),
            ImportField::VolumeM3 => job.volume_m3 = Some(number()?),
            ImportField::WeightTonnes => job.weight_tonnes = Some(number()?),
            ImportField::Hours => job.hours = Some(number()?),
            ImportField::Price => job.price = Some(number()?),
            ImportField::PricingUnit => {
                job.pricing_unit = Some(
                    parse_pricing_unit(value)
                        .ok_or_else(|| format!("{column}: unknown pricing unit '{value}'"))?,
                )
            }
        }
    }

    if !has_content {
        return Err("row is empty".to_string());
    }
    if job.job_date.is_none() {
        return Err("missing job date".to_string());
    }
    validate_measurements([
        ("loads", job.loads),
        ("volume_m3", job.volume_m3),
        ("weight_tonnes", job.weight_tonnes),
        ("hours", job.hours),
        ("price", job.price),
    ])
    .map_err(|e| e.to_string())?;
    Ok(job)
}

/// Creates every valid row in one transaction. Rows whose customer name
/// matches exactly one existing customer are linked to it.
pub async fn import_jobs(
    db: &DBService,
    team_id: Uuid,
    request: &ImportRequest,
) -> Result<ImportResult, JobImportError> {
    if request.rows.len() > MAX_IMPORT_ROWS {
        return Err(JobImportError::TooManyRows(request.rows.len()));
    }
    validate_mapping(&request.mapping, &request.rows)?;

    let customers = customer_index(Customer::names_for_team(&db.pool, team_id).await?);

    let mut errors = Vec::new();
    let mut jobs = Vec::new();
    for (idx, row) in request.rows.iter().enumerate() {
        match parse_row(&request.mapping, row) {
            Ok(mut job) => {
                job.customer_id = job
                    .customer_name
                    .as_deref()
                    .and_then(|name| customers.get(&normalize_business_name(name)).copied().flatten());
                jobs.push(job);
            }
            Err(message) => errors.push(RowError { row: idx + 1, message }),
        }
    }

    let mut tx = db.begin().await?;
    for job in &jobs {
        Job::create(&mut *tx, team_id, job).await?;
    }
    tx.commit().await?;

    let linked_to_customers = jobs.iter().filter(|job| job.customer_id.is_some()).count();
    info!(
        team_id = %team_id,
        created = jobs.len(),
        linked = linked_to_customers,
        rejected = errors.len(),
        "Imported jobs"
    );

    Ok(ImportResult {
        created: jobs.len(),
        linked_to_customers,
        errors,
    })
}

/// Normalised name → customer id; `None` marks names shared by several customers.
fn customer_index(customers: Vec<(Uuid, String)>) -> HashMap<String, Option<Uuid>> {
    let mut index: HashMap<String, Option<Uuid>> = HashMap::new();
    for (id, name) in customers {
        index
            .entry(normalize_business_name(&name))
            .and_modify(|existing| *existing = None)
            .or_insert(Some(id));
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn heuristic_maps_common_headers() {
        let mapping = heuristic_mapping(&columns(&[
            "Date", "Docket No.", "Client", "Material", "Tonnes", "Rate ($)", "Comments", "Colour",
        ]));
        assert_eq!(mapping.get("Date"), Some(&ImportField::JobDate));
        assert_eq!(mapping.get("Docket No."), Some(&ImportField::JobNumber));
        assert_eq!(mapping.get("Client"), Some(&ImportField::CustomerName));
        assert_eq!(mapping.get("Material"), Some(&ImportField::Material));
        assert_eq!(mapping.get("Tonnes"), Some(&ImportField::WeightTonnes));
        assert_eq!(mapping.get("Rate ($)"), Some(&ImportField::Price));
        assert_eq!(mapping.get("Comments"), Some(&ImportField::Notes));
        assert_eq!(mapping.get("Colour"), None);
    }

    #[test]
    fn heuristic_matches_whole_words_only() {
        let mapping = heuristic_mapping(&columns(&[
            "Supervisor",
            "Preferred Contact",
            "Delivery Docket No",
        ]));
        assert_eq!(mapping.get("Supervisor"), None);
        assert_eq!(mapping.get("Preferred Contact"), None);
        assert_eq!(mapping.get("Delivery Docket No"), Some(&ImportField::JobNumber));
    }

    #[test]
    fn heuristic_uses_each_field_once() {
        let mapping = heuristic_mapping(&columns(&["Date", "Job Date"]));
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("Date"), Some(&ImportField::JobDate));
    }

    #[test]
    fn ai_mapping_is_sanitized() {
        let cols = columns(&["When", "Who", "Mystery"]);
        let raw: HashMap<String, Option<String>> = [
            ("When".to_string(), Some("job_date".to_string())),
            ("Who".to_string(), Some("customer_name".to_string())),
            ("Mystery".to_string(), Some("favourite_colour".to_string())),
            ("Ghost".to_string(), Some("notes".to_string())),
        ]
        .into_iter()
        .collect();

        let mapping = sanitize_ai_mapping(&cols, raw);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("When"), Some(&ImportField::JobDate));
        assert_eq!(mapping.get("Who"), Some(&ImportField::CustomerName));
    }

    #[tokio::test]
    async fn suggestion_without_ai_falls_back_to_headers() {
        let request = MappingRequest {
            columns: columns(&["Date", "Customer", "Whatever"]),
            sample_rows: vec![],
        };
        let suggestion = suggest_mapping(None, &request).await.unwrap();
        assert_eq!(suggestion.source, MappingSource::Heuristic);
        assert_eq!(suggestion.unmapped_columns, vec!["Whatever".to_string()]);

        let empty = MappingRequest {
            columns: vec![],
            sample_rows: vec![],
        };
        assert!(matches!(
            suggest_mapping(None, &empty).await,
            Err(JobImportError::NoColumns)
        ));
    }

    #[test]
    fn parses_dates_numbers_and_units() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date("2025-03-14"), Some(expected));
        assert_eq!(parse_date("14/03/2025"), Some(expected));
        assert_eq!(parse_date("2025-03-14 00:00:00"), Some(expected));
        assert_eq!(parse_date("March 14"), None);

        assert_eq!(parse_number("$1,250.50"), Some(1250.5));
        assert_eq!(parse_number("12.5 t"), Some(12.5));
        assert_eq!(parse_number("n/a"), None);

        assert_eq!(parse_pricing_unit("per tonne"), Some(PricingUnit::Tonne));
        assert_eq!(parse_pricing_unit("/m3"), Some(PricingUnit::CubicMetre));
        assert_eq!(parse_pricing_unit("Loads"), Some(PricingUnit::Load));
        assert_eq!(parse_pricing_unit("per fortnight"), None);
    }

    #[test]
    fn parse_row_builds_completed_job() {
        let mapping: ColumnMapping = [
            ("Date".to_string(), ImportField::JobDate),
            ("Client".to_string(), ImportField::CustomerName),
            ("Tonnes".to_string(), ImportField::WeightTonnes),
            ("Rate".to_string(), ImportField::Price),
            ("Per".to_string(), ImportField::PricingUnit),
        ]
        .into_iter()
        .collect();

        let job = parse_row(
            &mapping,
            &row(&[
                ("Date", "02/01/2025"),
                ("Client", " Acme Civil "),
                ("Tonnes", "24.5"),
                ("Rate", "$18.00"),
                ("Per", "tonne"),
            ]),
        )
        .unwrap();

        assert_eq!(job.job_date, NaiveDate::from_ymd_opt(2025, 1, 2));
        assert_eq!(job.customer_name.as_deref(), Some("Acme Civil"));
        assert_eq!(job.weight_tonnes, Some(24.5));
        assert_eq!(job.price, Some(18.0));
        assert_eq!(job.pricing_unit, Some(PricingUnit::Tonne));
        assert_eq!(job.status, Some(JobStatus::Completed));
    }

    #[test]
    fn parse_row_reports_bad_cells() {
        let mapping: ColumnMapping = [
            ("Date".to_string(), ImportField::JobDate),
            ("Loads".to_string(), ImportField::Loads),
        ]
        .into_iter()
        .collect();

        let err = parse_row(&mapping, &row(&[("Date", "2025-01-02"), ("Loads", "lots")])).unwrap_err();
        assert!(err.contains("Loads"));

        let err = parse_row(&mapping, &row(&[("Loads", "3")])).unwrap_err();
        assert_eq!(err, "missing job date");

        let err = parse_row(&mapping, &row(&[("Date", " "), ("Loads", "")])).unwrap_err();
        assert_eq!(err, "row is empty");
    }

    #[test]
    fn parse_row_rejects_negative_measurements() {
        let mapping: ColumnMapping = [
            ("Date".to_string(), ImportField::JobDate),
            ("Tonnes".to_string(), ImportField::WeightTonnes),
            ("Rate".to_string(), ImportField::Price),
        ]
        .into_iter()
        .collect();

        let err = parse_row(
            &mapping,
            &row(&[("Date", "2025-01-02"), ("Tonnes", "-12"), ("Rate", "18")]),
        )
        .unwrap_err();
        assert_eq!(err, "weight_tonnes must be zero or more");

        let err = parse_row(
            &mapping,
            &row(&[("Date", "2025-01-02"), ("Tonnes", "12"), ("Rate", "-18.00")]),
        )
        .unwrap_err();
        assert_eq!(err, "price must be zero or more");
    }

    #[test]
    fn validate_rejects_duplicate_fields_and_unknown_columns() {
        let duplicate: ColumnMapping = [
            ("A".to_string(), ImportField::Price),
            ("B".to_string(), ImportField::Price),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            validate_mapping(&duplicate, &[]),
            Err(JobImportError::DuplicateField(ImportField::Price))
        ));

        let unknown: ColumnMapping = [("Missing".to_string(), ImportField::Price)].into_iter().collect();
        assert!(matches!(
            validate_mapping(&unknown, &[row(&[("Present", "1")])]),
            Err(JobImportError::UnknownColumn(column)) if column == "Missing"
        ));
    }

    #[test]
    fn customer_index_drops_ambiguous_names() {
        let (acme, smith_a, smith_b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let index = customer_index(vec![
            (acme, "Acme Civil Pty Ltd".to_string()),
            (smith_a, "Smith & Sons".to_string()),
            (smith_b, "Smith and Sons".to_string()),
        ]);
        assert_eq!(index.get("acme civil"), Some(&Some(acme)));
        assert_eq!(index.get("smith and sons"), Some(&None));
    }
}
