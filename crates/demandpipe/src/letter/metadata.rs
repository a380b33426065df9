use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::error::LetterError;

const DEFAULT_ACCIDENT_TYPE: &str = "ACCIDENT";

/// `client_name` may name one client or several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClientName {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedicalRecord {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsuranceContact {
    pub name: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub fax: Option<String>,
}

/// Metadata file as written by the case management side.
#[derive(Debug, Deserialize)]
struct RawMetadata {
    demand_creation_date: Option<String>,
    date_of_accident: Option<String>,
    client_name: Option<ClientName>,
    client_claim_number: Option<String>,
    defendant_name: Option<String>,
    defendant_adjuster_name: Option<String>,
    insurance_name: Option<String>,
    #[serde(alias = "insurance_address")]
    insurance_company_address: Option<String>,
    insurance_telephone: Option<String>,
    insurance_fax: Option<String>,
    accident_type: Option<String>,
    title: Option<String>,
    incident_summary: Option<String>,
    logo_path: Option<PathBuf>,
    #[serde(default)]
    medical_records: Vec<MedicalRecord>,
}

/// Letter inputs with derived fields filled in.
#[derive(Debug, Clone)]
pub struct LetterMetadata {
    pub demand_creation_date: NaiveDate,
    pub date_of_loss: NaiveDate,
    pub client_names: Vec<String>,
    /// All client names joined with ", ".
    pub client_display_name: String,
    /// Last word of the first client's name.
    pub client_last_name: String,
    pub claim_number: Option<String>,
    pub defendant_name: Option<String>,
    pub defendant_adjuster: Option<String>,
    pub insurance: InsuranceContact,
    pub accident_type: String,
    /// Honorific such as "Mr" or "Ms", without the trailing period.
    pub title: String,
    pub incident_summary: Option<String>,
    pub logo_path: Option<PathBuf>,
    pub medical_records: Vec<MedicalRecord>,
}

impl LetterMetadata {
    pub fn from_json_str(content: &str) -> Result<Self, LetterError> {
        let raw: RawMetadata = serde_json::from_str(content)?;
        Self::from_raw(raw)
    }

    /// `"Mr. Doe"`, or just the last name without a title.
    pub fn formal_name(&self) -> String {
        if self.title.is_empty() {
            self.client_last_name.clone()
        } else {
            format!("{}. {}", self.title, self.client_last_name)
        }
    }

    fn from_raw(raw: RawMetadata) -> Result<Self, LetterError> {
        let demand_creation_date = parse_date(
            "demand_creation_date",
            raw.demand_creation_date
                .as_deref()
                .ok_or(LetterError::MissingField("demand_creation_date"))?,
        )?;
        let date_of_loss = parse_date(
            "date_of_accident",
            raw.date_of_accident
                .as_deref()
                .ok_or(LetterError::MissingField("date_of_accident"))?,
        )?;

        let client_names: Vec<String> = match raw.client_name {
            Some(ClientName::One(name)) => vec![name],
            Some(ClientName::Many(names)) => names,
            None => Vec::new(),
        }
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

        let client_last_name = client_names
            .first()
            .and_then(|n| n.split_whitespace().last())
            .map(str::to_string)
            .ok_or(LetterError::MissingField("client_name"))?;

        Ok(Self {
            demand_creation_date,
            date_of_loss,
            client_display_name: client_names.join(", "),
            client_last_name,
            client_names,
            claim_number: non_empty(raw.client_claim_number),
            defendant_name: non_empty(raw.defendant_name),
            defendant_adjuster: non_empty(raw.defendant_adjuster_name),
            insurance: InsuranceContact {
                name: non_empty(raw.insurance_name),
                address: non_empty(raw.insurance_company_address),
                telephone: non_empty(raw.insurance_telephone),
                fax: non_empty(raw.insurance_fax),
            },
            accident_type: non_empty(raw.accident_type)
                .unwrap_or_else(|| DEFAULT_ACCIDENT_TYPE.to_string()),
            title: raw
                .title
                .map(|t| t.trim().trim_end_matches('.').to_string())
                .unwrap_or_default(),
            incident_summary: non_empty(raw.incident_summary),
            logo_path: raw.logo_path,
            medical_records: raw.medical_records,
        })
    }
}

/// Reads and normalizes a letter metadata file.
pub fn load_metadata(path: &Path) -> Result<LetterMetadata, LetterError> {
    if !path.exists() {
        return Err(LetterError::MetadataNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| LetterError::ReadMetadata {
        path: path.to_path_buf(),
        source: e,
    })?;

    LetterMetadata::from_json_str(&content)
}

/// Accepts `2024-03-01`, `2024-03-01T10:00:00` and RFC 3339 timestamps.
fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, LetterError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(datetime.date());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(datetime.date());
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }

    Err(LetterError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "demand_creation_date": "2025-02-14",
        "date_of_accident": "2024-07-04T16:30:00",
        "client_name": "Jane Q Doe",
        "client_claim_number": "CLM-88",
        "defendant_name": "Richard Roe",
        "defendant_adjuster_name": "Pat Smith",
        "insurance_name": "Acme Mutual",
        "insurance_address": "1 Main St",
        "accident_type": "auto",
        "title": "Ms.",
        "medical_records": [{"summary": "ER visit"}]
    }"#;

    #[test]
    fn test_derived_fields() {
        let meta = LetterMetadata::from_json_str(SAMPLE).unwrap();

        assert_eq!(meta.demand_creation_date, NaiveDate::from_ymd_opt(2025, 2, 14).unwrap());
        assert_eq!(meta.date_of_loss, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
        assert_eq!(meta.claim_number.as_deref(), Some("CLM-88"));
        assert_eq!(meta.defendant_adjuster.as_deref(), Some("Pat Smith"));
        assert_eq!(meta.client_display_name, "Jane Q Doe");
        assert_eq!(meta.client_last_name, "Doe");
        assert_eq!(meta.insurance.address.as_deref(), Some("1 Main St"));
        assert_eq!(meta.title, "Ms");
        assert_eq!(meta.formal_name(), "Ms. Doe");
        assert_eq!(meta.medical_records.len(), 1);
    }

    #[test]
    fn test_client_name_list() {
        let meta = LetterMetadata::from_json_str(
            r#"{
                "demand_creation_date": "2025-02-14",
                "date_of_accident": "2024-07-04",
                "client_name": ["John Smith", "Mary Smith-Jones"]
            }"#,
        )
        .unwrap();

        assert_eq!(meta.client_display_name, "John Smith, Mary Smith-Jones");
        assert_eq!(meta.client_last_name, "Smith");
        assert_eq!(meta.accident_type, DEFAULT_ACCIDENT_TYPE);
        assert_eq!(meta.formal_name(), "Smith");
    }

    #[test]
    fn test_rfc3339_dates() {
        let meta = LetterMetadata::from_json_str(
            r#"{
                "demand_creation_date": "2025-02-14T09:00:00Z",
                "date_of_accident": "2024-07-04T23:30:00-07:00",
                "client_name": "Jane Doe"
            }"#,
        )
        .unwrap();
        assert_eq!(meta.date_of_loss, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
    }

    #[test]
    fn test_missing_fields() {
        let no_date = LetterMetadata::from_json_str(r#"{"client_name": "Jane Doe"}"#);
        assert!(matches!(
            no_date,
            Err(LetterError::MissingField("demand_creation_date"))
        ));

        let no_client = LetterMetadata::from_json_str(
            r#"{"demand_creation_date": "2025-02-14", "date_of_accident": "2024-07-04", "client_name": []}"#,
        );
        assert!(matches!(no_client, Err(LetterError::MissingField("client_name"))));
    }

    #[test]
    fn test_invalid_date() {
        let result = LetterMetadata::from_json_str(
            r#"{"demand_creation_date": "last tuesday", "date_of_accident": "2024-07-04", "client_name": "A B"}"#,
        );
        assert!(matches!(
            result,
            Err(LetterError::InvalidDate { field: "demand_creation_date", .. })
        ));
    }

    #[test]
    fn test_load_metadata_missing_file() {
        let result = load_metadata(Path::new("/nonexistent/meta.json"));
        assert!(matches!(result, Err(LetterError::MetadataNotFound(_))));
    }

    #[test]
    fn test_load_metadata_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let meta = load_metadata(&path).unwrap();
        assert_eq!(meta.client_names, vec!["Jane Q Doe"]);
    }
}
