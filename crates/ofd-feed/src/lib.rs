//! Upstream feed client and the pure offer normalizer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ofd_core::{EmploymentCategory, NormalizeWarning, OfferDraft, ScheduleEntry, Shift};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "ofd-feed";

/// Weekday source fields in the fixed order the schedule is emitted.
/// The source domain has no Sunday shift data.
const WEEKDAYS: [&str; 6] = [
    "lunes", "martes", "miercoles", "jueves", "viernes", "sabado",
];

/// Wire shape of one feed document. Several canonical fields accept a
/// legacy and a current source name; both are kept here so the
/// normalizer can absorb upstream schema drift.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOfferDoc {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub idoferta: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
    #[serde(default)]
    pub descripcioncargo: Option<String>,
    #[serde(default)]
    pub descdistrito: Option<String>,
    #[serde(default)]
    pub descnivelmodalidad: Option<String>,
    #[serde(default)]
    pub escuela: Option<String>,
    #[serde(default)]
    pub codestablecimiento: Option<String>,
    #[serde(default)]
    pub cursodivision: Option<String>,
    #[serde(default)]
    pub curso_division: Option<String>,
    #[serde(default)]
    pub turno: Option<String>,
    #[serde(default)]
    pub supl_revista: Option<String>,
    #[serde(default)]
    pub revista: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub hsmodulos: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub horas_modulos: Option<String>,
    #[serde(default)]
    pub supl_desde: Option<String>,
    #[serde(default)]
    pub desde: Option<String>,
    #[serde(default)]
    pub supl_hasta: Option<String>,
    #[serde(default)]
    pub hasta: Option<String>,
    #[serde(default)]
    pub lunes: Option<String>,
    #[serde(default)]
    pub martes: Option<String>,
    #[serde(default)]
    pub miercoles: Option<String>,
    #[serde(default)]
    pub jueves: Option<String>,
    #[serde(default)]
    pub viernes: Option<String>,
    #[serde(default)]
    pub sabado: Option<String>,
    #[serde(default)]
    pub domiciliodesempeno: Option<String>,
    #[serde(default)]
    pub domicilio: Option<String>,
    #[serde(default)]
    pub reemp_apeynom: Option<String>,
    #[serde(default)]
    pub reemp_motivo: Option<String>,
    #[serde(default)]
    pub finoferta: Option<String>,
    #[serde(default)]
    pub cierre_oferta: Option<String>,
}

impl RawOfferDoc {
    fn weekday_value(&self, day: &str) -> Option<&str> {
        match day {
            "lunes" => self.lunes.as_deref(),
            "martes" => self.martes.as_deref(),
            "miercoles" => self.miercoles.as_deref(),
            "jueves" => self.jueves.as_deref(),
            "viernes" => self.viernes.as_deref(),
            "sabado" => self.sabado.as_deref(),
            _ => None,
        }
    }
}

/// The feed sometimes serializes identifiers and hour counts as
/// numbers; accept either and normalize to a string.
fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Collapse internal whitespace and trim; blank input degrades to None.
fn clean_text(value: Option<&str>) -> Option<String> {
    let text = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Dates arrive either bare (`2024-03-01`) or as ISO timestamps; only
/// the date portion is meaningful.
fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split('T').next().unwrap_or_default();
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_feed_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc())
}

/// Parse both endpoints independently; an unparsable endpoint nulls
/// only itself, but an inverted pair is untrustworthy as a whole and
/// nulls both.
fn clean_dates(
    from_raw: Option<&str>,
    to_raw: Option<&str>,
    warnings: &mut Vec<NormalizeWarning>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let from = match from_raw {
        Some(raw) => match parse_feed_date(raw) {
            Some(date) => Some(date),
            None => {
                warnings.push(NormalizeWarning::UnparsableDate {
                    field: "valid_from",
                    raw: raw.to_string(),
                });
                None
            }
        },
        None => None,
    };
    let to = match to_raw {
        Some(raw) => match parse_feed_date(raw) {
            Some(date) => Some(date),
            None => {
                warnings.push(NormalizeWarning::UnparsableDate {
                    field: "valid_to",
                    raw: raw.to_string(),
                });
                None
            }
        },
        None => None,
    };

    if let (Some(f), Some(t)) = (from, to) {
        if t < f {
            warnings.push(NormalizeWarning::IllogicalDateRange {
                from: from_raw.unwrap_or_default().to_string(),
                to: to_raw.unwrap_or_default().to_string(),
            });
            return (None, None);
        }
    }
    (from, to)
}

/// First character uppercased, accepted only if inside the closed set;
/// anything else is dropped rather than stored verbatim.
fn clean_code<T>(
    raw: Option<&str>,
    field: &'static str,
    from_code: fn(char) -> Option<T>,
    warnings: &mut Vec<NormalizeWarning>,
) -> Option<T> {
    let raw = raw?.trim();
    let first = raw.chars().next()?;
    let code = first.to_ascii_uppercase();
    match from_code(code) {
        Some(value) => Some(value),
        None => {
            warnings.push(NormalizeWarning::InvalidCode {
                field,
                raw: raw.to_string(),
            });
            None
        }
    }
}

fn extract_schedule(doc: &RawOfferDoc) -> Vec<ScheduleEntry> {
    let mut schedule = Vec::new();
    for day in WEEKDAYS {
        if let Some(time_text) = clean_text(doc.weekday_value(day)) {
            let mut capitalized = String::with_capacity(day.len());
            let mut chars = day.chars();
            if let Some(first) = chars.next() {
                capitalized.extend(first.to_uppercase());
                capitalized.push_str(chars.as_str());
            }
            schedule.push(ScheduleEntry {
                day: capitalized,
                time_text,
            });
        }
    }
    schedule
}

/// Normalize one raw feed document into the canonical offer shape.
///
/// Pure and never fails hard: any invalid sub-field degrades to null
/// plus a warning, so one bad record never aborts a batch. `None` is
/// returned only for a record missing its external id, which is
/// dropped rather than upserted.
pub fn normalize(raw: &JsonValue) -> (Option<OfferDraft>, Vec<NormalizeWarning>) {
    let mut warnings = Vec::new();
    let doc: RawOfferDoc = serde_json::from_value(raw.clone()).unwrap_or_default();

    let Some(id) = doc
        .id
        .as_deref()
        .or(doc.idoferta.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        warnings.push(NormalizeWarning::MissingId);
        return (None, warnings);
    };
    let id = id.to_string();

    let (valid_from, valid_to) = clean_dates(
        doc.supl_desde.as_deref().or(doc.desde.as_deref()),
        doc.supl_hasta.as_deref().or(doc.hasta.as_deref()),
        &mut warnings,
    );
    let shift = clean_code(doc.turno.as_deref(), "shift", Shift::from_code, &mut warnings);
    let employment_category = clean_code(
        doc.supl_revista.as_deref().or(doc.revista.as_deref()),
        "employment_category",
        EmploymentCategory::from_code,
        &mut warnings,
    );

    let draft = OfferDraft {
        id,
        role: clean_text(doc.cargo.as_deref().or(doc.descripcioncargo.as_deref())),
        district: clean_text(doc.descdistrito.as_deref()).map(|s| s.to_lowercase()),
        modality: clean_text(doc.descnivelmodalidad.as_deref()).map(|s| s.to_lowercase()),
        school: clean_text(doc.escuela.as_deref().or(doc.codestablecimiento.as_deref())),
        section: clean_text(doc.cursodivision.as_deref().or(doc.curso_division.as_deref())),
        shift,
        employment_category,
        hours_or_modules: clean_text(doc.hsmodulos.as_deref().or(doc.horas_modulos.as_deref())),
        valid_from,
        valid_to,
        weekly_schedule: extract_schedule(&doc),
        address: clean_text(doc.domiciliodesempeno.as_deref().or(doc.domicilio.as_deref())),
        replaces_name: clean_text(doc.reemp_apeynom.as_deref()),
        replacement_reason: clean_text(doc.reemp_motivo.as_deref()),
        closing_at: doc
            .finoferta
            .as_deref()
            .or(doc.cierre_oferta.as_deref())
            .and_then(parse_feed_timestamp),
        raw_source: raw.clone(),
    };
    (Some(draft), warnings)
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("feed returned http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("malformed feed payload: {0}")]
    Payload(String),
}

/// One page of published offers from the upstream index.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub docs: Vec<JsonValue>,
    pub num_found: u64,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub row_cap: u32,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://servicios3.abc.gob.ar/valoracion.docente/api/apd.oferta.encabezado"
                .to_string(),
            row_cap: 5000,
            timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// Read-only source of published offer documents. The HTTP client is
/// the production implementation; tests substitute a canned one.
#[async_trait]
pub trait OfferFeed: Send + Sync {
    async fn fetch_published(&self) -> Result<FeedPage, FeedError>;
}

#[derive(Debug)]
pub struct FeedClient {
    client: reqwest::Client,
    config: FeedConfig,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let mut builder = reqwest::Client::builder().gzip(true).timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl OfferFeed for FeedClient {
    /// Single bounded request selecting only published offers with a
    /// deterministic sort. Non-2xx or a malformed body is a hard
    /// failure for the run; zero documents is a legitimate state.
    async fn fetch_published(&self) -> Result<FeedPage, FeedError> {
        let url = format!("{}/select", self.config.base_url.trim_end_matches('/'));
        let rows = self.config.row_cap.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", "*:*"),
                ("fq", "estado:publicada"),
                ("rows", rows.as_str()),
                ("sort", "finoferta desc"),
                ("wt", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = response.text().await?;
        let page = parse_envelope(&body)?;
        debug!(num_found = page.num_found, docs = page.docs.len(), "fetched feed page");
        Ok(page)
    }
}

/// The index occasionally wraps its JSON in a JSONP callback; unwrap
/// it before decoding.
pub fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    let Some(open) = trimmed.find('(') else {
        return trimmed;
    };
    if !trimmed[..open]
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        || trimmed[..open].is_empty()
    {
        return trimmed;
    }
    let Some(close) = trimmed.rfind(')') else {
        return trimmed;
    };
    if close <= open {
        return trimmed;
    }
    &trimmed[open + 1..close]
}

pub fn parse_envelope(body: &str) -> Result<FeedPage, FeedError> {
    let json: JsonValue = serde_json::from_str(strip_jsonp(body))
        .map_err(|err| FeedError::Payload(err.to_string()))?;
    let response = json
        .get("response")
        .ok_or_else(|| FeedError::Payload("missing response envelope".to_string()))?;
    let docs = response
        .get("docs")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let num_found = response
        .get("numFound")
        .and_then(|v| v.as_u64())
        .unwrap_or(docs.len() as u64);
    Ok(FeedPage { docs, num_found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inverted_date_range_nulls_both_endpoints() {
        let (draft, warnings) = normalize(&json!({
            "id": "of-1",
            "supl_desde": "2024-05-10T00:00:00Z",
            "supl_hasta": "2024-04-01T00:00:00Z",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.valid_from, None);
        assert_eq!(draft.valid_to, None);
        assert!(warnings.iter().any(|w| matches!(w, NormalizeWarning::IllogicalDateRange { .. })));
    }

    #[test]
    fn unparsable_date_nulls_only_that_field() {
        let (draft, warnings) = normalize(&json!({
            "id": "of-2",
            "desde": "not-a-date",
            "hasta": "2024-06-30",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.valid_from, None);
        assert_eq!(
            draft.valid_to,
            Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].is_date_repair());
    }

    #[test]
    fn out_of_set_shift_is_dropped_with_warning() {
        let (draft, warnings) = normalize(&json!({
            "id": "of-3",
            "turno": "franco",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.shift, None);
        assert!(warnings.iter().any(|w| w.is_code_repair()));
    }

    #[test]
    fn shift_takes_first_character_uppercased() {
        let (draft, warnings) = normalize(&json!({
            "id": "of-4",
            "turno": "tarde",
            "supl_revista": "suplente",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.shift, Some(Shift::Afternoon));
        assert_eq!(
            draft.employment_category,
            Some(EmploymentCategory::Substitute)
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn schedule_is_emitted_in_fixed_weekday_order() {
        let (draft, _) = normalize(&json!({
            "id": "of-5",
            "viernes": " 8:00 a 12:00 ",
            "lunes": "8:00 a 12:00",
            "miercoles": "   ",
        }));
        let draft = draft.unwrap();
        let days: Vec<&str> = draft.weekly_schedule.iter().map(|e| e.day.as_str()).collect();
        assert_eq!(days, vec!["Lunes", "Viernes"]);
        assert_eq!(draft.weekly_schedule[1].time_text, "8:00 a 12:00");
    }

    #[test]
    fn current_field_name_wins_over_legacy_fallback() {
        let (draft, _) = normalize(&json!({
            "id": "of-6",
            "cargo": "Profesor de Historia",
            "descripcioncargo": "legacy name",
            "codestablecimiento": "EES 12",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.role.as_deref(), Some("Profesor de Historia"));
        assert_eq!(draft.school.as_deref(), Some("EES 12"));
    }

    #[test]
    fn missing_id_drops_the_record() {
        let (draft, warnings) = normalize(&json!({ "cargo": "Preceptor" }));
        assert!(draft.is_none());
        assert_eq!(warnings, vec![NormalizeWarning::MissingId]);
    }

    #[test]
    fn numeric_id_and_hours_are_accepted() {
        let (draft, _) = normalize(&json!({
            "idoferta": 48213,
            "hsmodulos": 6,
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.id, "48213");
        assert_eq!(draft.hours_or_modules.as_deref(), Some("6"));
    }

    #[test]
    fn district_and_modality_are_lowercased() {
        let (draft, _) = normalize(&json!({
            "id": "of-7",
            "descdistrito": "La  Plata",
            "descnivelmodalidad": "SECUNDARIA",
        }));
        let draft = draft.unwrap();
        assert_eq!(draft.district.as_deref(), Some("la plata"));
        assert_eq!(draft.modality.as_deref(), Some("secundaria"));
    }

    #[test]
    fn jsonp_wrapper_is_unwrapped() {
        let body = r#"callback_42({"response":{"docs":[{"id":"a"}],"numFound":1}})"#;
        let page = parse_envelope(body).unwrap();
        assert_eq!(page.num_found, 1);
        assert_eq!(page.docs.len(), 1);
    }

    #[test]
    fn bare_json_envelope_parses() {
        let page = parse_envelope("{\"response\":{\"docs\":[],\"numFound\":0}}").unwrap();
        assert_eq!(page.num_found, 0);
        assert!(page.docs.is_empty());
    }

    #[test]
    fn garbage_body_is_a_payload_error() {
        let err = parse_envelope("<html>proxy error</html>").unwrap_err();
        assert!(matches!(err, FeedError::Payload(_)));
    }
}
