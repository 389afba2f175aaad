//! Reference Vaccination Rules Engine
//!
//! A concrete `SpecValidator` / `RuleGenerator` pair for vaccination
//! specifications. The pipeline does not depend on it; it exists so the
//! bundled example and the CLI work end to end.
//!
//! Rules produce messages. The validator only orders and concatenates them.

use chrono::{DateTime, FixedOffset};
use serde_json::{json, Map, Value};

use crate::generator::{GeneratedRules, GeneratorError, RuleGenerator};
use crate::validation::SpecValidator;

const REQUIRED_TEXT_FIELDS: [&str; 5] = ["Name", "Country", "Version", "ValidFrom", "ValidTo"];

pub const CERTLOGIC_ENGINE: &str = "CERTLOGIC";
pub const CERTLOGIC_ENGINE_VERSION: &str = "0.7.5";
pub const RULE_SCHEMA_VERSION: &str = "1.0.0";

/// Affected DCC payload fields, shared by every vaccination rule
const AFFECTED_FIELDS: [&str; 5] = ["v.0", "v.0.mp", "v.0.dn", "v.0.sd", "v.0.dt"];

/// A single check over a specification object
pub trait SpecRule {
    fn name(&self) -> &'static str;
    fn validate(&self, spec: &Map<String, Value>) -> Vec<String>;
}

// --- Concrete Rules ---

pub struct RequiredFieldsRule;

impl SpecRule for RequiredFieldsRule {
    fn name(&self) -> &'static str { "required_fields" }

    fn validate(&self, spec: &Map<String, Value>) -> Vec<String> {
        let mut errors = vec![];
        for field in REQUIRED_TEXT_FIELDS {
            match spec.get(field) {
                None => errors.push(format!("Missing required field \"{}\".", field)),
                Some(Value::String(text)) if text.trim().is_empty() => {
                    errors.push(format!("Field \"{}\" must not be empty.", field))
                }
                Some(Value::String(_)) => {}
                Some(_) => errors.push(format!("Field \"{}\" must be a string.", field)),
            }
        }
        errors
    }
}

pub struct CountryRule;

impl SpecRule for CountryRule {
    fn name(&self) -> &'static str { "country" }

    fn validate(&self, spec: &Map<String, Value>) -> Vec<String> {
        match text_field(spec, "Country") {
            Some(country) if !is_country_code(country) => vec![format!(
                "Field \"Country\" must be a two-letter uppercase country code, got \"{}\".",
                country
            )],
            _ => vec![],
        }
    }
}

pub struct VersionRule;

impl SpecRule for VersionRule {
    fn name(&self) -> &'static str { "version" }

    fn validate(&self, spec: &Map<String, Value>) -> Vec<String> {
        match text_field(spec, "Version").map(|v| (v, semver::Version::parse(v))) {
            Some((raw, Err(e))) => vec![format!(
                "Field \"Version\" must be a semantic version, got \"{}\": {}.",
                raw, e
            )],
            _ => vec![],
        }
    }
}

pub struct ValidityWindowRule;

impl SpecRule for ValidityWindowRule {
    fn name(&self) -> &'static str { "validity_window" }

    fn validate(&self, spec: &Map<String, Value>) -> Vec<String> {
        let mut errors = vec![];
        let from = parse_timestamp(spec, "ValidFrom", &mut errors);
        let to = parse_timestamp(spec, "ValidTo", &mut errors);

        if let (Some(from), Some(to)) = (from, to) {
            if from >= to {
                errors.push("Field \"ValidFrom\" must be before \"ValidTo\".".to_string());
            }
        }
        errors
    }
}

pub struct VaccinesRule;

impl SpecRule for VaccinesRule {
    fn name(&self) -> &'static str { "vaccines" }

    fn validate(&self, spec: &Map<String, Value>) -> Vec<String> {
        let vaccines = match spec.get("Vaccines") {
            None => return vec!["Missing required field \"Vaccines\".".to_string()],
            Some(Value::Array(vaccines)) => vaccines,
            Some(_) => return vec!["Field \"Vaccines\" must be an array.".to_string()],
        };
        if vaccines.is_empty() {
            return vec!["Field \"Vaccines\" must list at least one vaccine.".to_string()];
        }

        let mut errors = vec![];
        let mut seen_products: Vec<&str> = vec![];

        for (i, vaccine) in vaccines.iter().enumerate() {
            let Some(vaccine) = vaccine.as_object() else {
                errors.push(format!("Vaccines[{}] must be an object.", i));
                continue;
            };

            match text_field(vaccine, "Product") {
                Some(product) if !product.trim().is_empty() => {
                    if seen_products.contains(&product) {
                        errors.push(format!(
                            "Vaccines[{}].Product \"{}\" is listed more than once.",
                            i, product
                        ));
                    }
                    seen_products.push(product);
                }
                _ => errors.push(format!("Vaccines[{}].Product must be a non-empty string.", i)),
            }

            match vaccine.get("Series") {
                Some(Value::Array(series)) if !series.is_empty() => {
                    for (j, dose) in series.iter().enumerate() {
                        validate_series(&format!("Vaccines[{}].Series[{}]", i, j), dose, &mut errors);
                    }
                }
                _ => errors.push(format!("Vaccines[{}].Series must be a non-empty array.", i)),
            }
        }
        errors
    }
}

fn validate_series(path: &str, dose: &Value, errors: &mut Vec<String>) {
    let Some(dose) = dose.as_object() else {
        errors.push(format!("{} must be an object.", path));
        return;
    };

    let dose_number = count_field(dose, "DoseNumber", 1, path, errors);
    let total_doses = count_field(dose, "TotalDoses", 1, path, errors);
    let days_from = count_field(dose, "DaysValidFrom", 0, path, errors);

    if let (Some(dn), Some(sd)) = (dose_number, total_doses) {
        if dn > sd {
            errors.push(format!("{}.DoseNumber must not exceed TotalDoses.", path));
        }
    }

    if dose.contains_key("DaysValidUntil") {
        let days_until = count_field(dose, "DaysValidUntil", 1, path, errors);
        if let (Some(from), Some(until)) = (days_from, days_until) {
            if until <= from {
                errors.push(format!("{}.DaysValidUntil must be greater than DaysValidFrom.", path));
            }
        }
    }
}

/// Read an integer field that must be at least `min`, reporting problems
fn count_field(
    object: &Map<String, Value>,
    field: &str,
    min: i64,
    path: &str,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match object.get(field).map(Value::as_i64) {
        None => {
            errors.push(format!("{}.{} is required.", path, field));
            None
        }
        Some(Some(n)) if n >= min => Some(n),
        Some(_) => {
            errors.push(format!("{}.{} must be an integer of at least {}.", path, field, min));
            None
        }
    }
}

fn parse_timestamp(
    spec: &Map<String, Value>,
    field: &str,
    errors: &mut Vec<String>,
) -> Option<DateTime<FixedOffset>> {
    let raw = text_field(spec, field)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            errors.push(format!(
                "Field \"{}\" must be an RFC 3339 timestamp, got \"{}\": {}.",
                field, raw, e
            ));
            None
        }
    }
}

fn text_field<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    object.get(field).and_then(Value::as_str)
}

fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase())
}

/// Validator orchestrates the rules in a fixed order
pub struct VaccinationValidator {
    rules: Vec<Box<dyn SpecRule>>,
}

impl VaccinationValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(CountryRule),
                Box::new(VersionRule),
                Box::new(ValidityWindowRule),
                Box::new(VaccinesRule),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }
}

impl Default for VaccinationValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecValidator for VaccinationValidator {
    fn validate(&self, spec: &Value) -> Vec<String> {
        let Some(object) = spec.as_object() else {
            return vec!["The specification must be a JSON object.".to_string()];
        };

        self.rules
            .iter()
            .flat_map(|rule| rule.validate(object))
            .collect()
    }
}

/// Generates one CertLogic acceptance rule per vaccination series
#[derive(Debug, Clone)]
pub struct VaccinationRuleGenerator {
    pub engine_version: String,
    pub schema_version: String,
}

impl Default for VaccinationRuleGenerator {
    fn default() -> Self {
        Self {
            engine_version: CERTLOGIC_ENGINE_VERSION.to_string(),
            schema_version: RULE_SCHEMA_VERSION.to_string(),
        }
    }
}

impl RuleGenerator for VaccinationRuleGenerator {
    fn generate(&self, spec: &Value) -> Result<GeneratedRules, GeneratorError> {
        let country = required_str(spec, "Country")?;
        let version = required_str(spec, "Version")?;
        let valid_from = required_str(spec, "ValidFrom")?;
        let valid_to = required_str(spec, "ValidTo")?;
        let vaccines = spec
            .get("Vaccines")
            .and_then(Value::as_array)
            .ok_or_else(|| GeneratorError::MissingInput("Vaccines".into()))?;

        let mut rules = GeneratedRules::new();
        for vaccine in vaccines {
            let product = required_str(vaccine, "Product")?;
            let label = vaccine
                .get("Description")
                .and_then(Value::as_str)
                .unwrap_or(product);
            let series = vaccine
                .get("Series")
                .and_then(Value::as_array)
                .ok_or_else(|| GeneratorError::MissingInput(format!("Series of {}", product)))?;

            for dose in series {
                let window = DoseWindow::read(dose, product)?;
                let id = format!("VR-{}-{:04}", country, rules.len());
                let body = json!({
                    "Identifier": id,
                    "Type": "Acceptance",
                    "Country": country,
                    "Version": version,
                    "SchemaVersion": self.schema_version,
                    "Engine": CERTLOGIC_ENGINE,
                    "EngineVersion": self.engine_version,
                    "CertificateType": "Vaccination",
                    "Description": [{ "lang": "en", "desc": window.describe(label) }],
                    "ValidFrom": valid_from,
                    "ValidTo": valid_to,
                    "AffectedFields": AFFECTED_FIELDS,
                    "Logic": window.logic(product),
                });
                rules.insert(id, body);
            }
        }

        if rules.is_empty() {
            return Err(GeneratorError::Unsupported("no vaccination series to generate rules for".into()));
        }
        Ok(rules)
    }
}

struct DoseWindow {
    dose_number: i64,
    total_doses: i64,
    days_from: i64,
    days_until: Option<i64>,
}

impl DoseWindow {
    fn read(dose: &Value, product: &str) -> Result<Self, GeneratorError> {
        let count = |field: &str| {
            dose.get(field)
                .and_then(Value::as_i64)
                .ok_or_else(|| GeneratorError::MissingInput(format!("{} of {}", field, product)))
        };
        Ok(Self {
            dose_number: count("DoseNumber")?,
            total_doses: count("TotalDoses")?,
            days_from: count("DaysValidFrom")?,
            days_until: dose.get("DaysValidUntil").and_then(Value::as_i64),
        })
    }

    fn describe(&self, label: &str) -> String {
        let mut desc = format!(
            "Vaccination with {}: dose {}/{} is accepted from {} days after vaccination",
            label, self.dose_number, self.total_doses, self.days_from
        );
        if let Some(until) = self.days_until {
            desc.push_str(&format!(" until {} days after vaccination", until));
        }
        desc.push('.');
        desc
    }

    fn logic(&self, product: &str) -> Value {
        let clock = json!({ "plusTime": [{ "var": "external.validationClock" }, 0, "day"] });
        let offset = |days: i64| json!({ "plusTime": [{ "var": "payload.v.0.dt" }, days, "day"] });

        let not_before = json!({ "not-before": [clock, offset(self.days_from)] });
        let window = match self.days_until {
            Some(until) => json!({ "and": [not_before, { "not-after": [clock, offset(until)] }] }),
            None => not_before,
        };

        json!({
            "if": [
                {
                    "and": [
                        { "===": [{ "var": "payload.v.0.mp" }, product] },
                        { "===": [{ "var": "payload.v.0.dn" }, self.dose_number] },
                        { "===": [{ "var": "payload.v.0.sd" }, self.total_doses] }
                    ]
                },
                window,
                true
            ]
        })
    }
}

fn required_str<'a>(object: &'a Value, field: &str) -> Result<&'a str, GeneratorError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GeneratorError::MissingInput(field.to_string()))
}
