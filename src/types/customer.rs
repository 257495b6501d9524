//! Customer record data structures for churn scoring

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value on a customer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FeatureValue {
    /// Numeric view of the value, `None` for text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Integer(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Text(_) => None,
        }
    }

    /// Category label used when the value sits in a categorical column
    pub fn category_label(&self) -> Cow<'_, str> {
        match self {
            FeatureValue::Text(s) => Cow::Borrowed(s.as_str()),
            FeatureValue::Integer(v) => Cow::Owned(v.to_string()),
            FeatureValue::Float(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.category_label())
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

impl From<i64> for FeatureValue {
    fn from(value: i64) -> Self {
        FeatureValue::Integer(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value)
    }
}

/// Record as supplied by a caller, keyed by external field identifiers
pub type RawRecord = BTreeMap<String, FeatureValue>;

/// Customer attributes keyed by the canonical feature names used at fit time.
///
/// Only produced by [`crate::normalizer::normalize`], which guarantees every
/// canonical feature is present. Fields not in the schema are carried along
/// and ignored by the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    values: BTreeMap<String, FeatureValue>,
}

impl CustomerRecord {
    pub(crate) fn from_canonical(values: BTreeMap<String, FeatureValue>) -> Self {
        Self { values }
    }

    /// Look up a canonical feature
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        self.values.get(feature)
    }

    /// Iterate over all (feature, value) pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Typed customer payload accepted at the scoring boundary.
///
/// Field names follow the external (underscore separated) schema. Type and
/// range validation happens here, not in the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerInput {
    #[serde(rename = "Gender")]
    pub gender: String,

    #[serde(rename = "Senior_Citizen")]
    pub senior_citizen: String,

    #[serde(rename = "Partner")]
    pub partner: String,

    #[serde(rename = "Dependents")]
    pub dependents: String,

    /// Months with the company
    #[serde(rename = "Tenure_Months")]
    pub tenure_months: i64,

    #[serde(rename = "Phone_Service")]
    pub phone_service: String,

    #[serde(rename = "Multiple_Lines")]
    pub multiple_lines: String,

    /// DSL, Fiber optic or No
    #[serde(rename = "Internet_Service")]
    pub internet_service: String,

    #[serde(rename = "Online_Security")]
    pub online_security: String,

    #[serde(rename = "Online_Backup")]
    pub online_backup: String,

    #[serde(rename = "Device_Protection")]
    pub device_protection: String,

    #[serde(rename = "Tech_Support")]
    pub tech_support: String,

    #[serde(rename = "Streaming_TV")]
    pub streaming_tv: String,

    #[serde(rename = "Streaming_Movies")]
    pub streaming_movies: String,

    /// Month-to-month, One year or Two year
    #[serde(rename = "Contract")]
    pub contract: String,

    #[serde(rename = "Paperless_Billing")]
    pub paperless_billing: String,

    #[serde(rename = "Payment_Method")]
    pub payment_method: String,

    #[serde(rename = "Monthly_Charges")]
    pub monthly_charges: f64,

    #[serde(rename = "Total_Charges")]
    pub total_charges: f64,

    /// Customer lifetime value
    #[serde(rename = "CLTV")]
    pub cltv: f64,

    #[serde(rename = "Latitude", default)]
    pub latitude: f64,

    #[serde(rename = "Longitude", default)]
    pub longitude: f64,
}

/// Boundary validation failure on a [`CustomerInput`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("field 'Tenure_Months' must be >= 0, got {0}")]
    NegativeTenure(i64),

    #[error("field '{0}' must be a finite number")]
    NonFinite(&'static str),

    #[error("field '{field}' must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

impl CustomerInput {
    /// Check the boundary constraints of the external schema
    pub fn validate(&self) -> Result<(), InputError> {
        for (name, value) in self.categorical_fields() {
            if value.trim().is_empty() {
                return Err(InputError::EmptyField(name));
            }
        }

        if self.tenure_months < 0 {
            return Err(InputError::NegativeTenure(self.tenure_months));
        }

        let numeric = [
            ("Monthly_Charges", self.monthly_charges),
            ("Total_Charges", self.total_charges),
            ("CLTV", self.cltv),
            ("Latitude", self.latitude),
            ("Longitude", self.longitude),
        ];
        for (name, value) in numeric {
            if !value.is_finite() {
                return Err(InputError::NonFinite(name));
            }
        }

        let coordinates = [
            ("Latitude", self.latitude, 90.0),
            ("Longitude", self.longitude, 180.0),
        ];
        for (field, value, bound) in coordinates {
            if !(-bound..=bound).contains(&value) {
                return Err(InputError::OutOfRange {
                    field,
                    min: -bound,
                    max: bound,
                    value,
                });
            }
        }

        Ok(())
    }

    /// Convert into a raw record keyed by external identifiers
    pub fn into_raw(self) -> RawRecord {
        let mut raw = RawRecord::new();
        for (name, value) in self.categorical_fields() {
            raw.insert(name.to_string(), FeatureValue::from(value));
        }
        raw.insert("Tenure_Months".into(), self.tenure_months.into());
        raw.insert("Monthly_Charges".into(), self.monthly_charges.into());
        raw.insert("Total_Charges".into(), self.total_charges.into());
        raw.insert("CLTV".into(), self.cltv.into());
        raw.insert("Latitude".into(), self.latitude.into());
        raw.insert("Longitude".into(), self.longitude.into());
        raw
    }

    fn categorical_fields(&self) -> [(&'static str, &str); 16] {
        [
            ("Gender", self.gender.as_str()),
            ("Senior_Citizen", self.senior_citizen.as_str()),
            ("Partner", self.partner.as_str()),
            ("Dependents", self.dependents.as_str()),
            ("Phone_Service", self.phone_service.as_str()),
            ("Multiple_Lines", self.multiple_lines.as_str()),
            ("Internet_Service", self.internet_service.as_str()),
            ("Online_Security", self.online_security.as_str()),
            ("Online_Backup", self.online_backup.as_str()),
            ("Device_Protection", self.device_protection.as_str()),
            ("Tech_Support", self.tech_support.as_str()),
            ("Streaming_TV", self.streaming_tv.as_str()),
            ("Streaming_Movies", self.streaming_movies.as_str()),
            ("Contract", self.contract.as_str()),
            ("Paperless_Billing", self.paperless_billing.as_str()),
            ("Payment_Method", self.payment_method.as_str()),
        ]
    }
}
