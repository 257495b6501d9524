//! Schema normalization from external field identifiers to canonical feature names.
//!
//! The fitted encoder was trained on the human-readable column names of the
//! telco dataset ("Tenure Months"), while callers send underscore separated
//! identifiers ("Tenure_Months"). The mapping is a static table so its
//! completeness can be checked independently of the code that applies it.

use crate::error::SchemaError;
use crate::types::customer::{CustomerRecord, RawRecord};
use std::collections::BTreeMap;

/// External identifier -> canonical feature name, one entry per canonical feature
pub const FIELD_MAP: [(&str, &str); 22] = [
    ("Gender", "Gender"),
    ("Senior_Citizen", "Senior Citizen"),
    ("Partner", "Partner"),
    ("Dependents", "Dependents"),
    ("Tenure_Months", "Tenure Months"),
    ("Phone_Service", "Phone Service"),
    ("Multiple_Lines", "Multiple Lines"),
    ("Internet_Service", "Internet Service"),
    ("Online_Security", "Online Security"),
    ("Online_Backup", "Online Backup"),
    ("Device_Protection", "Device Protection"),
    ("Tech_Support", "Tech Support"),
    ("Streaming_TV", "Streaming TV"),
    ("Streaming_Movies", "Streaming Movies"),
    ("Contract", "Contract"),
    ("Paperless_Billing", "Paperless Billing"),
    ("Payment_Method", "Payment Method"),
    ("Monthly_Charges", "Monthly Charges"),
    ("Total_Charges", "Total Charges"),
    ("CLTV", "CLTV"),
    ("Latitude", "Latitude"),
    ("Longitude", "Longitude"),
];

/// Numeric features, standardized by the encoder
pub const NUMERIC_FEATURES: [&str; 6] = [
    "Latitude",
    "Longitude",
    "Tenure Months",
    "Monthly Charges",
    "Total Charges",
    "CLTV",
];

/// Categorical features, indicator encoded by the encoder
pub const CATEGORICAL_FEATURES: [&str; 16] = [
    "Gender",
    "Senior Citizen",
    "Partner",
    "Dependents",
    "Phone Service",
    "Multiple Lines",
    "Internet Service",
    "Online Security",
    "Online Backup",
    "Device Protection",
    "Tech Support",
    "Streaming TV",
    "Streaming Movies",
    "Contract",
    "Paperless Billing",
    "Payment Method",
];

/// Every canonical feature a record must carry, in schema order
pub fn canonical_features() -> impl Iterator<Item = &'static str> {
    FIELD_MAP.iter().map(|(_, canonical)| *canonical)
}

/// Canonical name for an external identifier; unknown identifiers map to themselves
pub fn canonical_name(external: &str) -> &str {
    FIELD_MAP
        .iter()
        .find(|(ext, _)| *ext == external)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(external)
}

/// Rename external fields and check that every canonical feature is present.
///
/// Values are carried over untouched. Fields outside the table pass through
/// under their own name, so records already keyed canonically are accepted.
pub fn normalize(raw: &RawRecord) -> Result<CustomerRecord, SchemaError> {
    let mut values = BTreeMap::new();
    for (field, value) in raw {
        values.insert(canonical_name(field).to_string(), value.clone());
    }

    if let Some(missing) = canonical_features().find(|f| !values.contains_key(*f)) {
        return Err(SchemaError::MissingFeature {
            feature: missing.to_string(),
        });
    }

    Ok(CustomerRecord::from_canonical(values))
}
