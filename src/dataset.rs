use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Wmo;
use crate::error::ArgoError;

/// One sampled profile; each level row is aligned with the owning
/// dataset's variable list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub wmo: Wmo,
    pub cycle: u32,
    pub lon: f64,
    pub lat: f64,
    pub date: DateTime<Utc>,
    pub levels: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub variables: Vec<String>,
    pub profiles: Vec<ProfileRecord>,
}

impl Dataset {
    pub fn new(variables: Vec<String>, profiles: Vec<ProfileRecord>) -> Self {
        Self {
            variables,
            profiles,
        }
    }

    /// An empty dataset carries no schema and merges with anything.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.profiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

/// Strict mode returns the first error in chunk order; non-strict skips
/// failed chunks, but a request where every chunk failed still errors
/// rather than producing an empty dataset.
pub fn merge(results: Vec<Result<Dataset, ArgoError>>, strict: bool) -> Result<Dataset, ArgoError> {
    let mut datasets = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(dataset) => datasets.push(dataset),
            Err(err) if strict => return Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "skipping failed chunk in non-strict merge");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if datasets.is_empty() {
        return Err(first_error.unwrap_or_else(|| ArgoError::Merge("no chunk results".to_string())));
    }

    let mut merged = Dataset::default();
    for dataset in datasets {
        if dataset.is_empty() {
            continue;
        }
        if merged.is_empty() {
            merged = dataset;
            continue;
        }
        if merged.variables != dataset.variables {
            return Err(ArgoError::Merge(format!(
                "incompatible variables: [{}] vs [{}]",
                merged.variables.join(","),
                dataset.variables.join(",")
            )));
        }
        merged.profiles.extend(dataset.profiles);
    }
    Ok(merged)
}
