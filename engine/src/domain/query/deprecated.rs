//! Migration of deprecated request fields
//!
//! Runs once per request after normalization. A deprecated field that is
//! present always produces a warning; when its value is truthy it replaces
//! the new field, with a second warning if that field was already populated.

use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::domain::error::ValidationError;
use crate::utils::json::is_truthy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeprecatedField {
    pub old_name: &'static str,
    pub new_name: &'static str,
}

/// Renamed top-level fields
pub const DEPRECATED_FIELDS: &[DeprecatedField] = &[DeprecatedField {
    old_name: "granularity_sqla",
    new_name: "granularity",
}];

/// Top-level fields that moved into `extras`
pub const DEPRECATED_EXTRAS_FIELDS: &[DeprecatedField] = &[
    DeprecatedField {
        old_name: "where",
        new_name: "where",
    },
    DeprecatedField {
        old_name: "having",
        new_name: "having",
    },
    DeprecatedField {
        old_name: "having_filters",
        new_name: "having_druid",
    },
    DeprecatedField {
        old_name: "druid_time_origin",
        new_name: "druid_time_origin",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeprecationWarning {
    Renamed(DeprecatedField),
    MovedToExtras(DeprecatedField),
    Overwritten(DeprecatedField),
    OverwrittenInExtras(DeprecatedField),
}

impl fmt::Display for DeprecationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed(field) => write!(
                f,
                "The field `{}` is deprecated, please use `{}` instead.",
                field.old_name, field.new_name
            ),
            Self::MovedToExtras(field) => write!(
                f,
                "The field `{}` is deprecated and should be passed to `extras` via the `{}` property.",
                field.old_name, field.new_name
            ),
            Self::Overwritten(field) => write!(
                f,
                "The field `{}` is already populated, replacing value with contents from `{}`.",
                field.new_name, field.old_name
            ),
            Self::OverwrittenInExtras(field) => write!(
                f,
                "The field `{}` is already populated in `extras`, replacing value with contents from `{}`.",
                field.new_name, field.old_name
            ),
        }
    }
}

/// Descriptor fields that deprecated names can write to
pub struct MigrationTargets<'a> {
    pub granularity: &'a mut Option<String>,
    pub extras: &'a mut Map<String, JsonValue>,
}

impl MigrationTargets<'_> {
    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "granularity" => Some(&mut *self.granularity),
            _ => None,
        }
    }
}

/// Apply both migration tables, consuming recognized keys from `legacy`.
/// Returns the warnings in the order they were logged.
pub fn migrate(
    legacy: &mut Map<String, JsonValue>,
    targets: &mut MigrationTargets<'_>,
) -> Result<Vec<DeprecationWarning>, ValidationError> {
    let mut warnings = Vec::new();
    let mut warn = |warning: DeprecationWarning| {
        tracing::warn!("{}", warning);
        warnings.push(warning);
    };

    for field in DEPRECATED_FIELDS {
        let Some(value) = legacy.remove(field.old_name) else {
            continue;
        };
        warn(DeprecationWarning::Renamed(*field));
        if !is_truthy(&value) {
            continue;
        }
        let text = value
            .as_str()
            .ok_or_else(|| ValidationError::invalid_field(field.old_name, "expected a string"))?
            .to_string();
        let Some(slot) = targets.slot(field.new_name) else {
            continue;
        };
        if slot.is_some() {
            warn(DeprecationWarning::Overwritten(*field));
        }
        *slot = Some(text);
    }

    for field in DEPRECATED_EXTRAS_FIELDS {
        let Some(value) = legacy.remove(field.old_name) else {
            continue;
        };
        warn(DeprecationWarning::MovedToExtras(*field));
        if !is_truthy(&value) {
            continue;
        }
        if targets
            .extras
            .get(field.new_name)
            .is_some_and(|existing| !existing.is_null())
        {
            warn(DeprecationWarning::OverwrittenInExtras(*field));
        }
        targets.extras.insert(field.new_name.to_string(), value);
    }

    Ok(warnings)
}
