//! # Validation Module
//!
//! Registration-time checks that are independent of any other registered spec.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: THIS MODULE (spec in isolation)                               │
//! │  ├── sync map not empty                                                 │
//! │  ├── source != view                                                     │
//! │  └── field names writable                                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SyncRegistry (spec against registry state)                    │
//! │  ├── identifier unique                                                  │
//! │  ├── (source, view) pair unique                                         │
//! │  └── dependency targets known and distinct                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::collection::same_collection;
use crate::document::ID_FIELD;
use crate::error::{ConfigError, ConfigResult};
use crate::spec::SyncSpec;

/// Validates a computed field name.
///
/// ## Rules
/// - Must not be empty
/// - Must not be the identity field `_id`
///
/// ## Example
/// ```rust
/// use denorm_core::validation::validate_field_name;
///
/// assert!(validate_field_name("authorCache").is_ok());
/// assert!(validate_field_name("").is_err());
/// assert!(validate_field_name("_id").is_err());
/// ```
pub fn validate_field_name(field: &str) -> ConfigResult<()> {
    if field.trim().is_empty() {
        return Err(ConfigError::InvalidFieldName {
            field: field.to_string(),
            reason: "field name must not be empty".to_string(),
        });
    }

    if field == ID_FIELD {
        return Err(ConfigError::InvalidFieldName {
            field: field.to_string(),
            reason: "the identity field is copied from the source and can not be computed"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates the source/view pair and the `sync` map of a spec.
pub fn validate_spec(spec: &SyncSpec) -> ConfigResult<()> {
    if same_collection(spec.source().as_ref(), spec.view().as_ref()) {
        return Err(ConfigError::SourceEqualsTarget(
            spec.source().name().to_string(),
        ));
    }

    if spec.sync().is_empty() {
        return Err(ConfigError::EmptySyncMap(spec.identifier().to_string()));
    }

    Ok(())
}

/// Validates every `sync` and `postSync` field name.
pub fn validate_computed_fields(spec: &SyncSpec) -> ConfigResult<()> {
    for field in spec.computed_fields() {
        validate_field_name(field)?;
    }

    Ok(())
}
