// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive limits and unique table names.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::CrimpConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CrimpConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.log_level `{}` is not one of {}",
                config.agent.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.queue.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "queue.max_attempts must be at least 1, got {}",
                config.queue.max_attempts
            ),
        });
    }

    if config.abonement.visit_count_limit < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "abonement.visit_count_limit must be at least 1, got {}",
                config.abonement.visit_count_limit
            ),
        });
    }

    if config.abonement.pagination_limit < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "abonement.pagination_limit must be at least 1, got {}",
                config.abonement.pagination_limit
            ),
        });
    }

    if !config.sheets.link_template.contains("{}") {
        errors.push(ConfigError::Validation {
            message: "sheets.link_template must contain a `{}` placeholder".to_string(),
        });
    }

    // Validate no duplicate table names
    let mut seen_names = HashSet::new();
    for table in &config.tables {
        if !seen_names.insert(&table.name) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate table name `{}` in [[tables]] array", table.name),
            });
        }
    }

    for (i, table) in config.tables.iter().enumerate() {
        if table.name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("tables[{i}].name must not be empty"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableSpec;

    #[test]
    fn default_config_validates() {
        let config = CrimpConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = CrimpConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_pagination_limit_fails_validation() {
        let mut config = CrimpConfig::default();
        config.abonement.pagination_limit = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("pagination_limit"))));
    }

    #[test]
    fn bad_log_level_fails_validation() {
        let mut config = CrimpConfig::default();
        config.agent.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("log_level"))));
    }

    #[test]
    fn duplicate_table_names_fails_validation() {
        let mut config = CrimpConfig::default();
        let spec = TableSpec {
            name: "schedule".to_string(),
            title: "Schedule".to_string(),
            sheet_id: "abc".to_string(),
            output_file: "schedule.js".to_string(),
        };
        config.tables = vec![spec.clone(), spec];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("duplicate table name"))));
    }

    #[test]
    fn tables_array_deserializes_correctly() {
        let toml_str = r#"
[agent]
name = "test"

[[tables]]
name = "schedule"
title = "Climbing schedule"
sheet_id = "sheet-1"
output_file = "schedule.js"

[[tables]]
name = "prices"
title = "Prices"
sheet_id = "sheet-2"
output_file = "prices.js"
"#;
        let config: CrimpConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.tables[0].name, "schedule");
        assert_eq!(config.tables[1].sheet_id, "sheet-2");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn tables_deny_unknown_fields() {
        let toml_str = r#"
[[tables]]
name = "schedule"
title = "Schedule"
sheet_id = "abc"
output_file = "schedule.js"
unknown_field = "bad"
"#;
        let result = toml::from_str::<CrimpConfig>(toml_str);
        assert!(result.is_err());
    }
}
