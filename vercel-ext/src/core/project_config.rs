//! Lenient interpretation of `vercel.project.json`.
//!
//! Invalid `teamConfiguration` entries never fail the load: they are skipped
//! and described in the returned warnings, which the caller logs.

use serde_json::{Map, Value};

use crate::core::types::ScopeConfig;

/// Parsed project configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfig {
    /// `None` when nothing usable was configured.
    pub team_configuration: Option<Vec<ScopeConfig>>,
}

impl ProjectConfig {
    /// Configured entries; empty when none.
    pub fn scopes(&self) -> &[ScopeConfig] {
        self.team_configuration.as_deref().unwrap_or_default()
    }
}

/// A parsed value together with the problems met along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Interpret the root JSON value of the config file.
pub fn parse_project_config(root: &Value) -> Parsed<ProjectConfig> {
    let mut warnings = Vec::new();
    let Value::Object(root) = root else {
        warnings.push("Config file is not an object. Using default config.".to_string());
        return Parsed {
            value: ProjectConfig::default(),
            warnings,
        };
    };
    let team_configuration = root
        .get("teamConfiguration")
        .and_then(|raw| parse_team_configuration(raw, &mut warnings));
    Parsed {
        value: ProjectConfig { team_configuration },
        warnings,
    }
}

fn parse_team_configuration(raw: &Value, warnings: &mut Vec<String>) -> Option<Vec<ScopeConfig>> {
    let entries: Vec<ScopeConfig> = match raw {
        Value::Null => return None,
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                parse_entry(item, &format!("teamConfiguration[{index}]"), warnings)
            })
            .collect(),
        Value::Object(_) => parse_entry(raw, "teamConfiguration", warnings)
            .into_iter()
            .collect(),
        other => {
            warnings.push(format!(
                "Invalid teamConfiguration. Expected `teamConfiguration` to be an object or array, got `{}`",
                json_type(other)
            ));
            return None;
        }
    };
    (!entries.is_empty()).then_some(entries)
}

fn parse_entry(raw: &Value, path: &str, warnings: &mut Vec<String>) -> Option<ScopeConfig> {
    let object = match raw {
        Value::Object(object) => object,
        Value::Null => return None,
        other => {
            warnings.push(format!(
                "Invalid teamConfiguration. Expected `{path}` to be an object, got `{}`",
                json_type(other)
            ));
            return None;
        }
    };

    let field = |name: &str, warnings: &mut Vec<String>| string_field(object, path, name, warnings);
    let team_id = field("teamId", warnings).ok()?;
    let team_slug = field("teamSlug", warnings).ok()?;
    let project_id = field("projectId", warnings).ok()?;
    let project_slug = field("projectSlug", warnings).ok()?;

    match (team_id, team_slug) {
        (Some(team_id), _) => match project_id {
            Some(project_id) => Some(ScopeConfig::Ids {
                team_id,
                project_id,
            }),
            None => {
                warnings.push(format!(
                    "Invalid teamConfiguration. Expected `{path}.projectId` to be defined when `{path}.teamId` is set"
                ));
                None
            }
        },
        (None, Some(team_slug)) => match project_slug {
            Some(project_slug) => Some(ScopeConfig::Slugs {
                team_slug,
                project_slug,
            }),
            None => {
                warnings.push(format!(
                    "Invalid teamConfiguration. Expected `{path}.projectSlug` to be defined when `{path}.teamId` is not set"
                ));
                None
            }
        },
        (None, None) => {
            warnings.push(format!(
                "Invalid teamConfiguration. Expected either `{path}.teamId` or `{path}.teamSlug` to be set"
            ));
            None
        }
    }
}

/// `Ok(None)` for missing or null fields, `Err` (already warned) for wrong types.
fn string_field(
    object: &Map<String, Value>,
    path: &str,
    name: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<String>, ()> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => {
            warnings.push(format!(
                "Invalid teamConfiguration. Expected `{path}.{name}` to be a string, got `{}`",
                json_type(other)
            ));
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_becomes_one_entry() {
        let parsed = parse_project_config(&json!({
            "teamConfiguration": { "teamId": "team_1", "projectId": "prj_1" }
        }));
        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.value.scopes(),
            [ScopeConfig::Ids {
                team_id: "team_1".to_string(),
                project_id: "prj_1".to_string()
            }]
        );
    }

    #[test]
    fn invalid_array_entries_are_skipped_with_warnings() {
        let parsed = parse_project_config(&json!({
            "teamConfiguration": [
                { "teamSlug": "acme", "projectSlug": "web" },
                { "teamId": "team_1" },
                { "teamSlug": 7, "projectSlug": "x" },
                "nope",
                {}
            ]
        }));
        assert_eq!(
            parsed.value.scopes(),
            [ScopeConfig::Slugs {
                team_slug: "acme".to_string(),
                project_slug: "web".to_string()
            }]
        );
        assert_eq!(parsed.warnings.len(), 4);
        assert!(parsed.warnings[0].contains("`teamConfiguration[1].projectId` to be defined"));
        assert!(parsed.warnings[1].contains("`teamConfiguration[2].teamSlug` to be a string, got `number`"));
        assert!(parsed.warnings[2].contains("got `string`"));
    }

    #[test]
    fn team_id_wins_over_slug() {
        let parsed = parse_project_config(&json!({
            "teamConfiguration": {
                "teamId": "team_1", "projectId": "prj_1",
                "teamSlug": "acme", "projectSlug": "web"
            }
        }));
        assert!(matches!(parsed.value.scopes(), [ScopeConfig::Ids { .. }]));
    }

    #[test]
    fn all_invalid_means_no_configuration() {
        let parsed = parse_project_config(&json!({ "teamConfiguration": [{}] }));
        assert_eq!(parsed.value, ProjectConfig::default());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn non_object_root_uses_default() {
        let parsed = parse_project_config(&json!([1, 2]));
        assert_eq!(parsed.value, ProjectConfig::default());
        assert_eq!(
            parsed.warnings,
            vec!["Config file is not an object. Using default config."]
        );

        let scalar = parse_project_config(&json!({ "teamConfiguration": 3 }));
        assert_eq!(scalar.value.team_configuration, None);
        assert!(scalar.warnings[0].contains("object or array, got `number`"));
    }
}
