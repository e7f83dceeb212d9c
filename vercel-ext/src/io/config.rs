//! Configuration from the process environment and `vercel.project.json`.

use std::fs;
use std::path::Path;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::project_config::{ProjectConfig, parse_project_config};
use crate::core::types::ScopeConfig;

/// Project configuration file, relative to the working directory.
pub const PROJECT_CONFIG_FILE: &str = "vercel.project.json";

/// Settings read from environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    /// `VERCEL_ACCESS_TOKEN`.
    pub access_token: Option<String>,
    /// `VERCEL_ORG_ID`.
    pub org_id: Option<String>,
    /// `VERCEL_PROJECT_ID`.
    pub project_id: Option<String>,
    /// `CI=true`.
    pub ci: bool,
    /// `VERCEL` is set: running inside a Vercel build.
    pub in_vercel_build: bool,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());
        Self {
            access_token: non_empty("VERCEL_ACCESS_TOKEN"),
            org_id: non_empty("VERCEL_ORG_ID"),
            project_id: non_empty("VERCEL_PROJECT_ID"),
            ci: lookup("CI").as_deref() == Some("true"),
            in_vercel_build: non_empty("VERCEL").is_some(),
        }
    }

    /// Team and project IDs from the environment. Both or neither must be set.
    pub fn scope_ids(&self) -> Result<Option<ScopeConfig>> {
        match (&self.org_id, &self.project_id) {
            (None, None) => Ok(None),
            (Some(team_id), Some(project_id)) => Ok(Some(ScopeConfig::Ids {
                team_id: team_id.clone(),
                project_id: project_id.clone(),
            })),
            (None, Some(_)) => bail!("VERCEL_ORG_ID must be set when VERCEL_PROJECT_ID is set"),
            (Some(_), None) => bail!("VERCEL_PROJECT_ID must be set when VERCEL_ORG_ID is set"),
        }
    }
}

/// Load the project configuration.
///
/// Never fails: a missing file, unreadable file or invalid JSON yields the
/// default configuration.
pub fn load_project_config(path: &Path) -> ProjectConfig {
    if !path.exists() {
        debug!(path = %path.display(), "no project config");
        return ProjectConfig::default();
    }
    let root: Value = match fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| Ok(serde_json::from_str(&contents)?))
    {
        Ok(root) => root,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "Unable to load config file. Using default config.");
            return ProjectConfig::default();
        }
    };
    let parsed = parse_project_config(&root);
    for warning in &parsed.warnings {
        warn!(path = %path.display(), "{warning}");
    }
    debug!(entries = parsed.value.scopes().len(), "project config loaded");
    parsed.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> EnvSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EnvSettings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn reads_flags_from_variables() {
        let env = settings(&[("CI", "true"), ("VERCEL", "1"), ("VERCEL_ACCESS_TOKEN", "tok")]);
        assert!(env.ci);
        assert!(env.in_vercel_build);
        assert_eq!(env.access_token.as_deref(), Some("tok"));

        let env = settings(&[("CI", "1"), ("VERCEL_ACCESS_TOKEN", "")]);
        assert!(!env.ci);
        assert_eq!(env.access_token, None);
    }

    #[test]
    fn scope_ids_require_both_variables() {
        assert_eq!(settings(&[]).scope_ids().expect("none"), None);
        assert_eq!(
            settings(&[("VERCEL_ORG_ID", "team_1"), ("VERCEL_PROJECT_ID", "prj_1")])
                .scope_ids()
                .expect("pair"),
            Some(ScopeConfig::Ids {
                team_id: "team_1".to_string(),
                project_id: "prj_1".to_string(),
            })
        );
        let err = settings(&[("VERCEL_PROJECT_ID", "prj_1")])
            .scope_ids()
            .expect_err("missing org");
        assert_eq!(err.to_string(), "VERCEL_ORG_ID must be set when VERCEL_PROJECT_ID is set");
        let err = settings(&[("VERCEL_ORG_ID", "team_1")])
            .scope_ids()
            .expect_err("missing project");
        assert_eq!(err.to_string(), "VERCEL_PROJECT_ID must be set when VERCEL_ORG_ID is set");
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(&temp.path().join(PROJECT_CONFIG_FILE));
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn load_invalid_json_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(PROJECT_CONFIG_FILE);
        fs::write(&path, "{ not json").expect("write");
        assert_eq!(load_project_config(&path), ProjectConfig::default());
    }

    #[test]
    fn load_reads_team_configuration() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(PROJECT_CONFIG_FILE);
        fs::write(
            &path,
            r#"{"teamConfiguration":[{"teamSlug":"acme","projectSlug":"web"},{"teamId":"t"}]}"#,
        )
        .expect("write");
        let cfg = load_project_config(&path);
        assert_eq!(
            cfg.scopes(),
            [ScopeConfig::Slugs {
                team_slug: "acme".to_string(),
                project_slug: "web".to_string(),
            }]
        );
    }
}
