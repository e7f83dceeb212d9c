//! Orchestration for pulling Vercel environments into the working directory.
//!
//! Runs the CLI non-interactively first. When that fails and a user is
//! present, asks whether to fall back to an interactive run.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::project_config::ProjectConfig;
use crate::core::types::{ProjectScope, RunMode, ScopeConfig, TeamScope};
use crate::error::VercelError;
use crate::exit_codes::describe;
use crate::io::config::{EnvSettings, PROJECT_CONFIG_FILE};
use crate::io::confirm::{Confirm, Confirmer};
use crate::io::vercel::{Vercel, VercelOptions};

/// Environments pulled, in order.
pub const ENVIRONMENTS: [&str; 3] = ["production", "preview", "development"];

const NO_CREDENTIALS: &str = "no-credentials-found";

const CI_SCOPE_MISSING: &str = "Unable to determine Vercel project configuration. Please specify VERCEL_ORG_ID and VERCEL_PROJECT_ID in CI environment variables or specify teamConfiguration as the first configuration in vercel.project.json";
const CI_SCOPE_NOT_IDS: &str = "Unable to determine Vercel project configuration. Please specify VERCEL_ORG_ID and VERCEL_PROJECT_ID in CI environment variables or make sure the first teamConfiguration in vercel.project.json has teamId and projectId specified";

/// Link the project if needed and pull every environment.
///
/// `options.token` defaults to `VERCEL_ACCESS_TOKEN`. Does nothing inside a
/// Vercel build.
#[instrument(skip_all, fields(ci = settings.ci))]
pub async fn run<C: Confirmer>(
    settings: &EnvSettings,
    config: &ProjectConfig,
    mut options: VercelOptions,
    confirmer: &C,
) -> Result<()> {
    if settings.in_vercel_build {
        debug!("inside a Vercel build, nothing to pull");
        return Ok(());
    }
    if options.token.is_none() {
        options.token.clone_from(&settings.access_token);
    }
    let mut vercel = Vercel::new(options).context("locate the Vercel CLI")?;

    if settings.ci {
        let scope = ci_scope(settings, config)?;
        info!(?scope, "linking in CI");
        vercel.set_scope(Some(scope.team_scope()), Some(scope.project_scope()));
        vercel.link(RunMode::AutoYes, None).await?;
    } else if should_prompt(settings, confirmer).await {
        ensure_linked(&mut vercel, settings, config, confirmer).await?;
    }

    for environment in ENVIRONMENTS {
        pull_environment(&vercel, environment, settings, confirmer).await?;
    }
    Ok(())
}

async fn should_prompt<C: Confirmer>(settings: &EnvSettings, confirmer: &C) -> bool {
    !settings.ci && confirmer.can_prompt().await
}

/// Scope for CI runs: environment IDs, else the first configured entry,
/// which must carry IDs.
pub fn ci_scope(settings: &EnvSettings, config: &ProjectConfig) -> Result<ScopeConfig> {
    if let Some(ids) = settings.scope_ids()? {
        return Ok(ids);
    }
    match config.scopes().first() {
        None => bail!(CI_SCOPE_MISSING),
        Some(ids @ ScopeConfig::Ids { .. }) => Ok(ids.clone()),
        Some(ScopeConfig::Slugs { .. }) => bail!(CI_SCOPE_NOT_IDS),
    }
}

/// Scope for interactive linking: environment IDs, a lone ID entry, or the
/// first slug entry whose team the user belongs to.
pub async fn resolve_scope(
    vercel: &Vercel,
    settings: &EnvSettings,
    config: &ProjectConfig,
) -> Result<ScopeConfig> {
    if let Some(ids) = settings.scope_ids()? {
        return Ok(ids);
    }
    let scopes = config.scopes();
    if scopes.is_empty() {
        bail!("Vercel configuration not found. Please check your {PROJECT_CONFIG_FILE}-file");
    }
    if let [only @ ScopeConfig::Ids { .. }] = scopes {
        return Ok(only.clone());
    }
    let teams = vercel.list_teams(RunMode::NonInteractive).await?;
    debug!(teams = teams.len(), "listed teams");
    scopes
        .iter()
        .find(|scope| {
            matches!(scope, ScopeConfig::Slugs { team_slug, .. } if teams.contains(team_slug))
        })
        .cloned()
        .ok_or_else(|| anyhow!("No known vercel team found"))
}

/// Point `vercel` at `scope`. A project slug already on the runner wins over
/// the configured project.
pub fn apply_scope(vercel: &mut Vercel, scope: &ScopeConfig) {
    let project = match vercel.project() {
        Some(slug @ ProjectScope::Slug(_)) => slug.clone(),
        _ => scope.project_scope(),
    };
    vercel.set_scope(Some(scope.team_scope()), Some(project));
}

async fn ensure_linked<C: Confirmer>(
    vercel: &mut Vercel,
    settings: &EnvSettings,
    config: &ProjectConfig,
    confirmer: &C,
) -> Result<()> {
    let linked = match vercel.is_linked().await {
        Ok(linked) => Some(linked),
        Err(err) if err.is_vercel_code(NO_CREDENTIALS) => {
            let login = Confirm::new("No Vercel credentials found. Login interactively?")
                .default_response(false)
                .timeout_secs(30);
            if !confirmer.confirm(&login).await? {
                return Err(VercelError::Aborted.into());
            }
            vercel.login().await?;
            Some(vercel.is_linked().await?)
        }
        Err(err) => {
            eprintln!("{}", describe(&anyhow::Error::from(err)));
            eprintln!("Failed to check if project is linked. Naively progressing with pulling environments.");
            None
        }
    };
    debug!(?linked, "link status");
    if linked != Some(false) {
        return Ok(());
    }

    let link = Confirm::new("Project is not linked to Vercel. Link project now?")
        .default_response(false)
        .timeout_secs(30);
    if !confirmer.confirm(&link).await? {
        return Err(VercelError::Aborted.into());
    }
    match resolve_scope(vercel, settings, config).await {
        Ok(scope) => {
            info!(?scope, "linking project");
            apply_scope(vercel, &scope);
        }
        Err(err) => {
            warn!(err = %err, "scope resolution failed");
            eprintln!("{}", describe(&err));
            eprintln!("\nFailed to get user scopes. Please pay careful attention to the following prompts!!!");
        }
    }
    let mode = match vercel.team() {
        Some(TeamScope::Id(_)) => RunMode::AutoYes,
        _ => RunMode::Interactive,
    };
    vercel.link(mode, None).await?;
    Ok(())
}

async fn pull_environment<C: Confirmer>(
    vercel: &Vercel,
    name: &str,
    settings: &EnvSettings,
    confirmer: &C,
) -> Result<()> {
    info!(environment = name, "pulling environment");
    let err = match vercel
        .pull_environment(RunMode::NonInteractive, Some(name), None)
        .await
    {
        Ok(_) => return Ok(()),
        Err(err) => err,
    };
    if !err.is_run_failure() || !should_prompt(settings, confirmer).await {
        return Err(err.into());
    }
    eprintln!("{}: {err}", err.name());
    if err.is_vercel_code(NO_CREDENTIALS) {
        return Err(err.into());
    }

    let retry = Confirm::new(format!(
        "Pulling of environment '{name}' failed. Retry interactively?"
    ))
    .default_response(false)
    .timeout_secs(10);
    if !confirmer.confirm(&retry).await? {
        return Err(VercelError::Aborted.into());
    }
    vercel
        .pull_environment(RunMode::Interactive, Some(name), None)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ids(team: &str, project: &str) -> ScopeConfig {
        ScopeConfig::Ids {
            team_id: team.to_string(),
            project_id: project.to_string(),
        }
    }

    fn slugs(team: &str, project: &str) -> ScopeConfig {
        ScopeConfig::Slugs {
            team_slug: team.to_string(),
            project_slug: project.to_string(),
        }
    }

    fn config(scopes: Vec<ScopeConfig>) -> ProjectConfig {
        ProjectConfig {
            team_configuration: Some(scopes),
        }
    }

    #[test]
    fn ci_scope_prefers_environment_ids() {
        let settings = EnvSettings {
            org_id: Some("team_env".to_string()),
            project_id: Some("prj_env".to_string()),
            ..EnvSettings::default()
        };
        let scope = ci_scope(&settings, &config(vec![ids("team_cfg", "prj_cfg")])).expect("scope");
        assert_eq!(scope, ids("team_env", "prj_env"));
    }

    #[test]
    fn ci_scope_requires_ids_in_first_entry() {
        let settings = EnvSettings::default();
        let err = ci_scope(&settings, &ProjectConfig::default()).expect_err("missing");
        assert_eq!(err.to_string(), CI_SCOPE_MISSING);

        let err = ci_scope(&settings, &config(vec![slugs("acme", "web"), ids("t", "p")]))
            .expect_err("slugs first");
        assert_eq!(err.to_string(), CI_SCOPE_NOT_IDS);

        let scope = ci_scope(&settings, &config(vec![ids("t", "p"), slugs("acme", "web")]))
            .expect("ids first");
        assert_eq!(scope, ids("t", "p"));
    }

    #[test]
    fn apply_scope_keeps_existing_project_slug() {
        let mut vercel = Vercel::new(VercelOptions {
            bin: Some(PathBuf::from("/bin/true")),
            project: Some(ProjectScope::Slug("pinned".to_string())),
            ..VercelOptions::default()
        })
        .expect("runner");
        apply_scope(&mut vercel, &ids("team_1", "prj_1"));
        assert_eq!(vercel.team(), Some(&TeamScope::Id("team_1".to_string())));
        assert_eq!(vercel.project(), Some(&ProjectScope::Slug("pinned".to_string())));

        let mut fresh = Vercel::new(VercelOptions {
            bin: Some(PathBuf::from("/bin/true")),
            ..VercelOptions::default()
        })
        .expect("runner");
        apply_scope(&mut fresh, &slugs("acme", "web"));
        assert_eq!(fresh.team(), Some(&TeamScope::Slug("acme".to_string())));
        assert_eq!(fresh.project(), Some(&ProjectScope::Slug("web".to_string())));
    }
}
