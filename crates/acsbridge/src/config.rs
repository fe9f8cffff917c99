//! CLI configuration: thin wrapper around `acsbridge_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--nbi-url, --password, ...).

use std::time::Duration;

use secrecy::SecretString;

use acsbridge_core::{AcsConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use acsbridge_config::{Config, Profile, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `AcsConfig` for this invocation.
///
/// Flags override the active profile. Without a profile, `--nbi-url` alone
/// is enough to talk to an unauthenticated NBI.
pub fn resolve_acs_config(global: &GlobalOpts, config: &Config) -> Result<AcsConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let profile = match (config.profiles.get(&profile_name), &global.nbi_url) {
        (Some(profile), _) => profile.clone(),
        (None, Some(_)) => Profile::default(),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(config),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // 1. NBI URL (flag > env > profile)
    let url_str = global.nbi_url.as_deref().unwrap_or(&profile.nbi_url);
    let url = acsbridge_config::parse_nbi_url(url_str)?;

    // 2. Credentials (flag > profile chain)
    let credentials = match (&global.username, &global.password) {
        (Some(user), Some(pw)) => Some((user.clone(), SecretString::from(pw.clone()))),
        (Some(user), None) => {
            let with_user = Profile {
                username: Some(user.clone()),
                ..profile.clone()
            };
            acsbridge_config::resolve_credentials(&with_user, &profile_name)?
        }
        (None, _) => acsbridge_config::resolve_credentials(&profile, &profile_name)?,
    };

    // 3. TLS verification
    let tls = if global.insecure || profile.insecure.unwrap_or(config.defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    // 4. Timeout (flag > profile > defaults)
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(config.defaults.timeout);

    let mut acs = AcsConfig::new(url);
    acs.credentials = credentials;
    acs.tls = tls;
    acs.timeout = Duration::from_secs(timeout);
    acs.task_wait = profile.task_wait.map(Duration::from_secs);
    Ok(acs)
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
