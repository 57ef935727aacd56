// src/config.rs

//! Configuration loading utilities.
//!
//! The configuration file supplies everything except secrets, which may be
//! overlaid from the process environment once at start-up.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, SourceKind};

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Config::default();
    }
    Config::load_or_default(path)
}

/// Overlay secrets and switches from the process environment.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Overlay values from `lookup`; blank values are ignored.
pub fn apply_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let translation = &mut config.translation;

    if let Some(key) = get("GEMINI_API_KEY") {
        translation.gemini_api_key = Some(key);
    }
    let models: Vec<String> = ["GEMINI_API_MODEL_1", "GEMINI_API_MODEL_2", "GEMINI_API_MODEL_3"]
        .into_iter()
        .filter_map(|key| get(key))
        .collect();
    if !models.is_empty() {
        translation.gemini_models = models;
    }

    if let Some(key) = get("CLAUDE_API_KEY") {
        translation.claude_api_key = Some(key);
    }
    if let Some(model) = get("CLAUDE_API_MODEL") {
        translation.claude_model = model;
    }
    if let Some(key) = get("OPENAI_API_KEY") {
        translation.openai_api_key = Some(key);
    }
    if let Some(model) = get("OPENAI_API_MODEL") {
        translation.openai_model = model;
    }
    if let Some(flag) = get("ENABLE_TRANSLATION") {
        translation.enabled = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }

    if let Some(cookie) = get("BOKUAO_COOKIE") {
        config
            .groups
            .iter_mut()
            .filter(|g| g.source == SourceKind::Bokuao)
            .for_each(|g| g.cookie = Some(cookie.clone()));
    }

    if let Some(secs) = get("POLLING_INTERVAL_SECS") {
        config.schedule.polling_interval_secs = secs.parse().map_err(|_| {
            AppError::config(format!("POLLING_INTERVAL_SECS is not a number: '{secs}'"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::models::Provider;

    fn apply(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = Config::default();
        apply_overrides(&mut config, |key| vars.get(key).cloned())?;
        Ok(config)
    }

    #[test]
    fn test_no_variables_keeps_defaults() {
        let config = apply(&[]).unwrap();
        assert!(!config.translation.enabled);
        assert!(config.translation.gemini_api_key.is_none());
        assert_eq!(config.schedule.polling_interval_secs, 900);
    }

    #[test]
    fn test_secrets_and_models() {
        let config = apply(&[
            ("GEMINI_API_KEY", "g-key"),
            ("GEMINI_API_MODEL_1", "gemini-a"),
            ("GEMINI_API_MODEL_3", "gemini-c"),
            ("GEMINI_API_MODEL_2", "  "),
            ("CLAUDE_API_KEY", "c-key"),
            ("OPENAI_API_MODEL", "gpt-x"),
            ("ENABLE_TRANSLATION", "TRUE"),
        ])
        .unwrap();

        let t = &config.translation;
        assert_eq!(t.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(t.gemini_models, vec!["gemini-a".to_string(), "gemini-c".to_string()]);
        assert_eq!(t.claude_api_key.as_deref(), Some("c-key"));
        assert_eq!(t.openai_model, "gpt-x");
        assert!(t.enabled);
        assert_eq!(t.provider, Provider::Gemini);
    }

    #[test]
    fn test_cookie_applies_to_bokuao_only() {
        let config = apply(&[("BOKUAO_COOKIE", "session=abc")]).unwrap();
        assert_eq!(
            config.group("Bokuao").unwrap().cookie.as_deref(),
            Some("session=abc")
        );
        assert!(config.group("Hinatazaka46").unwrap().cookie.is_none());
    }

    #[test]
    fn test_polling_interval() {
        let config = apply(&[("POLLING_INTERVAL_SECS", "60")]).unwrap();
        assert_eq!(config.schedule.polling_interval_secs, 60);
        assert!(apply(&[("POLLING_INTERVAL_SECS", "soon")]).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("harvester.toml"));
        assert_eq!(config.groups.len(), 4);
    }
}
