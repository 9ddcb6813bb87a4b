use std::env;
use std::str::FromStr;
use std::time::Duration;

use shared::models::{CalendarSource, TaskRule};

use crate::error::ConfigError;
use crate::rules::default_rules;

/// Booking calendars reconciled on every run: (name, feed url variable, colour)
pub const DEFAULT_SOURCES: [(&str, &str, &str); 5] = [
    ("Wavesong", "WAVESONG_ICAL_URL", "#1e56b0"),
    ("Red", "RED_ICAL_URL", "#91231d"),
    ("Lake Breeze", "LAKE_BREEZE_ICAL_URL", "#21a677"),
    ("Betsie", "BETSIE_ICAL_URL", "#4a120c"),
    ("Betsie Airbnb", "BETSIE_AIRBNB_ICAL_URL", "#4a120c"),
];

pub const TODOIST_TOKEN_VAR: &str = "TODOIST_API_TOKEN";
const DEFAULT_TODOIST_URL: &str = "https://api.todoist.com/api/v1";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub todoist_token: String,
    pub todoist_base_url: String,
    pub sources: Vec<CalendarSource>,
    pub rules: Vec<TaskRule>,
    /// Leading segment of every idempotency key
    pub key_prefix: String,
    pub fetch_timeout: Duration,
    pub feed_cache_ttl: Duration,
    /// Length of the event window, in calendar months from today
    pub event_window_months: u32,
    /// Extra days added on each side of the existing-task query window
    pub query_slack_days: i64,
    pub task_list_limit: u32,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Every missing
    /// required variable is reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut missing = Vec::new();

        let todoist_token = required(TODOIST_TOKEN_VAR);
        if todoist_token.is_none() {
            missing.push(TODOIST_TOKEN_VAR.to_string());
        }

        let mut sources = Vec::with_capacity(DEFAULT_SOURCES.len());
        for (name, var, color) in DEFAULT_SOURCES {
            match required(var) {
                Some(feed_url) => sources.push(CalendarSource {
                    name: name.to_string(),
                    color: color.to_string(),
                    feed_url,
                    rules: None,
                }),
                None => missing.push(var.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(Self {
            todoist_token: todoist_token.unwrap_or_default(),
            todoist_base_url: lookup("TODOIST_API_URL")
                .unwrap_or_else(|| DEFAULT_TODOIST_URL.to_string()),
            sources,
            rules: default_rules(),
            key_prefix: lookup("TASK_KEY_PREFIX").unwrap_or_else(|| "booking".to_string()),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FEED_FETCH_TIMEOUT_SECS", 15)?),
            feed_cache_ttl: Duration::from_secs(parse_or(&lookup, "FEED_CACHE_TTL_SECS", 3600)?),
            event_window_months: parse_or(&lookup, "EVENT_WINDOW_MONTHS", 1)?,
            query_slack_days: parse_or(&lookup, "TASK_QUERY_SLACK_DAYS", 5)?,
            task_list_limit: parse_or(&lookup, "TASK_LIST_LIMIT", 200)?,
        })
    }

    /// Rules in force for one source
    pub fn rules_for<'a>(&'a self, source: &'a CalendarSource) -> &'a [TaskRule] {
        source.rules.as_deref().unwrap_or(&self.rules)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert(TODOIST_TOKEN_VAR, "token".to_string());
        for (_, var, _) in DEFAULT_SOURCES {
            vars.insert(var, format!("https://feeds.example.com/{}.ics", var.to_lowercase()));
        }
        vars
    }

    #[test]
    fn test_loads_defaults() {
        let vars = full_env();
        let config = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.sources[2].name, "Lake Breeze");
        assert_eq!(config.sources[2].color, "#21a677");
        assert_eq!(config.key_prefix, "booking");
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.feed_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.event_window_months, 1);
        assert_eq!(config.rules.len(), 3);
    }

    #[test]
    fn test_missing_vars_are_all_reported() {
        let mut vars = full_env();
        vars.remove(TODOIST_TOKEN_VAR);
        vars.remove("RED_ICAL_URL");
        vars.insert("BETSIE_ICAL_URL", "   ".to_string());

        let err = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec![
                "TODOIST_API_TOKEN".to_string(),
                "RED_ICAL_URL".to_string(),
                "BETSIE_ICAL_URL".to_string(),
            ])
        );
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut vars = full_env();
        vars.insert("FEED_FETCH_TIMEOUT_SECS", "soon".to_string());

        let err = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "FEED_FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_source_override_replaces_rules() {
        let vars = full_env();
        let mut config = EngineConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let custom = vec![TaskRule::new("Stock Firewood", -1, shared::models::RuleAnchor::Start)];
        config.sources[0].rules = Some(custom.clone());

        assert_eq!(config.rules_for(&config.sources[0]), custom.as_slice());
        assert_eq!(config.rules_for(&config.sources[1]).len(), 3);
    }
}
