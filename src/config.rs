use anyhow::Result;

const DEFAULT_DATABASE_URL: &str = "postgresql://postgres@localhost/stormwatch";
const DEFAULT_DETECTOR_BASE_URL: &str = "http://127.0.0.1:8501";
const DEFAULT_ORACLE_BASE_URL: &str = "http://127.0.0.1:8502";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub database_url: String,
    pub detector_base_url: String,
    pub oracle_base_url: String,
    /// Reference handed to the detector service to select imagery
    /// (typically "latest" for the most recent satellite frame).
    pub imagery_source: String,
    pub check_interval_minutes: u64,
    pub adapter_timeout_seconds: u64,
    pub detection_confidence_threshold: f64,
    pub monitoring_autostart: bool,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            database_url: env_string("DATABASE_URL", DEFAULT_DATABASE_URL),
            detector_base_url: env_string("STORMWATCH_DETECTOR_URL", DEFAULT_DETECTOR_BASE_URL),
            oracle_base_url: env_string("STORMWATCH_ORACLE_URL", DEFAULT_ORACLE_BASE_URL),
            imagery_source: env_string("STORMWATCH_IMAGERY_SOURCE", "latest"),
            check_interval_minutes: env_u64("STORMWATCH_CHECK_INTERVAL_MINUTES", 30),
            adapter_timeout_seconds: env_u64("STORMWATCH_ADAPTER_TIMEOUT_SECONDS", 30),
            detection_confidence_threshold: env_f64("STORMWATCH_CONFIDENCE_THRESHOLD", 0.05),
            monitoring_autostart: env_bool("STORMWATCH_MONITORING_AUTOSTART", true),
        };

        config.check_interval_minutes = config.check_interval_minutes.max(1);
        config.adapter_timeout_seconds = config.adapter_timeout_seconds.max(1);
        config.detection_confidence_threshold =
            config.detection_confidence_threshold.clamp(0.0, 1.0);
        Ok(config)
    }
}

fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "invalid integer env value; using default");
            default
        }
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "invalid float env value; using default");
            default
        }
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(name) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(var = name, value = %raw, "invalid bool env value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vars_fall_back_to_defaults() {
        assert_eq!(
            env_string("STORMWATCH_TEST_UNSET_STRING", "fallback"),
            "fallback"
        );
        assert_eq!(env_u64("STORMWATCH_TEST_UNSET_U64", 30), 30);
        assert_eq!(env_f64("STORMWATCH_TEST_UNSET_F64", 0.05), 0.05);
        assert!(env_bool("STORMWATCH_TEST_UNSET_BOOL", true));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        std::env::set_var("STORMWATCH_TEST_BAD_U64", "not-a-number");
        assert_eq!(env_u64("STORMWATCH_TEST_BAD_U64", 7), 7);

        std::env::set_var("STORMWATCH_TEST_BAD_F64", "wide");
        assert_eq!(env_f64("STORMWATCH_TEST_BAD_F64", 0.5), 0.5);

        std::env::set_var("STORMWATCH_TEST_BAD_BOOL", "maybe");
        assert!(!env_bool("STORMWATCH_TEST_BAD_BOOL", false));
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        std::env::set_var("STORMWATCH_TEST_BOOL_YES", "Yes");
        assert!(env_bool("STORMWATCH_TEST_BOOL_YES", false));

        std::env::set_var("STORMWATCH_TEST_BOOL_OFF", "off");
        assert!(!env_bool("STORMWATCH_TEST_BOOL_OFF", true));
    }

    #[test]
    fn blank_strings_use_the_default() {
        std::env::set_var("STORMWATCH_TEST_BLANK_STRING", "   ");
        assert_eq!(
            env_string("STORMWATCH_TEST_BLANK_STRING", "fallback"),
            "fallback"
        );
    }
}
