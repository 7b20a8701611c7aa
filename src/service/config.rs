use std::{env, sync::Arc};

use crate::config::Config;

pub trait ConfigService: Send + Sync {
    fn port(&self) -> u16;
    fn values(&self) -> &Config;
}

pub struct ConfigServiceImpl {
    config: Arc<Config>,
}

impl ConfigServiceImpl {
    fn strip_wrapping_quotes(value: &str) -> &str {
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let first = bytes[0];
            let last = bytes[value.len() - 1];
            if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
                return &value[1..value.len() - 1];
            }
        }
        value
    }

    fn normalize(value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = Self::strip_wrapping_quotes(trimmed).trim();
        if normalized.is_empty() {
            None
        } else {
            Some(normalized.to_string())
        }
    }

    fn env_nonempty(key: &str) -> Option<String> {
        env::var(key).ok().and_then(|value| Self::normalize(&value))
    }

    fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
        Self::env_nonempty(key).and_then(|value| value.parse::<T>().ok())
    }

    fn env_bool(key: &str, default: bool) -> bool {
        Self::env_nonempty(key)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    pub fn new() -> Self {
        let defaults = Config::default();
        let port = Self::env_parse::<u16>("PORT").unwrap_or(defaults.port);
        let database_url = Self::env_nonempty("DATABASE_URL");
        let redis_url = Self::env_nonempty("REDIS_URL");
        let session_ttl_seconds =
            Self::env_parse::<u64>("SESSION_TTL_SECONDS").unwrap_or(defaults.session_ttl_seconds);
        let session_key_prefix =
            Self::env_nonempty("SESSION_KEY_PREFIX").unwrap_or(defaults.session_key_prefix);
        let cookie_secure = Self::env_bool("COOKIE_SECURE", defaults.cookie_secure);
        let cookie_domain = Self::env_nonempty("COOKIE_DOMAIN");
        let password_min_length = Self::env_parse::<usize>("PASSWORD_MIN_LENGTH")
            .filter(|value| *value > 0)
            .unwrap_or(defaults.password_min_length);
        let seed_admin_email = Self::env_nonempty("SEED_ADMIN_EMAIL");
        let seed_admin_password = Self::env_nonempty("SEED_ADMIN_PASSWORD");

        Self::from_config(Config {
            port,
            database_url,
            redis_url,
            session_ttl_seconds,
            session_key_prefix,
            cookie_secure,
            cookie_domain,
            password_min_length,
            seed_admin_email,
            seed_admin_password,
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl ConfigService for ConfigServiceImpl {
    fn port(&self) -> u16 {
        self.config.port
    }

    fn values(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_quotes_and_blanks() {
        assert_eq!(
            ConfigServiceImpl::normalize(" \"postgres://db\" "),
            Some("postgres://db".to_string())
        );
        assert_eq!(ConfigServiceImpl::normalize("''"), None);
        assert_eq!(ConfigServiceImpl::normalize("   "), None);
        assert_eq!(ConfigServiceImpl::normalize("'x'"), Some("x".to_string()));
    }
}
