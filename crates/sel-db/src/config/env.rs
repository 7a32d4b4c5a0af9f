//! Environment variable overrides for configuration

use std::env;

use super::sql::RawConfig;

/// Environment variable names
mod vars {
    pub const SELDB_SERVER: &str = "SELDB_SERVER";
    pub const SELDB_USER: &str = "SELDB_USER";
    pub const SELDB_PASSWORD: &str = "SELDB_PASSWORD";
}

/// Override server and credentials from the environment when set.
#[must_use]
pub fn apply_env(mut raw: RawConfig) -> RawConfig {
    if let Ok(server) = env::var(vars::SELDB_SERVER) {
        raw.server = Some(server);
    }

    if let Ok(user) = env::var(vars::SELDB_USER) {
        raw.authentication
            .get_or_insert_with(Default::default)
            .options
            .get_or_insert_with(Default::default)
            .user_name = Some(user);
    }

    if let Ok(password) = env::var(vars::SELDB_PASSWORD) {
        raw.authentication
            .get_or_insert_with(Default::default)
            .options
            .get_or_insert_with(Default::default)
            .password = Some(password);
    }

    raw
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::ConfigBuilder;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(overrides: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap();

        let all = [vars::SELDB_SERVER, vars::SELDB_USER, vars::SELDB_PASSWORD];
        let old_values: Vec<_> = all.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in all {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::remove_var(key) };
        }
        for (key, value) in overrides {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::set_var(key, value) };
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_no_env_leaves_config_untouched() {
        with_env_vars(&[], || {
            let raw = ConfigBuilder::new().server("db").into_raw();
            assert_eq!(apply_env(raw.clone()), raw);
        });
    }

    #[test]
    fn test_env_overrides_server() {
        with_env_vars(&[("SELDB_SERVER", "prod-db")], || {
            let raw = apply_env(ConfigBuilder::new().server("dev-db").into_raw());
            assert_eq!(raw.server.as_deref(), Some("prod-db"));
        });
    }

    #[test]
    fn test_env_fills_missing_credentials() {
        with_env_vars(
            &[
                ("SELDB_SERVER", "db"),
                ("SELDB_USER", "svc"),
                ("SELDB_PASSWORD", "pw"),
            ],
            || {
                let config = apply_env(RawConfig::default()).validate().unwrap();
                assert_eq!(config.server(), "db");
                assert_eq!(config.authentication().options.user_name, "svc");
                assert_eq!(config.authentication().options.password, "pw");
            },
        );
    }
}
