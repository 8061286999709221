use std::env;
use std::path::PathBuf;
use anyhow::{bail, Context, Result};

/// Which record store the service talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Spanner,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "spanner" => Ok(StoreBackend::Spanner),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be one of: spanner, memory, got '{}'", other),
        }
    }
}

/// Spanner connection target
#[derive(Debug, Clone)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub spanner: Option<SpannerConfig>,
    pub contract_path: Option<PathBuf>,
    pub service_port: u16,
    pub service_host: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => StoreBackend::parse(&value)?,
            Err(_) => StoreBackend::Spanner,
        };

        let spanner = match store_backend {
            StoreBackend::Spanner => Some(spanner_from_env()?),
            StoreBackend::Memory => None,
        };

        let contract_path = env::var("CONTRACT_PATH").ok().map(PathBuf::from);

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Config {
            store_backend,
            spanner,
            contract_path,
            service_port,
            service_host,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Store backend: {:?}", self.store_backend);
        if let Some(spanner) = &self.spanner {
            tracing::info!("  Spanner emulator: {}",
                spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
            tracing::info!("  Spanner database: {}", spanner.database_path());
        }
        match &self.contract_path {
            Some(path) => tracing::info!("  Contract: {}", path.display()),
            None => tracing::info!("  Contract: built-in"),
        }
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

fn spanner_from_env() -> Result<SpannerConfig> {
    let emulator_host = env::var("SPANNER_EMULATOR_HOST").ok();

    let project = env::var("SPANNER_PROJECT")
        .context("SPANNER_PROJECT environment variable is required")?;

    let instance = env::var("SPANNER_INSTANCE")
        .context("SPANNER_INSTANCE environment variable is required")?;

    let database = env::var("SPANNER_DATABASE")
        .context("SPANNER_DATABASE environment variable is required")?;

    Ok(SpannerConfig {
        emulator_host,
        project,
        instance,
        database,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env_vars() {
        unsafe {
            env::remove_var("STORE_BACKEND");
            env::remove_var("SPANNER_EMULATOR_HOST");
            env::remove_var("SPANNER_PROJECT");
            env::remove_var("SPANNER_INSTANCE");
            env::remove_var("SPANNER_DATABASE");
            env::remove_var("CONTRACT_PATH");
            env::remove_var("SERVICE_PORT");
            env::remove_var("SERVICE_HOST");
        }
    }

    fn set_required_vars() {
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
            env::set_var("SPANNER_DATABASE", "test-database");
        }
    }

    #[test]
    fn test_config_with_all_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_required_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "spanner");
            env::set_var("SPANNER_EMULATOR_HOST", "localhost:9010");
            env::set_var("CONTRACT_PATH", "/etc/records/openapi.json");
            env::set_var("SERVICE_PORT", "9090");
            env::set_var("SERVICE_HOST", "127.0.0.1");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.store_backend, StoreBackend::Spanner);
        let spanner = config.spanner.unwrap();
        assert_eq!(spanner.emulator_host, Some("localhost:9010".to_string()));
        assert_eq!(
            spanner.database_path(),
            "projects/test-project/instances/test-instance/databases/test-database"
        );
        assert_eq!(config.contract_path, Some(PathBuf::from("/etc/records/openapi.json")));
        assert_eq!(config.service_port, 9090);
        assert_eq!(config.service_host, "127.0.0.1");
    }

    #[test]
    fn test_config_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_required_vars();

        let config = Config::from_env().unwrap();

        assert_eq!(config.store_backend, StoreBackend::Spanner);
        assert_eq!(config.spanner.unwrap().emulator_host, None);
        assert_eq!(config.contract_path, None);
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.service_host, "0.0.0.0");
    }

    #[test]
    fn test_memory_backend_needs_no_spanner_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "Memory");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.spanner.is_none());
    }

    #[test]
    fn test_unknown_backend() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "dynamo");
        }

        let error = Config::from_env().unwrap_err();
        assert!(error.to_string().contains("STORE_BACKEND"));
    }

    #[test]
    fn test_missing_required_var() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
        }
        // Missing SPANNER_DATABASE

        let result = Config::from_env();
        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.to_string().contains("SPANNER_DATABASE"));
    }

    #[test]
    fn test_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_required_vars();
        unsafe {
            env::set_var("SERVICE_PORT", "not-a-number");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.to_string().contains("SERVICE_PORT"));
    }

    #[test]
    fn test_port_out_of_range() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_required_vars();
        unsafe {
            env::set_var("SERVICE_PORT", "99999");
        }

        let result = Config::from_env();
        assert!(result.is_err());
    }
}
