//! Service configuration.
//!
//! Values come from `MERCHANTS_*` environment variables; a YAML file named by
//! `MERCHANTS_CONFIG` may override any of them.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

// Merchant service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct MerchantsConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub page_size: usize,
    pub max_page_size: usize,
}

#[derive(Debug, Default, Deserialize)]
struct PostgresConfigOverride {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout_ms: Option<u64>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MerchantsConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfigOverride>,
    page_size: Option<usize>,
    max_page_size: Option<usize>,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}

impl MerchantsConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("MERCHANTS_BIND", DEFAULT_BIND)
            .parse()
            .with_context(|| "parse MERCHANTS_BIND")?;
        let metrics_bind = env_or("MERCHANTS_METRICS_BIND", DEFAULT_METRICS_BIND)
            .parse()
            .with_context(|| "parse MERCHANTS_METRICS_BIND")?;
        let storage = StorageBackend::parse(&env_or("MERCHANTS_STORAGE_BACKEND", "memory"))?;
        let postgres = match std::env::var("MERCHANTS_POSTGRES_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
        {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parsed(
                    "MERCHANTS_POSTGRES_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                connect_timeout_ms: env_parsed(
                    "MERCHANTS_POSTGRES_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_CONNECT_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_parsed(
                    "MERCHANTS_POSTGRES_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };
        let config = Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            page_size: env_parsed("MERCHANTS_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            max_page_size: env_parsed("MERCHANTS_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("MERCHANTS_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read MERCHANTS_CONFIG: {path}"))?;
            let override_cfg: MerchantsConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse merchants config yaml")?;
            config.apply_override(override_cfg)?;
            config.validate()?;
        }
        Ok(config)
    }

    fn apply_override(&mut self, override_cfg: MerchantsConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.page_size {
            self.page_size = value;
        }
        if let Some(value) = override_cfg.max_page_size {
            self.max_page_size = value;
        }
        if let Some(pg) = override_cfg.postgres {
            let base = self.postgres.take();
            let url = match (pg.url, base.as_ref()) {
                (Some(url), _) => url,
                (None, Some(existing)) => existing.url.clone(),
                (None, None) => {
                    self.postgres = None;
                    return Ok(());
                }
            };
            self.postgres = Some(PostgresConfig {
                url,
                max_connections: pg
                    .max_connections
                    .or(base.as_ref().map(|b| b.max_connections))
                    .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                connect_timeout_ms: pg
                    .connect_timeout_ms
                    .or(base.as_ref().map(|b| b.connect_timeout_ms))
                    .unwrap_or(DEFAULT_PG_CONNECT_TIMEOUT_MS),
                acquire_timeout_ms: pg
                    .acquire_timeout_ms
                    .or(base.as_ref().map(|b| b.acquire_timeout_ms))
                    .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be greater than zero");
        }
        if self.max_page_size < self.page_size {
            bail!("max_page_size must be at least page_size");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const VARS: &[&str] = &[
        "MERCHANTS_BIND",
        "MERCHANTS_METRICS_BIND",
        "MERCHANTS_STORAGE_BACKEND",
        "MERCHANTS_POSTGRES_URL",
        "DATABASE_URL",
        "MERCHANTS_POSTGRES_MAX_CONNECTIONS",
        "MERCHANTS_POSTGRES_CONNECT_TIMEOUT_MS",
        "MERCHANTS_POSTGRES_ACQUIRE_TIMEOUT_MS",
        "MERCHANTS_PAGE_SIZE",
        "MERCHANTS_MAX_PAGE_SIZE",
        "MERCHANTS_CONFIG",
    ];

    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn clean() -> Self {
            let saved = VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect();
            for name in VARS {
                unsafe { std::env::remove_var(name) };
            }
            Self { saved }
        }

        fn set(&self, name: &str, value: &str) {
            unsafe { std::env::set_var(name, value) };
        }

        fn unset(&self, name: &str) {
            unsafe { std::env::remove_var(name) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(value) => unsafe { std::env::set_var(name, value) },
                    None => unsafe { std::env::remove_var(name) },
                }
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        let _guard = EnvGuard::clean();
        let config = MerchantsConfig::from_env().expect("config");
        assert_eq!(config.bind_addr, DEFAULT_BIND.parse().expect("addr"));
        assert_eq!(config.metrics_bind, DEFAULT_METRICS_BIND.parse().expect("addr"));
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(config.postgres.is_none());
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page_size, DEFAULT_MAX_PAGE_SIZE);
    }

    #[test]
    #[serial]
    fn env_selects_postgres_with_pool_settings() {
        let guard = EnvGuard::clean();
        guard.set("MERCHANTS_STORAGE_BACKEND", "Postgres");
        guard.set("DATABASE_URL", "postgres://localhost/merchants");
        guard.set("MERCHANTS_POSTGRES_MAX_CONNECTIONS", "3");
        guard.set("MERCHANTS_PAGE_SIZE", "25");
        let config = MerchantsConfig::from_env().expect("config");
        assert_eq!(config.storage, StorageBackend::Postgres);
        let pg = config.postgres.expect("postgres");
        assert_eq!(pg.url, "postgres://localhost/merchants");
        assert_eq!(pg.max_connections, 3);
        assert_eq!(pg.acquire_timeout_ms, DEFAULT_PG_ACQUIRE_TIMEOUT_MS);
        assert_eq!(config.page_size, 25);
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        let guard = EnvGuard::clean();
        guard.set("MERCHANTS_BIND", "not-an-addr");
        assert!(MerchantsConfig::from_env().is_err());
        guard.unset("MERCHANTS_BIND");

        guard.set("MERCHANTS_STORAGE_BACKEND", "sqlite");
        let err = MerchantsConfig::from_env().expect_err("backend");
        assert!(err.to_string().contains("unknown storage backend"));
        guard.unset("MERCHANTS_STORAGE_BACKEND");

        guard.set("MERCHANTS_PAGE_SIZE", "0");
        assert!(MerchantsConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn yaml_overrides_env_values() {
        let guard = EnvGuard::clean();
        let mut file = tempfile_path("merchants-config.yaml");
        writeln!(
            file.1,
            "bind_addr: \"127.0.0.1:9000\"\nstorage: postgres\npage_size: 5\npostgres:\n  url: \"postgres://db/merchants\"\n  max_connections: 2\n"
        )
        .expect("write yaml");
        guard.set("MERCHANTS_CONFIG", file.0.to_str().expect("path"));
        let config = MerchantsConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().expect("addr"));
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.page_size, 5);
        let pg = config.postgres.expect("postgres");
        assert_eq!(pg.url, "postgres://db/merchants");
        assert_eq!(pg.max_connections, 2);
        assert_eq!(pg.connect_timeout_ms, DEFAULT_PG_CONNECT_TIMEOUT_MS);
        let _ = std::fs::remove_file(&file.0);
    }

    #[test]
    #[serial]
    fn missing_yaml_file_is_an_error() {
        let guard = EnvGuard::clean();
        guard.set("MERCHANTS_CONFIG", "/definitely/not/here.yaml");
        let err = MerchantsConfig::from_env_or_yaml().expect_err("missing file");
        assert!(err.to_string().contains("read MERCHANTS_CONFIG"));
    }

    fn tempfile_path(name: &str) -> (std::path::PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("{}-{name}", std::process::id()));
        let file = std::fs::File::create(&path).expect("create temp file");
        (path, file)
    }
}
