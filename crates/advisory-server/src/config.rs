use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Placeholder JWT secret used when none is configured.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("ADVISORY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("ADVISORY_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("ADVISORY_PORT must be a port number")?;
        let db_path: PathBuf = lookup("ADVISORY_DB_PATH")
            .unwrap_or_else(|| "advisories.db".into())
            .into();
        let jwt_secret = lookup("ADVISORY_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEV_JWT_SECRET.into());

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("advisories.db"));
        assert!(cfg.uses_dev_secret());
        assert_eq!(cfg.listen_addr().unwrap().port(), 3000);
    }

    #[test]
    fn reads_overrides() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("ADVISORY_HOST", "127.0.0.1"),
            ("ADVISORY_PORT", "8088"),
            ("ADVISORY_DB_PATH", "/var/lib/advisory/store.db"),
            ("ADVISORY_JWT_SECRET", "prod-secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "127.0.0.1:8088");
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/advisory/store.db"));
        assert!(!cfg.uses_dev_secret());
    }

    #[test]
    fn empty_secret_falls_back_to_dev_secret() {
        let cfg = ServerConfig::from_lookup(lookup(&[("ADVISORY_JWT_SECRET", "")])).unwrap();
        assert!(cfg.uses_dev_secret());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(ServerConfig::from_lookup(lookup(&[("ADVISORY_PORT", "http")])).is_err());
    }

    #[test]
    fn bad_host_fails_listen_addr() {
        let cfg = ServerConfig::from_lookup(lookup(&[("ADVISORY_HOST", "not a host")])).unwrap();
        assert!(cfg.listen_addr().is_err());
    }
}
