use crate::application_impl::MismatchPolicy;
use anyhow::{Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub accounts: Accounts,
    pub auth: Auth,
    pub cookie: Cookie,
    pub http: Http,
    pub lockout: Lockout,
    pub log: Log,
    #[serde(default)]
    pub password: Password,
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct Accounts {
    pub backend: String, // "memory" or "mysql"
    pub mysql_url: Option<String>,
}

#[derive(Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub clock_skew_secs: u64,
    pub secrets: Secrets,
    /// Enables keyed (HMAC) refresh-token digests.
    pub hash_key: Option<String>,
    #[serde(default)]
    pub mismatch_policy: MismatchPolicy,
}

// secrets stay out of logs
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .field("secrets", &self.secrets)
            .field("hash_key", &self.hash_key.as_ref().map(|_| "<redacted>"))
            .field("mismatch_policy", &self.mismatch_policy)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Secrets {
    Separate { access: String, refresh: String },
    Shared { secret: String },
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Secrets::Separate { .. } => f.write_str("Separate { <redacted> }"),
            Secrets::Shared { .. } => f.write_str("Shared { <redacted> }"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Cookie {
    pub secure: bool,
    pub same_site: String, // "Strict", "Lax" or "None"
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Lockout {
    pub threshold: u32,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

/// Argon2id cost.
#[derive(Debug, Deserialize)]
pub struct Password {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Password {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "redis"
    pub redis_url: Option<String>,
    pub key_prefix: String,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "AUTHGATE";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn from_toml_str(toml: &str) -> Result<Settings> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!(e))?
            .try_deserialize()
            .map_err(|e| anyhow!(e))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.auth.secrets {
            Secrets::Separate { access, refresh } => {
                if access.is_empty() || refresh.is_empty() {
                    bail!("auth.secrets: access and refresh secrets must not be empty");
                }
                if access == refresh {
                    bail!("auth.secrets: identical secrets, use mode = \"shared\" instead");
                }
            }
            Secrets::Shared { secret } => {
                if secret.is_empty() {
                    bail!("auth.secrets: shared secret must not be empty");
                }
            }
        }
        if self.auth.hash_key.as_deref() == Some("") {
            bail!("auth.hash_key must not be empty when set");
        }
        if self.auth.access_ttl_secs == 0
            || self.auth.refresh_ttl_secs == 0
            || self.auth.session_ttl_secs == 0
        {
            bail!("auth: token and session TTLs must be positive");
        }
        if self.lockout.threshold == 0 || self.lockout.window_secs == 0 {
            bail!("lockout: threshold and window must be positive");
        }
        if !matches!(self.cookie.same_site.as_str(), "Strict" | "Lax" | "None") {
            bail!("cookie.same_site must be Strict, Lax or None");
        }
        if self.cookie.same_site == "None" && !self.cookie.secure {
            bail!("cookie.same_site = None requires cookie.secure = true");
        }
        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            bail!("http: cert_path and key_path must be set together");
        }
        Ok(())
    }
}
