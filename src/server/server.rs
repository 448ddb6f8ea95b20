use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Secrets, Settings};
use anyhow::{anyhow, bail};
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Attributes of the `Set-Cookie` header carrying the refresh token.
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub secure: bool,
    pub same_site: String,
    pub path: String,
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub refresh_cookie: RefreshCookie,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;
        let auth = &settings.auth;
        let cancel = CancellationToken::new();
        let mut sweep_targets: Vec<Arc<dyn Purge>> = Vec::new();

        let (session_store, lockout_store): (Arc<dyn SessionStore>, Arc<dyn LockoutStore>) =
            match settings.store.backend.as_str() {
                "memory" => {
                    let sessions = Arc::new(MemorySessionStore::new());
                    let lockouts = Arc::new(MemoryLockoutStore::new());
                    sweep_targets.push(sessions.clone());
                    sweep_targets.push(lockouts.clone());
                    (
                        sessions as Arc<dyn SessionStore>,
                        lockouts as Arc<dyn LockoutStore>,
                    )
                }
                "redis" => {
                    let url = settings
                        .store
                        .redis_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("store.redis_url is required for redis"))?;
                    let redis_client = redis::Client::open(url)?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    let prefix = settings.store.key_prefix.clone();
                    let sessions = RedisSessionStore::new(redis_manager.clone(), prefix.clone());
                    let lockouts = RedisLockoutStore::new(redis_manager, prefix);
                    (
                        Arc::new(sessions) as Arc<dyn SessionStore>,
                        Arc::new(lockouts) as Arc<dyn LockoutStore>,
                    )
                }
                other => bail!("Unknown store backend: {}", other),
            };

        let (credential_repo, pool): (Arc<dyn CredentialRepo>, Option<Pool<MySql>>) =
            match settings.accounts.backend.as_str() {
                "memory" => (
                    Arc::new(MemoryCredentialRepo::new()) as Arc<dyn CredentialRepo>,
                    None,
                ),
                "mysql" => {
                    let url = settings
                        .accounts
                        .mysql_url
                        .as_deref()
                        .ok_or_else(|| anyhow!("accounts.mysql_url is required for mysql"))?;
                    let pool = Pool::<MySql>::connect(url).await?;
                    let repo = MySqlCredentialRepo::new(pool.clone());
                    (Arc::new(repo) as Arc<dyn CredentialRepo>, Some(pool))
                }
                other => bail!("Unknown accounts backend: {}", other),
            };

        let secrets = match &auth.secrets {
            Secrets::Separate { access, refresh } => SigningSecrets::Separate {
                access: access.clone().into_bytes(),
                refresh: refresh.clone().into_bytes(),
            },
            Secrets::Shared { secret } => {
                warn!("access and refresh tokens share one signing secret");
                SigningSecrets::Shared(secret.clone().into_bytes())
            }
        };
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            access_ttl: Duration::from_secs(auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(auth.refresh_ttl_secs),
            leeway: Duration::from_secs(auth.clock_skew_secs),
            secrets,
        }));

        let secret_hasher: Arc<dyn SecretHasher> = match &auth.hash_key {
            Some(key) => Arc::new(
                HmacSha256SecretHasher::new(key.as_bytes()).map_err(|e| anyhow!(e))?,
            ),
            None => Arc::new(Sha256SecretHasher),
        };

        let password = &settings.password;
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2PasswordHasher::with_cost(
                password.memory_kib,
                password.iterations,
                password.parallelism,
            )
            .map_err(|e| anyhow!(e))?,
        );

        let sessions = Arc::new(SessionManager::new(
            token_codec,
            secret_hasher,
            session_store,
            SessionConfig {
                session_ttl: Duration::from_secs(auth.session_ttl_secs),
                clock_skew: Duration::from_secs(auth.clock_skew_secs),
                mismatch_policy: auth.mismatch_policy,
            },
        ));
        let guard = Arc::new(BruteForceGuard::new(
            lockout_store,
            LockoutPolicy {
                threshold: settings.lockout.threshold,
                window: Duration::from_secs(settings.lockout.window_secs),
            },
        ));

        let real_auth_service =
            RealAuthService::new(credential_repo, credential_hasher, guard, sessions);
        real_auth_service.warm_up().await?;
        let auth_service: Arc<dyn AuthService> = Arc::new(real_auth_service);

        let sweeper_handle = if sweep_targets.is_empty() {
            None
        } else {
            Some(spawn_sweeper(
                sweep_targets,
                Duration::from_secs(settings.store.sweep_interval_secs.max(1)),
                cancel.clone(),
            ))
        };

        let refresh_cookie = RefreshCookie {
            secure: settings.cookie.secure,
            same_site: settings.cookie.same_site.clone(),
            path: settings.cookie.path.clone(),
        };

        info!(
            store = %settings.store.backend,
            accounts = %settings.accounts.backend,
            mismatch_policy = ?auth.mismatch_policy,
            "server started"
        );

        Ok(Self {
            auth_service,
            refresh_cookie,
            sweeper_handle: Mutex::new(sweeper_handle),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
