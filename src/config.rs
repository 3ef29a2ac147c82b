//! Sync configuration.
//!
//! Configuration is stored as YAML (`ticketbridge.yaml` by default) and includes:
//! - Connection parameters for the remote ticketing API
//! - Priority, status and user mappings in both directions
//!
//! The engine reads configuration through a [`ConfigHandle`], which holds an
//! immutable snapshot that is replaced wholesale when a [`ConfigService`]
//! delivers an update.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BridgeError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "ticketbridge.yaml";
pub const CONFIG_PATH_ENV: &str = "TICKETBRIDGE_CONFIG";
pub const LOGIN_ENV: &str = "TICKETBRIDGE_LOGIN";
pub const PASSWORD_ENV: &str = "TICKETBRIDGE_PASSWORD";

const DEFAULT_BOARD_ID: u64 = 199;
const DEFAULT_COMPANY_ID: u64 = 250;

/// Connection parameters for the remote ticketing system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSourceConfig {
    /// Base URL, e.g. `https://connect.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Ticket collection path, e.g. `/v4_6_release/apis/3.0/service/tickets`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_path: Option<String>,
    /// Sent as the `clientID` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Sent as the `Authorization` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Board new tickets are filed under
    #[serde(default = "default_board_id")]
    pub board_id: u64,
    /// Company new tickets are filed under
    #[serde(default = "default_company_id")]
    pub company_id: u64,
}

fn default_board_id() -> u64 {
    DEFAULT_BOARD_ID
}

fn default_company_id() -> u64 {
    DEFAULT_COMPANY_ID
}

impl Default for TicketSourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_path: None,
            login: None,
            password: None,
            board_id: DEFAULT_BOARD_ID,
            company_id: DEFAULT_COMPANY_ID,
        }
    }
}

/// Lookup tables for one vocabulary (priority, status or user).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mapping {
    /// Local value -> remote value
    #[serde(default)]
    pub to_remote: BTreeMap<String, String>,
    /// Remote value -> local value
    #[serde(default)]
    pub to_local: BTreeMap<String, String>,
}

impl Mapping {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let to_remote: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let to_local = to_remote
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect();
        Self {
            to_remote,
            to_local,
        }
    }

    /// Entries of `to_remote` whose value does not map back through `to_local`.
    fn inconsistencies(&self, domain: &str) -> Vec<String> {
        let mut problems = Vec::new();
        for (local, remote) in &self.to_remote {
            match self.to_local.get(remote) {
                None => problems.push(format!(
                    "{domain}: '{local}' maps to '{remote}' but '{remote}' has no reverse mapping"
                )),
                Some(back) if back != local => problems.push(format!(
                    "{domain}: '{local}' maps to '{remote}' but '{remote}' maps back to '{back}'"
                )),
                Some(_) => {}
            }
        }
        problems
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub ticket_source: TicketSourceConfig,
    #[serde(default)]
    pub priority: Mapping,
    #[serde(default)]
    pub status: Mapping,
    #[serde(default)]
    pub user: Mapping,
}

impl SyncConfig {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml_ng::from_str(content)?;
        Ok(config)
    }

    /// Collection URL (`url + api_path`) that tickets are created under.
    pub fn tickets_url(&self) -> Result<String> {
        let source = &self.ticket_source;
        match (source.url.as_deref(), source.api_path.as_deref()) {
            (Some(url), Some(path)) => Ok(format!("{url}{path}")),
            _ => Err(BridgeError::Config(
                "url and api_path must both be set in ticket_source".to_string(),
            )),
        }
    }

    /// URL of a single remote ticket, if the collection URL is configured.
    pub fn ticket_url(&self, remote_id: &str) -> Option<String> {
        self.tickets_url()
            .ok()
            .map(|base| format!("{base}/{remote_id}"))
    }

    /// Get the login from environment variable or config
    pub fn login(&self) -> Option<String> {
        if let Ok(login) = env::var(LOGIN_ENV)
            && !login.is_empty()
        {
            return Some(login);
        }
        self.ticket_source.login.clone()
    }

    /// Get the password from environment variable or config
    pub fn password(&self) -> Option<String> {
        if let Ok(password) = env::var(PASSWORD_ENV)
            && !password.is_empty()
        {
            return Some(password);
        }
        self.ticket_source.password.clone()
    }

    /// Report forward/reverse mapping pairs that disagree.
    ///
    /// The engine does not enforce consistency; this is surfaced by
    /// `ticketbridge config check`.
    pub fn mapping_inconsistencies(&self) -> Vec<String> {
        let mut problems = self.priority.inconsistencies("priority");
        problems.extend(self.status.inconsistencies("status"));
        problems.extend(self.user.inconsistencies("user"));
        problems
    }
}

/// Shared, replaceable configuration snapshot.
///
/// Readers take an `Arc` clone once and keep it for the duration of a sync,
/// so an update arriving mid-sync only affects the next sync.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<SyncConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<SyncConfig> {
        Arc::clone(&self.inner.read())
    }

    pub fn replace(&self, config: SyncConfig) {
        *self.inner.write() = Arc::new(config);
    }

    /// Retrieve the current configuration from `service` and keep following
    /// its updates.
    pub fn from_service<S: ConfigService + ?Sized>(service: &S, account_id: Uuid) -> Result<Self> {
        let handle = Self::new(service.retrieve_config(account_id)?);
        let updates = handle.clone();
        service.subscribe(
            account_id,
            Box::new(move |config| {
                tracing::info!("Applying configuration update for account {account_id}");
                updates.replace(config);
            }),
        )?;
        Ok(handle)
    }
}

pub type ConfigCallback = Box<dyn Fn(SyncConfig) + Send + Sync + 'static>;

/// Source of per-account configuration
pub trait ConfigService: Send + Sync {
    /// Current configuration snapshot for an account
    fn retrieve_config(&self, account_id: Uuid) -> Result<SyncConfig>;

    /// Register a callback receiving every later configuration for an account
    fn subscribe(&self, account_id: Uuid, on_update: ConfigCallback) -> Result<()>;
}

/// Configuration service backed by a single YAML file.
///
/// Every account reads the same file. Subscriptions watch the file and
/// deliver a freshly parsed configuration on each modification.
pub struct FileConfigService {
    path: PathBuf,
    watchers: Mutex<Vec<RecommendedWatcher>>,
}

impl FileConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigService for FileConfigService {
    fn retrieve_config(&self, _account_id: Uuid) -> Result<SyncConfig> {
        SyncConfig::load(&self.path)
    }

    fn subscribe(&self, account_id: Uuid, on_update: ConfigCallback) -> Result<()> {
        let path = self.path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Config watch error for account {account_id}: {e}");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            match SyncConfig::load(&path) {
                Ok(config) => on_update(config),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable config update {}: {e}", path.display())
                }
            }
        })?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        self.watchers.lock().push(watcher);
        Ok(())
    }
}
