#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

use ticketbridge::config::{ConfigCallback, ConfigService, Mapping, SyncConfig};
use ticketbridge::error::{BridgeError, Result};
use ticketbridge::remote::{HttpMethod, RemoteGateway};
use ticketbridge::ticket::{Comment, LocalTicket};

pub const BASE_URL: &str = "https://connect.example.com";
pub const API_PATH: &str = "/v4_6_release/apis/3.0/service/tickets";

pub fn tickets_url() -> String {
    format!("{BASE_URL}{API_PATH}")
}

pub fn ticket_url(id: &str) -> String {
    format!("{}/{id}", tickets_url())
}

pub fn notes_url(id: &str) -> String {
    format!("{}/notes", ticket_url(id))
}

/// Configuration with the mappings used throughout the tests
pub fn test_config() -> SyncConfig {
    let mut config = SyncConfig {
        priority: Mapping::new([
            ("Critical", "6"),
            ("Major", "91"),
            ("Minor", "8"),
            ("Informational", "12"),
        ]),
        status: Mapping::new([("Open", "New"), ("Close", "Closed")]),
        user: Mapping::new([("lucap@example.com", "LPisano")]),
        ..Default::default()
    };
    config.ticket_source.url = Some(BASE_URL.to_string());
    config.ticket_source.api_path = Some(API_PATH.to_string());
    config.ticket_source.login = Some("client-id".to_string());
    config.ticket_source.password = Some("secret".to_string());
    config
}

/// A ticket already linked to remote ticket `remote_id`
pub fn linked_ticket(remote_id: &str) -> LocalTicket {
    LocalTicket {
        local_id: Some("LT-1".to_string()),
        remote_id: Some(remote_id.to_string()),
        remote_link: Some(ticket_url(remote_id)),
        subject: Some("Projector offline".to_string()),
        description: Some("Room 4 projector shows no signal".to_string()),
        priority: Some("Major".to_string()),
        status: Some("Open".to_string()),
        requester: Some("lucap@example.com".to_string()),
        ..Default::default()
    }
}

/// Remote ticket document agreeing with [`linked_ticket`]
pub fn remote_document(remote_id: &str) -> Value {
    json!({
        "id": remote_id.parse::<u64>().unwrap_or(0),
        "summary": "Projector offline",
        "priority": {"id": 91, "name": "Major"},
        "status": {"name": "New"},
        "owner": null
    })
}

pub fn description_note(id: u64, text: &str, date: &str) -> Value {
    json!({
        "id": id,
        "text": text,
        "detailDescriptionFlag": true,
        "dateCreated": date,
        "createdBy": "LPisano"
    })
}

pub fn plain_note(id: u64, text: &str, date: &str) -> Value {
    json!({
        "id": id,
        "text": text,
        "detailDescriptionFlag": false,
        "dateCreated": date,
        "createdBy": "LPisano"
    })
}

pub fn notes(items: Vec<Value>) -> Value {
    json!({ "JSONArray": items })
}

pub fn comment(text: &str, remote_id: Option<&str>) -> Comment {
    let comment = Comment::new(text);
    match remote_id {
        Some(id) => comment.with_remote_id(id),
        None => comment,
    }
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Document(Value),
    NoDocument,
    Status(StatusCode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
    /// Login taken from the configuration the call was made with
    pub login: Option<String>,
}

pub type CallHook = Box<dyn Fn(HttpMethod, &str) + Send + Sync>;

/// Scripted gateway recording every call.
///
/// Responses are queued per method and URL. The last queued response keeps
/// being returned once the queue is down to one entry. Unscripted calls fail
/// with 404. An optional hook runs after each call is recorded.
#[derive(Default)]
pub struct MockGateway {
    responses: Mutex<HashMap<(HttpMethod, String), VecDeque<MockResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    hook: Option<CallHook>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: HttpMethod, url: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .lock()
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_document(self, method: HttpMethod, url: impl Into<String>, document: Value) -> Self {
        self.on(method, url, MockResponse::Document(document))
    }

    pub fn with_hook(mut self, hook: impl Fn(HttpMethod, &str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_with(&self, method: HttpMethod) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }
}

impl RemoteGateway for MockGateway {
    async fn call(
        &self,
        config: &SyncConfig,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        self.calls.lock().push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
            login: config.login(),
        });
        if let Some(hook) = &self.hook {
            hook(method, url);
        }

        let response = {
            let mut responses = self.responses.lock();
            match responses.get_mut(&(method, url.to_string())) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(MockResponse::Document(document)) => Ok(Some(document)),
            Some(MockResponse::NoDocument) => Ok(None),
            Some(MockResponse::Status(status)) => Err(BridgeError::api(
                format!("{method} {url} unsuccessful"),
                Some(status),
            )),
            None => Err(BridgeError::api(
                format!("{method} {url} unsuccessful"),
                Some(StatusCode::NOT_FOUND),
            )),
        }
    }
}

/// Configuration service holding one configuration for every account.
#[derive(Default)]
pub struct StaticConfigService {
    config: Mutex<SyncConfig>,
    subscribers: Mutex<Vec<(Uuid, ConfigCallback)>>,
}

impl StaticConfigService {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config: Mutex::new(config),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a new configuration to every subscriber.
    pub fn publish(&self, config: SyncConfig) {
        *self.config.lock() = config.clone();
        for (_, callback) in self.subscribers.lock().iter() {
            callback(config.clone());
        }
    }
}

impl ConfigService for StaticConfigService {
    fn retrieve_config(&self, _account_id: Uuid) -> Result<SyncConfig> {
        Ok(self.config.lock().clone())
    }

    fn subscribe(&self, account_id: Uuid, on_update: ConfigCallback) -> Result<()> {
        self.subscribers.lock().push((account_id, on_update));
        Ok(())
    }
}

/// Helper struct to run ticketbridge commands in an isolated temp directory
pub struct BridgeTest {
    pub temp_dir: TempDir,
    binary_path: String,
}

impl BridgeTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        BridgeTest {
            temp_dir,
            binary_path: env!("CARGO_BIN_EXE_ticketbridge").to_string(),
        }
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(&self.binary_path)
            .args(args)
            .current_dir(self.temp_dir.path())
            .env_remove("TICKETBRIDGE_CONFIG")
            .env_remove("TICKETBRIDGE_LOGIN")
            .env_remove("TICKETBRIDGE_PASSWORD")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute ticketbridge command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "Command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    pub fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "Expected command {:?} to fail, but it succeeded",
            args
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join("ticketbridge.yaml");
        fs::write(&path, content).expect("Failed to write config file");
        path
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn read_file(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.temp_dir.path().join(name)).ok()
    }
}
