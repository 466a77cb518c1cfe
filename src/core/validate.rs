// Structural checks for status and fetch payloads.
// Internal checks return `PayloadIssue`; the public validators only say yes/no.
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

pub const REPO_STATUS_KEYS: [&str; 7] = [
    "Path",
    "Name",
    "Account",
    "IsClean",
    "Ahead",
    "Behind",
    "HasUpstream",
];

/// Which contract a stream's payloads are checked against. Chosen by the
/// endpoint, never by the event name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadKind {
    RepoStatus,
    FetchResult,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PayloadIssue {
    InvalidJson(String),
    NotAnObject,
    MissingKey(&'static str),
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
}

impl fmt::Display for PayloadIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadIssue::InvalidJson(detail) => write!(f, "invalid json: {detail}"),
            PayloadIssue::NotAnObject => write!(f, "payload is not a json object"),
            PayloadIssue::MissingKey(key) => write!(f, "missing key {key}"),
            PayloadIssue::WrongType { key, expected } => {
                write!(f, "key {key} is not a {expected}")
            }
        }
    }
}

/// Repository record as emitted by the status stream.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RepoStatus {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "FolderName")]
    pub folder_name: String,
    #[serde(rename = "IsOrg")]
    pub is_org: bool,
    #[serde(rename = "RemoteURL")]
    pub remote_url: String,
    #[serde(rename = "Branch")]
    pub branch: String,
    #[serde(rename = "IsClean")]
    pub is_clean: bool,
    #[serde(rename = "Uncommitted")]
    pub uncommitted: i64,
    #[serde(rename = "Ahead")]
    pub ahead: i64,
    #[serde(rename = "Behind")]
    pub behind: i64,
    #[serde(rename = "LastCommit")]
    pub last_commit: String,
    #[serde(rename = "LastFetch")]
    pub last_fetch: Option<String>,
    #[serde(rename = "HasStash")]
    pub has_stash: bool,
    #[serde(rename = "HasUpstream")]
    pub has_upstream: bool,
    #[serde(rename = "scan_time")]
    pub scan_time: Option<String>,
}

/// Per-repository fetch outcome as emitted by the fetch stream.
#[derive(Clone, Debug, Deserialize)]
pub struct FetchResult {
    #[serde(rename = "RepoName")]
    pub repo_name: String,
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
    #[serde(rename = "Duration")]
    pub duration: String,
}

impl PayloadKind {
    pub fn label(self) -> &'static str {
        match self {
            PayloadKind::RepoStatus => "status",
            PayloadKind::FetchResult => "fetch",
        }
    }

    pub fn inspect(self, data: &str) -> Result<Map<String, Value>, PayloadIssue> {
        match self {
            PayloadKind::RepoStatus => inspect_repo(data),
            PayloadKind::FetchResult => inspect_fetch(data),
        }
    }

    pub fn validate(self, data: &str) -> bool {
        self.inspect(data).is_ok()
    }

    /// One-line description of an already-accepted payload, for logs and reports.
    /// Returns `None` when the loose presence check passed but the typed decode does not.
    pub fn summarize(self, object: &Map<String, Value>) -> Option<String> {
        let value = Value::Object(object.clone());
        match self {
            PayloadKind::RepoStatus => {
                let repo: RepoStatus = serde_json::from_value(value).ok()?;
                let state = if repo.is_clean { "clean" } else { "dirty" };
                Some(format!(
                    "{}/{} {state} ahead={} behind={} upstream={}",
                    repo.account, repo.name, repo.ahead, repo.behind, repo.has_upstream
                ))
            }
            PayloadKind::FetchResult => {
                let fetch: FetchResult = serde_json::from_value(value).ok()?;
                match (fetch.success, fetch.error) {
                    (true, _) => Some(format!("{} fetched in {}", fetch.repo_name, fetch.duration)),
                    (false, Some(error)) => Some(format!(
                        "{} failed after {}: {error}",
                        fetch.repo_name, fetch.duration
                    )),
                    (false, None) => Some(format!(
                        "{} failed after {}",
                        fetch.repo_name, fetch.duration
                    )),
                }
            }
        }
    }
}

pub fn validate_repo(data: &str) -> bool {
    inspect_repo(data).is_ok()
}

pub fn validate_fetch(data: &str) -> bool {
    inspect_fetch(data).is_ok()
}

/// Presence-only: value types of the required keys are not checked.
pub fn inspect_repo(data: &str) -> Result<Map<String, Value>, PayloadIssue> {
    let object = decode_object(data)?;
    if let Some(missing) = REPO_STATUS_KEYS
        .iter()
        .find(|key| !object.contains_key(**key))
    {
        return Err(PayloadIssue::MissingKey(*missing));
    }
    Ok(object)
}

/// `RepoName` and `Duration` must be strings and `Success` a boolean. `Error` is not checked.
pub fn inspect_fetch(data: &str) -> Result<Map<String, Value>, PayloadIssue> {
    let object = decode_object(data)?;
    require_type(&object, "RepoName", "string", Value::is_string)?;
    require_type(&object, "Success", "boolean", Value::is_boolean)?;
    require_type(&object, "Duration", "string", Value::is_string)?;
    Ok(object)
}

fn decode_object(data: &str) -> Result<Map<String, Value>, PayloadIssue> {
    let value: Value =
        serde_json::from_str(data).map_err(|err| PayloadIssue::InvalidJson(err.to_string()))?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(PayloadIssue::NotAnObject),
    }
}

fn require_type(
    object: &Map<String, Value>,
    key: &'static str,
    expected: &'static str,
    check: fn(&Value) -> bool,
) -> Result<(), PayloadIssue> {
    match object.get(key) {
        None => Err(PayloadIssue::MissingKey(key)),
        Some(value) if check(value) => Ok(()),
        Some(_) => Err(PayloadIssue::WrongType { key, expected }),
    }
}
