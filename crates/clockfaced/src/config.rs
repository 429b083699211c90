use clockface_core::ScreeningPolicy;
use clockface_remote::RemoteConfig;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Which message bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    System,
    Session,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Base URL of the recognition gateway.
    pub service_url: String,
    /// Bearer token for the gateway, if it requires one.
    pub service_token: Option<String>,
    /// Face collection searched and enrolled into.
    pub collection: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Minimum similarity percent for an identification match.
    pub match_threshold: f32,
    /// Minimum confidence percent for a face cover to reject a scan.
    pub face_cover_min_confidence: f32,
    /// Minimum sharpness for the scanned face.
    pub min_sharpness: f32,
    pub screen_face_cover: bool,
    pub screen_quality: bool,
    /// Timeout in seconds for each call to the recognition gateway.
    pub request_timeout_secs: u64,
    pub bus: BusKind,
}

impl Config {
    /// Load configuration from `CLOCKFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("clockface");

        let db_path = lookup("CLOCKFACE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("attendance.db"));

        let bus = match lookup("CLOCKFACE_BUS").as_deref() {
            Some("session") => BusKind::Session,
            _ => BusKind::System,
        };

        let defaults = ScreeningPolicy::default();

        Self {
            service_url: lookup("CLOCKFACE_SERVICE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8088".to_string()),
            service_token: lookup("CLOCKFACE_SERVICE_TOKEN").filter(|t| !t.is_empty()),
            collection: lookup("CLOCKFACE_COLLECTION").unwrap_or_else(|| "EmployeeFaces".to_string()),
            db_path,
            match_threshold: percent(&lookup, "CLOCKFACE_MATCH_THRESHOLD", defaults.match_threshold),
            face_cover_min_confidence: percent(
                &lookup,
                "CLOCKFACE_FACE_COVER_MIN_CONFIDENCE",
                defaults.face_cover_min_confidence,
            ),
            min_sharpness: percent(&lookup, "CLOCKFACE_MIN_SHARPNESS", defaults.min_sharpness),
            screen_face_cover: flag(&lookup, "CLOCKFACE_SCREEN_FACE_COVER"),
            screen_quality: flag(&lookup, "CLOCKFACE_SCREEN_QUALITY"),
            request_timeout_secs: timeout_secs(&lookup, "CLOCKFACE_REQUEST_TIMEOUT_SECS"),
            bus,
        }
    }

    pub fn screening_policy(&self) -> ScreeningPolicy {
        ScreeningPolicy {
            face_cover_min_confidence: self.face_cover_min_confidence,
            min_sharpness: self.min_sharpness,
            match_threshold: self.match_threshold,
            check_face_cover: self.screen_face_cover,
            check_quality: self.screen_quality,
        }
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.service_url.clone(),
            collection: self.collection.clone(),
            token: self.service_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// A score on the service's 0-100 scale. NaN would disable the comparison
/// it feeds, so anything non-finite or out of range falls back to `default`.
fn percent(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    let value = parsed(lookup, key, default);
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        return value;
    }
    tracing::warn!(key, value = %value, default, "out of range 0-100, using default");
    default
}

/// Request timeout in whole seconds; zero would fail every call.
fn timeout_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> u64 {
    match parsed(lookup, key, DEFAULT_TIMEOUT_SECS) {
        0 => {
            tracing::warn!(key, default = DEFAULT_TIMEOUT_SECS, "timeout must be positive, using default");
            DEFAULT_TIMEOUT_SECS
        }
        secs => secs,
    }
}

/// Switches default on; only `0` turns them off.
fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key).map(|v| v != "0").unwrap_or(true)
}
