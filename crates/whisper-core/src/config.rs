use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    errors::Error,
    extract::{ExtractorConfig, MatcherKind},
    recency::DEFAULT_CAPACITY,
    Result,
};

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_users: Vec<i64>,
    pub admin_chat_id: Option<i64>,

    // Extraction thresholds
    pub extractor: ExtractorConfig,

    // Recency
    pub recency_capacity: usize,
    pub quick_pick_limit: usize,
    pub recency_file: PathBuf,

    // Delivery registry
    pub whisper_ttl: Duration,
    pub max_pending: usize,

    // Request handling
    pub query_cooldown: Duration,
    pub lookup_timeout: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let admin_users = parse_csv_i64(env_str("TELEGRAM_ADMIN_USERS"));
        let admin_chat_id = env_str("ADMIN_CHAT_ID").and_then(|s| s.trim().parse::<i64>().ok());

        let defaults = ExtractorConfig::default();
        let order = match env_str("MATCHER_ORDER").and_then(non_empty) {
            Some(raw) => parse_matcher_order(&raw)?,
            None => defaults.order.clone(),
        };
        let extractor = ExtractorConfig {
            min_handle_length: env_usize("MIN_HANDLE_LENGTH").unwrap_or(defaults.min_handle_length),
            max_handle_length: env_usize("MAX_HANDLE_LENGTH").unwrap_or(defaults.max_handle_length),
            min_numeric_length: env_usize("MIN_NUMERIC_LENGTH")
                .unwrap_or(defaults.min_numeric_length),
            order,
        };
        extractor.validate()?;

        let recency_capacity = env_usize("RECENCY_CAPACITY").unwrap_or(DEFAULT_CAPACITY);
        if recency_capacity == 0 {
            return Err(Error::Config("RECENCY_CAPACITY must be at least 1".to_string()));
        }
        let quick_pick_limit = env_usize("QUICK_PICK_LIMIT").unwrap_or(DEFAULT_CAPACITY);
        let recency_file =
            PathBuf::from(env_str("RECENCY_FILE").unwrap_or("data/recency.json".to_string()));

        let whisper_ttl = Duration::from_secs(env_u64("WHISPER_TTL_SECS").unwrap_or(7 * 24 * 3600));
        let max_pending = env_usize("MAX_PENDING").unwrap_or(100_000);

        let query_cooldown = Duration::from_millis(env_u64("QUERY_COOLDOWN_MS").unwrap_or(1000));
        let lookup_timeout = Duration::from_millis(env_u64("LOOKUP_TIMEOUT_MS").unwrap_or(3000));

        let audit_log_path =
            PathBuf::from(env_str("AUDIT_LOG_PATH").unwrap_or("data/audit.log".to_string()));
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            admin_users,
            admin_chat_id,
            extractor,
            recency_capacity,
            quick_pick_limit,
            recency_file,
            whisper_ttl,
            max_pending,
            query_cooldown,
            lookup_timeout,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    let quoted = val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')));
    if quoted {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_matcher_order(raw: &str) -> Result<Vec<MatcherKind>> {
    let mut out = Vec::new();
    for name in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let kind = MatcherKind::parse(name)
            .ok_or_else(|| Error::Config(format!("unknown matcher in MATCHER_ORDER: {name}")))?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    if out.is_empty() {
        return Err(Error::Config("MATCHER_ORDER is empty".to_string()));
    }
    Ok(out)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
