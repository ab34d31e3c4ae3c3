// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the service reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub writer_token: String,
    pub digest_chat_id: i64,
    pub alert_chat_id: Option<i64>,
    pub state_path: PathBuf,
    pub digest_time: NaiveTime,
    pub utc_offset: FixedOffset,
    pub digest_on_start: bool,
    /// `None` disables the upper fetch bound.
    pub fetch_lag_days: Option<u32>,
    pub fetch_timeout: Duration,
    pub message_len: usize,
    pub tg_enabled: bool,
    pub tg_max_pages: u32,
    /// Absent disables the social-wall adapter.
    pub vk_token: Option<String>,
    pub vk_api_version: String,
    pub web_enabled: bool,
    pub metrics_addr: Option<SocketAddr>,
}

impl AppConfig {
    /// Read from process env. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |k: &str| var(k).ok_or_else(|| anyhow!("{k} is missing"));

        let writer_token = required("WRITER_TOKEN")?;
        let digest_chat_id = parse_chat_id("MY_CHAT_ID", &required("MY_CHAT_ID")?)?;
        let alert_chat_id = var("ALERT_CHAT_ID")
            .map(|v| parse_chat_id("ALERT_CHAT_ID", &v))
            .transpose()?;

        let digest_time = match var("DIGEST_TIME") {
            Some(v) => NaiveTime::parse_from_str(&v, "%H:%M")
                .with_context(|| format!("DIGEST_TIME must be HH:MM, got {v:?}"))?,
            None => NaiveTime::from_hms_opt(21, 42, 0)
                .ok_or_else(|| anyhow!("default digest time"))?,
        };
        let offset_raw = var("DIGEST_UTC_OFFSET").unwrap_or_else(|| "+03:00".into());
        let utc_offset = parse_utc_offset(&offset_raw).context("DIGEST_UTC_OFFSET")?;

        let fetch_lag_days = match var("FETCH_LAG_DAYS") {
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => Some(v.parse().with_context(|| format!("FETCH_LAG_DAYS: {v:?}"))?),
            None => Some(1),
        };
        let fetch_timeout_secs: u64 =
            parse_or("FETCH_TIMEOUT_SECS", var("FETCH_TIMEOUT_SECS"), 300)?;
        if fetch_timeout_secs == 0 {
            bail!("FETCH_TIMEOUT_SECS must be positive");
        }

        // A token that is present but blank is a misconfiguration, not "disabled".
        let vk_token = match get("VK_TOKEN") {
            Some(t) if t.trim().is_empty() => bail!("VK_TOKEN is set but empty"),
            Some(t) => Some(t.trim().to_string()),
            None => None,
        };

        let metrics_addr = var("METRICS_ADDR")
            .map(|v| v.parse::<SocketAddr>().with_context(|| format!("METRICS_ADDR: {v:?}")))
            .transpose()?;

        Ok(Self {
            writer_token,
            digest_chat_id,
            alert_chat_id,
            state_path: var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state/sources.json")),
            digest_time,
            utc_offset,
            digest_on_start: parse_flag("DIGEST_ON_START", var("DIGEST_ON_START"), false)?,
            fetch_lag_days,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            message_len: parse_or("MESSAGE_LEN", var("MESSAGE_LEN"), 200)?,
            tg_enabled: parse_flag("TG_ENABLED", var("TG_ENABLED"), true)?,
            tg_max_pages: parse_or("TG_MAX_PAGES", var("TG_MAX_PAGES"), 2)?,
            vk_token,
            vk_api_version: var("VK_API_VERSION").unwrap_or_else(|| "5.199".into()),
            web_enabled: parse_flag("WEB_ENABLED", var("WEB_ENABLED"), true)?,
            metrics_addr,
        })
    }
}

fn parse_chat_id(key: &str, v: &str) -> Result<i64> {
    v.parse()
        .with_context(|| format!("{key} must be a numeric chat id, got {v:?}"))
}

fn parse_or<T>(key: &str, v: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match v {
        Some(s) => s.parse().with_context(|| format!("{key}: {s:?}")),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, v: Option<String>, default: bool) -> Result<bool> {
    match v.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{key} must be a boolean, got {other:?}"),
    }
}

/// `+03:00`, `-0530`, `Z` / `UTC`.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("utc offset"));
    }
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => bail!("offset must start with + or -, got {s:?}"),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("offset must look like +HH:MM, got {s:?}");
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("offset out of range: {s:?}"))
}
