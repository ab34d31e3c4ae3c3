// src/ingest/config.rs
//! Department catalog: the table the source store is seeded from.
use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Platform;

const ENV_PATH: &str = "DIGEST_CATALOG_PATH";

/// One catalog row, cleaned. A department owns up to one link per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    pub name: String,
    pub contact: String,
    pub website: Option<String>,
    pub vk: Option<String>,
    pub telegram: Option<String>,
    /// Manual watermark correction; overrides the stored one on import.
    pub last_date: Option<NaiveDate>,
}

impl Department {
    /// Links in fixed order: web, social-wall, channel-messaging.
    pub fn links(&self) -> Vec<(Platform, &str)> {
        [
            (Platform::Web, self.website.as_deref()),
            (Platform::SocialWall, self.vk.as_deref()),
            (Platform::ChannelMessaging, self.telegram.as_deref()),
        ]
        .into_iter()
        .filter_map(|(p, l)| l.map(|l| (p, l)))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawDepartment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    vk: Option<String>,
    #[serde(default)]
    telegram: Option<String>,
    #[serde(default)]
    last_date: Option<String>,
}

/// Load a catalog from an explicit path. Supports TOML or JSON formats.
pub fn load_catalog_from(path: &Path) -> Result<Vec<Department>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading catalog from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_catalog(&content, ext.as_str())
}

/// Load the catalog using env var + fallbacks:
/// 1) $DIGEST_CATALOG_PATH
/// 2) config/departments.toml
/// 3) config/departments.json
pub fn load_catalog_default() -> Result<Vec<Department>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_catalog_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/departments.toml");
    if toml_p.exists() {
        return load_catalog_from(&toml_p);
    }
    let json_p = PathBuf::from("config/departments.json");
    if json_p.exists() {
        return load_catalog_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_catalog(s: &str, hint_ext: &str) -> Result<Vec<Department>> {
    let raw = if hint_ext == "json" || s.trim_start().starts_with('[') {
        parse_json(s)?
    } else {
        match parse_toml(s) {
            Ok(v) => v,
            Err(toml_err) => parse_json(s).map_err(|_| toml_err)?,
        }
    };
    clean_rows(raw)
}

fn parse_toml(s: &str) -> Result<Vec<RawDepartment>> {
    #[derive(Deserialize)]
    struct TomlCatalog {
        #[serde(default)]
        department: Vec<RawDepartment>,
    }
    let v: TomlCatalog = toml::from_str(s).context("parsing TOML catalog")?;
    Ok(v.department)
}

fn parse_json(s: &str) -> Result<Vec<RawDepartment>> {
    serde_json::from_str(s).context("parsing JSON catalog")
}

fn clean_rows(rows: Vec<RawDepartment>) -> Result<Vec<Department>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let name = clean_field(row.name);
        if name.is_empty() {
            tracing::debug!("catalog row without a name skipped");
            continue;
        }
        let last_date = match row.last_date.as_deref().map(str::trim) {
            None | Some("") | Some("-") => None,
            Some(s) => Some(parse_date(s).with_context(|| format!("last_date of {name}"))?),
        };
        out.push(Department {
            contact: clean_field(row.contact),
            website: clean_link(row.website),
            vk: clean_link(row.vk),
            telegram: clean_link(row.telegram),
            last_date,
            name,
        });
    }
    Ok(out)
}

fn clean_field(v: Option<String>) -> String {
    v.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Empty cells and `-` mean "no link".
fn clean_link(v: Option<String>) -> Option<String> {
    let s = v?.trim().to_string();
    if s.is_empty() || s == "-" {
        None
    } else {
        Some(s)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and `DD.MM.YYYY`.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(anyhow!("unrecognized date {s:?}"))
}
