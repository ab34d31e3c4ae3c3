// tests/catalog_import.rs
use dept_digest::ingest::config::{load_catalog_default, load_catalog_from};
use dept_digest::{JsonFileStore, SourceStore};
use std::{env, fs};

const TOML_CATALOG: &str = r#"
[[department]]
name = " Physics "
contact = "dean@phys.test"
website = "https://phys.test/rss"
vk = "-"
telegram = "https://t.me/phys_news"
last_date = "2026-02-01 18:30:00"

[[department]]
name = "Chemistry"
vk = "https://vk.com/public123"
last_date = "05.02.2026"

[[department]]
name = ""
website = "https://nobody.test"
"#;

#[test]
fn toml_and_json_catalogs_expand_links() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("departments.toml");
    fs::write(&p_toml, TOML_CATALOG).unwrap();
    let deps = load_catalog_from(&p_toml).unwrap();
    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0].name, "Physics");
    assert_eq!(deps[0].links().len(), 2);
    assert!(deps[0].vk.is_none());
    assert_eq!(deps[1].links().len(), 1);
    assert_eq!(deps[1].contact, "");
    assert_eq!(deps[1].last_date, chrono::NaiveDate::from_ymd_opt(2026, 2, 5));

    let p_json = dir.path().join("departments.json");
    fs::write(
        &p_json,
        r#"[{"name":"History","website":"-","vk":"","telegram":"-"}]"#,
    )
    .unwrap();
    let deps = load_catalog_from(&p_json).unwrap();
    assert_eq!(deps.len(), 1);
    assert!(deps[0].links().is_empty());
}

#[test]
fn bad_date_names_the_department() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.toml");
    fs::write(
        &p,
        "[[department]]\n\
         name = \"Biology\"\n\
         website = \"https://bio.test\"\n\
         last_date = \"yesterday\"\n",
    )
    .unwrap();
    let err = load_catalog_from(&p).unwrap_err();
    assert!(format!("{err:#}").contains("Biology"));
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // keep the repo's own config/ out of the picture
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("DIGEST_CATALOG_PATH");

    // nothing anywhere
    assert!(load_catalog_default().unwrap().is_empty());

    // ./config/departments.toml
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("departments.toml"), TOML_CATALOG).unwrap();
    assert_eq!(load_catalog_default().unwrap().len(), 2);

    // env wins
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"[{"name":"Geology","website":"https://geo.test/rss"}]"#).unwrap();
    env::set_var("DIGEST_CATALOG_PATH", p_env.display().to_string());
    let deps = load_catalog_default().unwrap();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].name, "Geology");

    // env pointing nowhere is an error, not a silent fallback
    env::set_var("DIGEST_CATALOG_PATH", tmp.path().join("missing.toml").display().to_string());
    assert!(load_catalog_default().is_err());
    env::remove_var("DIGEST_CATALOG_PATH");

    env::set_current_dir(&old).unwrap();
}

#[tokio::test]
async fn reimport_keeps_ids_and_applies_manual_dates() {
    let dir = tempfile::tempdir().unwrap();
    let cat = dir.path().join("departments.toml");
    fs::write(&cat, TOML_CATALOG).unwrap();
    let store = JsonFileStore::new(dir.path().join("sources.json"));

    let first = store
        .import_catalog(&load_catalog_from(&cat).unwrap())
        .await
        .unwrap();
    assert_eq!((first.added, first.updated, first.removed), (3, 0, 0));
    let before = store.list_sources().await.unwrap();

    // Physics drops its channel and resets its date by hand
    fs::write(
        &cat,
        r#"
[[department]]
name = "Physics"
contact = "office@phys.test"
website = "https://phys.test/rss"
last_date = "2026-01-15"
"#,
    )
    .unwrap();
    let second = store
        .import_catalog(&load_catalog_from(&cat).unwrap())
        .await
        .unwrap();
    assert_eq!((second.added, second.updated, second.removed), (0, 1, 1));

    let after = store.list_sources().await.unwrap();
    assert_eq!(after.len(), 2);
    let web_before = before.iter().find(|s| s.name == "Physics" && s.platform == "web").unwrap();
    let web_after = after.iter().find(|s| s.name == "Physics" && s.platform == "web").unwrap();
    assert_eq!(web_after.id, web_before.id);
    assert_eq!(web_after.contact, "office@phys.test");
    assert_eq!(web_after.last_seen_date, chrono::NaiveDate::from_ymd_opt(2026, 1, 15));
    // Chemistry was not listed, so it is left alone
    assert!(after.iter().any(|s| s.name == "Chemistry"));
}
