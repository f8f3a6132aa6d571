use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use scout_core::{Entitlement, ListingSite, ScriptId, SiteGroup};
use scout_engine::{static_extractor, LicenseClient, LicenseError, LocalStore, StoreGate};
use scout_logging::{scout_info, scout_warn};

use super::cli::{LicenseAction, SwitchState, TrialAction};
use super::config::AppConfig;

pub fn open_store(config: &AppConfig) -> Arc<LocalStore> {
    Arc::new(LocalStore::open(config.store_dir.clone()))
}

pub fn open_gate(config: &AppConfig, store: Arc<LocalStore>) -> Result<StoreGate> {
    let client = LicenseClient::new(&config.api_settings()).context("license api")?;
    Ok(StoreGate::new(store, Some(client)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SiteRow {
    id: &'static str,
    name: &'static str,
    groups: String,
    url: String,
    script: Option<ScriptId>,
}

fn site_rows(today: NaiveDate) -> Vec<SiteRow> {
    ListingSite::ALL
        .iter()
        .map(|site| {
            let url = site.launch_url(today);
            let groups = site
                .groups()
                .iter()
                .map(|group| match group {
                    SiteGroup::Daily => "daily",
                    SiteGroup::Weekly => "weekly",
                })
                .collect::<Vec<_>>()
                .join(",");
            SiteRow {
                id: site.id(),
                name: site.name(),
                groups,
                script: ScriptId::for_url(&url),
                url,
            }
        })
        .collect()
}

pub fn sites() -> Result<()> {
    for row in site_rows(Local::now().date_naive()) {
        let script = row.script.map(|s| s.as_str()).unwrap_or("-");
        let groups = if row.groups.is_empty() { "-" } else { &row.groups };
        println!(
            "{:<14} {:<14} {:<8} {:<18} {}",
            row.id, row.name, groups, script, row.url
        );
    }
    Ok(())
}

fn extract_links(script: ScriptId, html: &str) -> Result<Vec<String>> {
    let extractor = static_extractor(script)?;
    Ok(extractor.extract(html))
}

pub fn extract(script: ScriptId, html_path: &Path, url: Option<&str>) -> Result<()> {
    if let Some(url) = url {
        match ScriptId::for_url(url) {
            Some(bound) if bound == script => {}
            Some(bound) => scout_warn!("{url} is handled by {bound}, not {script}"),
            None => scout_warn!("{url} matches no script"),
        }
    }
    let bytes = fs::read(html_path).with_context(|| format!("reading {:?}", html_path))?;
    let html = String::from_utf8_lossy(&bytes);
    let links = extract_links(script, &html)?;
    scout_info!("{script} extracted {} links from {:?}", links.len(), html_path);
    for link in links {
        println!("{link}");
    }
    Ok(())
}

pub fn toggle(config: &AppConfig, state: SwitchState) -> Result<()> {
    let store = open_store(config);
    store.set_content_script_enabled(state.enabled())?;
    println!(
        "Scraper {}.",
        if state.enabled() { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub async fn license(config: &AppConfig, action: LicenseAction) -> Result<()> {
    let gate = open_gate(config, open_store(config))?;
    match action {
        LicenseAction::Activate { key } => {
            let activation = gate.activate(&key).await?;
            println!(
                "License activated ({}).",
                activation.license_type.as_str()
            );
        }
        LicenseAction::Status => match gate.store().premium() {
            None => println!("No license activated."),
            Some(premium) => {
                let entitlement = gate.entitlement().await;
                println!(
                    "License {} ({}): {}",
                    mask_key(&premium.license_key),
                    premium.license_type.as_str(),
                    if entitlement.licensed { "valid" } else { "not valid" }
                );
            }
        },
        LicenseAction::Deactivate => match gate.deactivate().await {
            Ok(()) => println!("License deactivated."),
            Err(LicenseError::NotActivated) => println!("No license activated."),
            Err(err) => {
                println!("License removed from this device.");
                return Err(err).context("the license server did not confirm the release");
            }
        },
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{visible}")
}

pub async fn trial(config: &AppConfig, action: TrialAction) -> Result<()> {
    let gate = open_gate(config, open_store(config))?;
    match action {
        TrialAction::Start => match gate.start_trial(config.trial_days, Utc::now()).await {
            Ok(record) => println!(
                "Trial started: {} days, until {}.",
                record.window.length_days,
                record.window.ends_at().format("%Y-%m-%d %H:%M UTC")
            ),
            Err(LicenseError::TrialAlreadyUsed) => {
                bail!("the free trial has already been used on this device")
            }
            Err(err) => return Err(err.into()),
        },
        TrialAction::Status => {
            let entitlement = gate.entitlement().await;
            println!("{}", trial_line(&entitlement));
        }
    }
    Ok(())
}

fn trial_line(entitlement: &Entitlement) -> String {
    let trial = entitlement.trial;
    if trial.is_active {
        format!("Trial mode: {} days remaining.", trial.days_left)
    } else if trial.has_started {
        "Trial ended.".to_string()
    } else {
        "Trial not started.".to_string()
    }
}

pub async fn status(config: &AppConfig) -> Result<()> {
    let store = open_store(config);
    let gate = open_gate(config, Arc::clone(&store))?;
    let entitlement = gate.entitlement().await;

    println!(
        "Scraper: {}",
        if store.content_script_enabled() { "on" } else { "off" }
    );
    match store.user() {
        Some(user) => println!("Signed in: {}", user.display_name().unwrap_or(&user.id)),
        None => println!("Signed in: no"),
    }
    match store.premium() {
        Some(premium) => println!(
            "License: {} ({})",
            premium.license_type.as_str(),
            if entitlement.licensed { "valid" } else { "not valid" }
        ),
        None => println!("License: none"),
    }
    println!("{}", trial_line(&entitlement));
    println!(
        "Entitled: {}",
        if entitlement.is_entitled() { "yes" } else { "no" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scout_core::TrialStatus;

    #[test]
    fn every_listing_page_today_has_a_script_except_nxgntools() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let rows = site_rows(today);
        assert_eq!(rows.len(), ListingSite::ALL.len());

        let unbound: Vec<&str> = rows
            .iter()
            .filter(|row| row.script.is_none())
            .map(|row| row.id)
            .collect();
        assert_eq!(unbound, vec!["nxgntools"]);

        let hunt = rows.iter().find(|row| row.id == "productHunt").unwrap();
        assert_eq!(hunt.script, Some(ScriptId::ProductHunt));
        assert_eq!(
            hunt.url,
            "https://www.producthunt.com/leaderboard/daily/2026/10/18/all"
        );
        assert_eq!(hunt.groups, "daily");
    }

    #[test]
    fn extract_runs_the_static_rule_for_the_script() {
        let html = r#"<a href="https://one.dev/?ref=uneed.best">one</a>
                      <a href="https://www.uneed.best/tool/x">internal</a>"#;
        assert_eq!(
            extract_links(ScriptId::Uneed, html).unwrap(),
            vec!["https://one.dev/?ref=uneed.best"]
        );
    }

    #[test]
    fn extract_refuses_dynamic_scripts() {
        assert!(extract_links(ScriptId::ProductHunt, "<div></div>").is_err());
    }

    #[test]
    fn keys_are_masked_to_their_tail() {
        assert_eq!(mask_key("ABCD-EFGH-1234"), "****1234");
        assert_eq!(mask_key("ab"), "****ab");
    }

    #[test]
    fn trial_line_reports_each_state() {
        let mut entitlement = Entitlement::default();
        assert_eq!(trial_line(&entitlement), "Trial not started.");

        entitlement.trial = TrialStatus {
            has_started: true,
            is_active: true,
            days_left: 2,
        };
        assert_eq!(trial_line(&entitlement), "Trial mode: 2 days remaining.");

        entitlement.trial.is_active = false;
        assert_eq!(trial_line(&entitlement), "Trial ended.");
    }
}
