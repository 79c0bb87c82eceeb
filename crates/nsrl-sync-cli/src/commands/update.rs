use std::sync::Arc;

use anyhow::{Context, Result};
use nsrl_sync::{ConfigurationError, RunReport, SourceStatus, Updater, UpdaterOptions};
use nsrl_sync_http::HttpFetcher;

use crate::commands;
use crate::config::AppConfig;

/// Run every enabled source once, persist the new state and print what
/// happened. Per-source failures are printed, not returned.
pub async fn run(config: &AppConfig) -> Result<RunReport> {
    let sources = config.descriptors()?;
    nsrl_sync::validate_sources(&sources)?;

    let state_store = commands::open_state(&config.store)?;
    let prior = state_store
        .load()
        .map_err(|e| ConfigurationError::State(e.to_string()))?;
    let hashes = commands::open_hash_store(&config.store).await?;

    let options = UpdaterOptions {
        working_dir: commands::working_dir(&config.updater)?,
        set_key: config.store.set_key.clone(),
        fingerprint_dedup: config.updater.fingerprint_dedup,
    };
    let fetcher = Arc::new(HttpFetcher::with_timeout(config.updater.timeout()));

    println!("Updating {} source(s)...", sources.len());
    let report = Updater::new(fetcher, hashes, options)
        .run(&sources, prior)
        .await?;

    state_store
        .save(&report.state)
        .context("failed to save update state")?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match &outcome.status {
            SourceStatus::Failed(_) => eprintln!("warning: [{}] {}", outcome.name, outcome.status),
            status => println!("[{}] {status}", outcome.name),
        }
    }

    if report.all_failed() {
        eprintln!("warning: every source failed; state left unchanged");
    } else if report.failed() > 0 {
        eprintln!(
            "Updated {} of {} sources ({} failed)",
            report.outcomes.len() - report.failed(),
            report.outcomes.len(),
            report.failed()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use nsrl_sync::HashSetStore;
    use nsrl_sync::test_support::fixtures::{hash_list, zip_with_entries};
    use nsrl_sync_store::SqliteHashStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{SourceEntry, StoreSection, UpdaterSection};

    const KNOWN: &str = "0000000F8527DCCAB6642252BBCFA1B8072D33EE";

    fn config_for(server: &MockServer, root: &Path) -> AppConfig {
        let sources: Vec<SourceEntry> = toml::from_str::<AppConfig>(&format!(
            r#"
[[sources]]
name = "minimal"
uri = "{}/RDS/current/rds_modernm.zip"
pattern = "rds_modernm/NSRLFile.txt"

[[sources]]
name = "broken"
uri = "{}/RDS/current/missing.txt"
"#,
            server.uri(),
            server.uri()
        ))
        .unwrap()
        .sources;

        AppConfig {
            updater: UpdaterSection {
                working_dir: Some(root.join("work")),
                ..UpdaterSection::default()
            },
            store: StoreSection {
                path: Some(root.join("db").join("nsrl.db")),
                ..StoreSection::default()
            },
            sources,
        }
    }

    async fn mount_rds(server: &MockServer) {
        let list = hash_list(&[KNOWN, "00000079FD7AAC9B2F9C988C50750E1F50B27EB5"]);
        let archive = zip_with_entries(&[("rds_modernm/NSRLFile.txt", list.as_bytes())]);

        Mock::given(method("HEAD"))
            .and(path("/RDS/current/rds_modernm.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Sat, 01 Jun 2024 00:00:00 GMT"),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RDS/current/rds_modernm.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Last-Modified", "Sat, 01 Jun 2024 00:00:00 GMT")
                    .set_body_bytes(archive),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn update_imports_then_skips_unchanged_remote() {
        let server = MockServer::start().await;
        mount_rds(&server).await;
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());

        let first = run(&config).await.unwrap();
        assert!(matches!(first.outcome("minimal"), Some(SourceStatus::Imported { records: 2 })));
        assert!(matches!(first.outcome("broken"), Some(SourceStatus::Failed(_))));

        let second = run(&config).await.unwrap();
        assert!(matches!(second.outcome("minimal"), Some(SourceStatus::NotModified)));

        let hashes = SqliteHashStore::open(&dir.path().join("db").join("nsrl.db")).unwrap();
        assert_eq!(hashes.count("hashes").unwrap(), 2);
        assert!(hashes.is_member("hashes", KNOWN).await.unwrap());

        let state = commands::open_state(&config.store).unwrap().load().unwrap();
        assert!(state.previous_update("minimal").is_some());
        assert!(state.get("broken").is_none());
    }

    #[tokio::test]
    async fn no_enabled_sources_is_a_configuration_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, dir.path());
        for source in &mut config.sources {
            source.enabled = false;
        }

        let err = run(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::NoSources)
        ));
    }
}
