//! CLI command tests
//!
//! Commands run end to end against an append-only file store; the file is
//! reopened afterwards to check what was persisted.

use clap::Parser;
use linkvault::cli::{Cli, Commands};
use linkvault::config::StaticConfig;
use linkvault::interfaces::cli::run_cli_command;
use linkvault::runtime::lifetime::effective_config;
use linkvault::storage::{FileStorage, LinkStore};
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> (StaticConfig, std::path::PathBuf) {
    let path = dir.path().join("links.jsonl");
    let config = effective_config(
        &StaticConfig::default(),
        None,
        Some(path.to_string_lossy().into_owned()),
    );
    (config, path)
}

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["linkvault"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command
}

#[cfg(test)]
mod link_command_tests {
    use super::*;

    #[tokio::test]
    async fn test_add_list_delete_round() {
        let dir = TempDir::new().unwrap();
        let (config, path) = file_config(&dir);

        run_cli_command(parse(&["add", "https://a.example", "--owner", "h1"]), &config)
            .await
            .unwrap();
        run_cli_command(parse(&["add", "https://a.example", "--owner", "h2"]), &config)
            .await
            .unwrap();
        run_cli_command(parse(&["list", "--owner", "h1"]), &config)
            .await
            .unwrap();

        let id = {
            let store = FileStorage::open(&path).unwrap();
            let link = store
                .find_by_base_url("https://a.example")
                .await
                .unwrap()
                .unwrap();
            assert!(link.is_owned_by("h1") && link.is_owned_by("h2"));
            link.id
        };

        run_cli_command(parse(&["get", id.as_str()]), &config).await.unwrap();

        // shutdown 会在退出前把删除队列落盘
        run_cli_command(parse(&["delete", "--owner", "h2", id.as_str()]), &config)
            .await
            .unwrap();

        let store = FileStorage::open(&path).unwrap();
        assert!(store.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_get_unknown_id_fails() {
        let dir = TempDir::new().unwrap();
        let (config, _path) = file_config(&dir);

        let err = run_cli_command(parse(&["get", "nope"]), &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<linkvault::errors::LinkvaultError>(),
            Some(linkvault::errors::LinkvaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_import_from_json_file() {
        let dir = TempDir::new().unwrap();
        let (config, path) = file_config(&dir);
        let import = dir.path().join("import.json");
        std::fs::write(
            &import,
            r#"[{"correlation_id":"c1","original_url":"https://a.example"},
                {"correlation_id":"c2","original_url":"https://b.example"}]"#,
        )
        .unwrap();

        let import_path = import.to_string_lossy().into_owned();
        run_cli_command(
            parse(&["import", import_path.as_str(), "--owner", "h1"]),
            &config,
        )
        .await
        .unwrap();

        let store = FileStorage::open(&path).unwrap();
        assert_eq!(store.list_by_owner("h1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ping_and_offline_commands() {
        let dir = TempDir::new().unwrap();
        let (config, _path) = file_config(&dir);

        run_cli_command(parse(&["ping"]), &config).await.unwrap();
        run_cli_command(parse(&["token"]), &config).await.unwrap();

        let sample = dir.path().join("sample.toml");
        let sample_path = sample.to_string_lossy().into_owned();
        run_cli_command(
            parse(&["config", "generate", sample_path.as_str(), "--force"]),
            &config,
        )
        .await
        .unwrap();
        assert!(std::fs::read_to_string(&sample).unwrap().contains("[storage]"));
    }
}
