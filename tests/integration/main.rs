//! Integration tests for Elyx

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's config file
    fn elyx(config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("elyx");
        cmd.env("ELYX_CONFIG", config);
        cmd
    }

    fn config_in(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("config.toml")
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Optimistic cache synchronization"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("elyx"));
    }

    #[test]
    fn translate_from_dictionary() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["translate", "--lang", "hi", "--offline", "Hello"])
            .assert()
            .success()
            .stdout(predicate::str::contains("नमस्ते"));
    }

    #[test]
    fn translate_unknown_text_falls_back() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["translate", "--lang", "fr", "--offline", "Gift wrap"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Gift wrap\tGift wrap"));
    }

    #[test]
    fn translate_default_language_is_identity() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["translate", "--offline", "Hello", "Share"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Hello\tHello").and(predicate::str::contains("Share\tShare")));
    }

    #[test]
    fn translate_requires_text() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir)).arg("translate").assert().failure();
    }

    #[test]
    fn dictionary_lists_language() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["dictionary", "--lang", "es"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Hola"));
    }

    #[test]
    fn dictionary_merges_user_file() {
        let dir = TempDir::new().unwrap();
        let phrases = dir.path().join("phrases.toml");
        std::fs::write(&phrases, "[phrases.\"Gift wrap\"]\nes = \"Envoltorio\"\n").unwrap();
        let config = config_in(&dir);
        std::fs::write(
            &config,
            format!("[i18n]\ndictionary_path = {:?}\n", phrases.display().to_string()),
        )
        .unwrap();

        elyx(&config)
            .args(["dictionary", "--lang", "es"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Envoltorio").and(predicate::str::contains("Hola")));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[i18n]"));
    }

    #[test]
    fn config_set_persists() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        elyx(&config)
            .args(["config", "set", "i18n.language", "hi"])
            .assert()
            .success();

        elyx(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("language = \"hi\""));

        // Active language now comes from the saved config
        elyx(&config)
            .args(["translate", "--offline", "Hello"])
            .assert()
            .success()
            .stdout(predicate::str::contains("नमस्ते"));
    }

    #[test]
    fn config_set_unknown_key() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(&config, "[store\nbase_url = ").unwrap();
        elyx(&config)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("config.toml"));
    }

    #[test]
    fn store_requires_base_url() {
        let dir = TempDir::new().unwrap();
        elyx(&config_in(&dir))
            .args(["store", "get", "projects", "p1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No remote store configured"));
    }
}
