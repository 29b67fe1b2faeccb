//! Integration tests for BrewBot

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn brewbot() -> Command {
        let mut cmd = cargo_bin_cmd!("brewbot");
        cmd.env_remove("BREWBOT_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    fn with_config(dir: &Path, content: &str) -> Command {
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        let mut cmd = brewbot();
        cmd.arg("--config").arg(path);
        cmd
    }

    #[test]
    fn help_displays() {
        brewbot()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("BrewTroller firmware build server"))
            .stdout(predicate::str::contains("serve"));
    }

    #[test]
    fn version_displays() {
        brewbot()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("brewbot"));
    }

    #[test]
    fn serve_help_lists_flags() {
        brewbot()
            .args(["serve", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--debug"))
            .stdout(predicate::str::contains("--poll"))
            .stdout(predicate::str::contains("--git"));
    }

    #[test]
    fn config_path_honors_flag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");

        brewbot()
            .arg("--config")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();

        brewbot()
            .arg("--config")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("0.0.0.0:8080"))
            .stdout(predicate::str::contains("github.com/brewtroller/brewtroller"));
    }

    #[test]
    fn config_show_reads_file() {
        let temp = TempDir::new().unwrap();

        with_config(temp.path(), "[repository]\npoll_period_secs = 42\n")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("poll_period_secs = 42"));
    }

    #[test]
    fn config_init_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("brewbot").join("config.toml");

        brewbot()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[repository]"));

        std::fs::write(&path, "[server]\ndebug = true\n").unwrap();
        brewbot()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stderr(predicate::str::contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[server]\ndebug = true\n");
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();

        with_config(temp.path(), "[server]\nbind = 42\n")
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn invalid_poll_rejected() {
        brewbot()
            .args(["serve", "--poll", "soon"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid duration"));
    }

    #[test]
    fn serve_fails_when_mirror_cannot_be_cloned() {
        let temp = TempDir::new().unwrap();
        let config = format!(
            "[repository]\nmirror_dir = {:?}\nbootstrap_attempts = 1\nbootstrap_backoff_secs = 0\ngit_timeout_secs = 30\n",
            temp.path().join("mirror").display().to_string()
        );
        let upstream = temp.path().join("no-such-repo");

        with_config(temp.path(), &config)
            .args(["serve", "--bind", "127.0.0.1:0", "--git"])
            .arg(&upstream)
            .timeout(std::time::Duration::from_secs(60))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }
}
