//! Integration tests for nodeserve

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn nodeserve() -> Command {
        let mut cmd = cargo_bin_cmd!("nodeserve");
        cmd.env_remove("NODESERVE_CONFIG")
            .env_remove("NODESERVE_ACCESS_TOKEN")
            .env_remove("RUST_LOG");
        cmd
    }

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn help_displays() {
        nodeserve()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build and serve a static web app"));
    }

    #[test]
    fn version_displays() {
        nodeserve()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("nodeserve"));
    }

    #[test]
    fn serve_help_lists_config_flags() {
        nodeserve()
            .args(["serve", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--build-directory"))
            .stdout(predicate::str::contains("--access-token"));
    }

    #[test]
    fn validate_json_config() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            "config.json",
            r#"{"path": "git+https://github.com/acme/widgets#release-1", "port": 9000}"#,
        );

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"))
            .stdout(predicate::str::contains("acme/widgets#release-1"))
            .stdout(predicate::str::contains(
                "https://api.github.com/repos/acme/widgets/zipball/release-1",
            ))
            .stdout(predicate::str::contains("v22.19.0"))
            .stdout(predicate::str::contains("9000"));
    }

    #[test]
    fn validate_toml_config_with_flag_override() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            "nodeserve.toml",
            "path = \"git+https://github.com/acme/widgets\"\nnode_version = \"20.11.1\"\n",
        );

        nodeserve()
            .arg("validate")
            .arg("-c")
            .arg(&config)
            .args(["--build-directory", "public"])
            .assert()
            .success()
            .stdout(predicate::str::contains("acme/widgets#main"))
            .stdout(predicate::str::contains("v20.11.1"))
            .stdout(predicate::str::contains("public"));
    }

    #[test]
    fn validate_requires_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains("path is required"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn validate_rejects_non_git_path() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .args(["--path", "https://github.com/acme/widgets"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "only git paths are currently supported",
            ));
    }

    #[test]
    fn validate_rejects_other_hosts() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .args(["--path", "git+https://gitlab.com/acme/widgets"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "URL does not match the expected format",
            ));
    }

    #[test]
    fn validate_rejects_nested_instance_name() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .args(["--path", "git+https://github.com/acme/widgets"])
            .args(["--name", "../escape"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid instance name"));
    }

    #[test]
    fn validate_rejects_build_directory_outside_project() {
        let temp = TempDir::new().unwrap();
        let config = write_config(
            temp.path(),
            "config.json",
            r#"{"path": "git+https://github.com/acme/widgets", "build_directory": "/etc"}"#,
        );

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .assert()
            .failure()
            .code(2)
            .stderr(predicate::str::contains(
                "build_directory must be a relative path inside the project",
            ));
    }

    #[test]
    fn build_rejects_escaping_build_directory_before_downloading() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");
        let cache = temp.path().join("cache");

        nodeserve()
            .arg("build")
            .arg("--config")
            .arg(&config)
            .arg("--cache-root")
            .arg(&cache)
            .args(["--path", "git+https://github.com/acme/widgets"])
            .args(["--build-directory", "../outside"])
            .assert()
            .failure()
            .code(2);

        assert!(!cache.exists());
    }

    #[test]
    fn missing_explicit_config_fails() {
        let temp = TempDir::new().unwrap();

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(temp.path().join("absent.json"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn invalid_config_file_fails() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{ not json");

        nodeserve()
            .arg("validate")
            .arg("--config")
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn build_rejects_bad_path_before_downloading() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");
        let cache = temp.path().join("cache");

        nodeserve()
            .arg("build")
            .arg("--config")
            .arg(&config)
            .arg("--cache-root")
            .arg(&cache)
            .args(["--path", "svn+https://example.com/acme/widgets"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "only git paths are currently supported",
            ));

        assert!(!cache.exists());
    }

    #[test]
    fn build_rejects_malformed_reference_before_downloading() {
        let temp = TempDir::new().unwrap();
        let config = write_config(temp.path(), "config.json", "{}");
        let cache = temp.path().join("cache");

        nodeserve()
            .arg("build")
            .arg("--config")
            .arg(&config)
            .arg("--cache-root")
            .arg(&cache)
            .args(["--path", "git+https://github.com/acme"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "URL does not match the expected format",
            ));

        assert!(!cache.exists());
    }
}
