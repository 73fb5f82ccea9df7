//! Connection configuration checks through the manager


use anyhow::Result;
use common::*;
use serde_yaml::Value;
use unifs::config::{Config, ConfigError, ConfigMap};
use unifs::connector::Driver;
use unifs::{FileManager, FsError};

/// Settings naming `driver` with every required key set to a placeholder
fn complete_settings(driver: Driver) -> ConfigMap {
    let mut settings = ConfigMap::new();
    settings.insert("driver".to_string(), Value::from(driver.name()));
    for key in driver.required_keys() {
        settings.insert(key.to_string(), Value::from(format!("placeholder-{}", key)));
    }
    settings
}

fn manager_with(settings: ConfigMap) -> Result<FileManager> {
    let mut config = Config::from_str("default: target")?;
    config.connections.insert("target".to_string(), settings);
    Ok(FileManager::new(config))
}

#[tokio::test]
async fn test_each_missing_required_key_is_named() -> Result<()> {
    init_logging();
    for driver in Driver::ALL {
        for key in driver.required_keys() {
            let mut settings = complete_settings(driver);
            settings.shift_remove(*key);

            let err = manager_with(settings)?
                .default_connection()
                .await
                .expect_err("connection without a required key");
            match err {
                FsError::Config(ref config_err) => {
                    assert_eq!(config_err.key(), Some(*key), "{} / {}", driver, key);
                    assert!(err.to_string().contains(key), "{}", err);
                }
                other => panic!("{} without {}: unexpected {:?}", driver, key, other),
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_null_value_counts_as_missing() -> Result<()> {
    let mut settings = complete_settings(Driver::Dropbox);
    settings.insert("token".to_string(), Value::Null);
    let err = manager_with(settings)?.default_connection().await.unwrap_err();
    assert!(matches!(
        err,
        FsError::Config(ConfigError::MissingAuthentication { ref key, .. }) if key == "token"
    ));
    Ok(())
}

#[tokio::test]
async fn test_half_a_credential_pair() -> Result<()> {
    let mut settings = complete_settings(Driver::AwsS3);
    settings.insert("key".to_string(), Value::from("AKIA"));
    let err = manager_with(settings)?.default_connection().await.unwrap_err();
    assert!(matches!(
        err,
        FsError::Config(ConfigError::MissingAuthentication { ref key, .. }) if key == "secret"
    ));
    Ok(())
}

#[tokio::test]
async fn test_unknown_driver_is_unsupported() -> Result<()> {
    let mut settings = ConfigMap::new();
    settings.insert("driver".to_string(), Value::from("floppy"));
    let err = manager_with(settings)?.default_connection().await.unwrap_err();
    assert!(matches!(err, FsError::UnsupportedDriver(ref name) if name == "floppy"));
    Ok(())
}

#[tokio::test]
async fn test_environment_references_resolve() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::env::set_var("UNIFS_E2E_WORKSPACE", dir.path());
    let yaml = "
default: disk
connections:
  disk:
    driver: local
    path: ${UNIFS_E2E_WORKSPACE}
stream_protocol: ${UNIFS_E2E_UNSET_PROTOCOL:-vault}
";
    let manager = FileManager::new(Config::from_str(yaml)?);
    assert_eq!(manager.stream_protocol(), "vault");

    manager.default_connection().await?.put("env.txt", "resolved").await?;
    assert_file_content(&dir.path().join("env.txt"), b"resolved");
    Ok(())
}

#[test]
fn test_unset_environment_reference_fails() {
    let err = Config::from_str("connections:\n  disk:\n    path: ${UNIFS_E2E_NEVER_SET}\n")
        .unwrap_err();
    assert!(err.to_string().contains("UNIFS_E2E_NEVER_SET"));
}

#[tokio::test]
async fn test_aliases_resolve_through_the_manager() -> Result<()> {
    let ctx = TestContext::with_config(|builder, paths| {
        builder
            .local("disk", &paths.workspace)
            .alias("media", "disk")
            .alias("uploads", "media")
            .default_connection("uploads")
    })?;
    assert_eq!(ctx.manager().resolve_alias("uploads")?, "disk");
    assert!(ctx.manager().has_driver("media"));

    ctx.fs().await?.put("through-alias.txt", "x").await?;
    assert_file_content(&ctx.workspace().join("through-alias.txt"), b"x");
    Ok(())
}

#[test]
fn test_alias_cycle_rejected() {
    let yaml = "aliases:\n  a: b\n  b: a\n";
    assert!(matches!(
        Config::from_str(yaml),
        Err(ConfigError::ValidationError(_))
    ));
}
