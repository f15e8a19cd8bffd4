use clap::Parser;
use formloom::cli::Cli;
use formloom::config::{Settings, StorageBackend};
use formloom::engine::ValidationMode;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("formloom.toml");

    let formloom_toml = r#"
[form]
mode = "onBlur"
revalidate_mode = "onSubmit"

[logging]
level = "debug"
"#;
    fs::write(&config_path, formloom_toml)?;

    let settings = Settings::from_path(&config_path)?;
    assert_eq!(settings.form.mode, ValidationMode::OnBlur);
    assert_eq!(settings.form.revalidate_mode, ValidationMode::OnSubmit);
    assert_eq!(settings.log_level(), tracing::Level::DEBUG);

    Ok(())
}

#[test]
fn test_missing_file_uses_defaults() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = Settings::from_path(temp_dir.path().join("absent.toml"))?;

    assert_eq!(settings.form.mode, ValidationMode::OnChange);
    assert_eq!(settings.form.revalidate_mode, ValidationMode::OnChange);
    Ok(())
}

#[test]
fn test_invalid_settings_are_rejected() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("formloom.toml");
    fs::write(&config_path, "[logging]\nlevel = \"chatty\"\n")?;

    let err = Settings::from_path(&config_path).unwrap_err();
    assert!(err.to_string().contains("logging.level"));
    Ok(())
}

#[test]
fn test_cli_overrides_file() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("formloom.toml");
    fs::write(&config_path, "[form]\nmode = \"onBlur\"\n\n[logging]\nlevel = \"warn\"\n")?;

    let cli = Cli::parse_from([
        "formloom",
        "--config",
        config_path.to_str().unwrap(),
        "--mode",
        "onSubmit",
        "--log-level",
        "trace",
        "check",
        "*.json",
    ]);
    let settings = Settings::new_with_cli(&cli)?;

    assert_eq!(settings.form.mode, ValidationMode::OnSubmit);
    assert_eq!(settings.log_level(), tracing::Level::TRACE);
    Ok(())
}

#[test]
fn test_environment_overrides_storage() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage_dir = temp_dir.path().join("forms");

    std::env::set_var("FORMLOOM_STORAGE__BACKEND", "file");
    std::env::set_var("FORMLOOM_STORAGE__PATH", &storage_dir);
    let settings = Settings::from_path(temp_dir.path().join("formloom.toml"));
    std::env::remove_var("FORMLOOM_STORAGE__BACKEND");
    std::env::remove_var("FORMLOOM_STORAGE__PATH");

    let settings = settings?;
    assert_eq!(settings.storage.backend, StorageBackend::File);
    assert_eq!(settings.storage.path, storage_dir);
    Ok(())
}
