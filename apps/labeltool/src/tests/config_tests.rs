use super::{load_settings_from, Settings};

use std::{
    collections::HashMap,
    env, fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use shared::domain::ViewMode;

fn scratch_file(name: &str, contents: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("labeltool_config_test_{name}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("labeltool.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_yields_defaults() {
    let path = env::temp_dir().join("labeltool_config_test_absent/labeltool.toml");
    let settings = load_settings_from(&path, no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.default_group_colors.len(), 9);
    assert_eq!(settings.default_group_colors[0], "FF0000");
}

#[test]
fn file_values_override_defaults() {
    let path = scratch_file(
        "file",
        r#"
log_filter = "debug"
view_mode = "flat"
default_group_names = ["Frame", "Bubble"]
default_group_colors = ["111111", "nope", "222222"]
"#,
    );

    let settings = load_settings_from(&path, no_env);
    assert_eq!(settings.log_filter, "debug");
    assert_eq!(settings.view_mode, ViewMode::Flat);
    assert_eq!(settings.default_group_names, vec!["Frame", "Bubble"]);
    assert_eq!(settings.default_group_colors, vec!["111111", "222222"]);

    fs::remove_dir_all(path.parent().expect("dir")).expect("cleanup");
}

#[test]
fn environment_overrides_file() {
    let path = scratch_file("env", "log_filter = \"debug\"\nview_mode = \"flat\"\n");
    let vars: HashMap<&str, &str> = HashMap::from([
        ("LABELTOOL_LOG", "warn"),
        ("APP__VIEW_MODE", "group"),
        ("APP__DEFAULT_GROUP_NAMES", "One, Two,,Three"),
        ("APP__DEFAULT_GROUP_COLORS", "zzzzzz"),
    ]);

    let settings = load_settings_from(&path, |key| vars.get(key).map(|v| v.to_string()));
    assert_eq!(settings.log_filter, "warn");
    assert_eq!(settings.view_mode, ViewMode::Grouped);
    assert_eq!(settings.default_group_names, vec!["One", "Two", "Three"]);
    assert_eq!(settings.default_group_colors.len(), 9);

    fs::remove_dir_all(path.parent().expect("dir")).expect("cleanup");
}

#[test]
fn malformed_file_is_ignored() {
    let path = scratch_file("broken", "view_mode = [not toml");
    let settings = load_settings_from(&path, no_env);
    assert_eq!(settings, Settings::default());

    fs::remove_dir_all(path.parent().expect("dir")).expect("cleanup");
}

#[test]
fn unknown_view_mode_keeps_previous_value() {
    let path = scratch_file("mode", "view_mode = \"sideways\"\n");
    let settings = load_settings_from(&path, no_env);
    assert_eq!(settings.view_mode, ViewMode::Grouped);

    fs::remove_dir_all(path.parent().expect("dir")).expect("cleanup");
}
