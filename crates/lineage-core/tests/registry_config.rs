//! Registry declarations driven by a configuration file.

use lineage_core::native::thread;
use lineage_core::{AttributeError, AttributeRegistry, PolicyKind, Visibility};
use lineage_test_utils::config::{TestConfigBuilder, TestConfigFile};
use lineage_test_utils::fixtures::unique_owner;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_declare_from_config_file() {
    let owner = unique_owner("Settings");
    let config = TestConfigBuilder::new()
        .root_name("app")
        .attribute(&owner, "locale", |a| {
            a.inherit = true;
            a.default = Some("en".into());
            a.description = "UI language".into();
        })
        .attribute(&owner, "token", |a| a.visibility = "private".into())
        .build();
    let file = TestConfigFile::from_config(&config).await;
    let loaded = file.load().await;
    assert_eq!(loaded.hierarchy.root_name, "app");

    let registry = AttributeRegistry::native();
    let handles = registry.declare_from_config(&loaded.attributes).unwrap();
    let table = registry.owner(&owner).unwrap();

    let info = table.describe();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].policy, PolicyKind::InheritDefault);
    assert_eq!(info[0].description.as_deref(), Some("UI language"));
    assert_eq!(info[1].visibility, Visibility::Private);

    assert_eq!(table.get_as::<String>("locale").unwrap(), Some("en".into()));
    table.set_as("locale", String::from("de")).unwrap();
    assert!(matches!(
        table.get("token"),
        Err(AttributeError::Private { .. })
    ));

    let locale = handles[0].clone();
    let on_child = thread::spawn(move || locale.get_as::<String>().unwrap())
        .join()
        .unwrap();
    assert_eq!(on_child, Some("de".into()));
}

#[tokio::test]
async fn test_config_with_bad_visibility_fails_to_load() {
    let file = TestConfigFile::with_toml(
        r#"
[[attributes]]
owner = "Settings"
name = "locale"
visibility = "hidden"
"#,
    )
    .await;
    let err = lineage_config::AppConfig::load(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("visibility"));
}
