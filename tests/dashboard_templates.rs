use serde_json::json;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use trade_dashboard::dashboard::config::{Layout, SettingsOverrides, Slot};
use trade_dashboard::dashboard::templates::{
    template_record, ResolvedFrom, TemplateStore, DASHBOARD_NAMESPACE,
};
use trade_dashboard::dashboard::{DashboardError, WidgetId};
use trade_dashboard::store::{DashboardStore, JsonFileStore};

fn file_store(dir: &std::path::Path) -> TemplateStore {
    TemplateStore::new(Arc::new(JsonFileStore::new(dir)))
}

/// Directory whose store holds the empty `templates` record written on first run.
async fn first_run_dir() -> TempDir {
    let dir = tempdir().unwrap();
    JsonFileStore::new(dir.path())
        .put(DASHBOARD_NAMESPACE, template_record(&[]))
        .await
        .unwrap();
    dir
}

#[tokio::test]
async fn first_launch_creates_default_template() {
    let dir = first_run_dir().await;
    let templates = file_store(dir.path());
    let resolved = templates.resolve().await.unwrap();
    assert_eq!(resolved.source, ResolvedFrom::CreatedDefault);
    assert_eq!(resolved.layout, Layout::default());
    assert_eq!(resolved.active.as_deref(), Some("Default"));

    let reopened = file_store(dir.path());
    let again = reopened.resolve().await.unwrap();
    assert_eq!(again.source, ResolvedFrom::ActiveTemplate);
    assert_eq!(reopened.templates().await.unwrap().len(), 1);
}

#[tokio::test]
async fn dangling_active_pointer_falls_back_to_config() {
    let dir = tempdir().unwrap();
    let records = json!([
        {
            "id": "templates",
            "data": [{
                "name": "Swing",
                "layout": {
                    "metrics": ["net-pnl", "placeholder", "placeholder", "placeholder"],
                    "tables": ["recent-trades", "placeholder"],
                    "charts": [["balance", "placeholder"]]
                },
                "settings": {}
            }]
        },
        { "id": "activeTemplate", "data": { "name": "Gone" } },
        {
            "id": "config",
            "layout": {
                "metrics": ["total-trades", "retired-widget"],
                "tables": [],
                "charts": []
            },
            "settings": { "retired-widget": { "color": "#fff" } }
        }
    ]);
    std::fs::write(
        dir.path().join(format!("{DASHBOARD_NAMESPACE}.json")),
        serde_json::to_string(&records).unwrap(),
    )
    .unwrap();

    let resolved = file_store(dir.path()).resolve().await.unwrap();
    assert_eq!(resolved.source, ResolvedFrom::Config);
    assert_eq!(resolved.active, None);
    assert_eq!(
        resolved.layout.metrics,
        vec![Slot::from(WidgetId::TotalTrades), Slot::Empty]
    );
    assert!(resolved.settings.is_empty());
}

#[tokio::test]
async fn template_names_are_validated() {
    let dir = first_run_dir().await;
    let templates = file_store(dir.path());
    templates.resolve().await.unwrap();

    let empty = SettingsOverrides::new();
    assert!(matches!(
        templates
            .create_template("  ", &Layout::empty(), &empty)
            .await
            .unwrap_err(),
        DashboardError::InvalidName
    ));
    assert!(matches!(
        templates
            .create_template(" Default ", &Layout::empty(), &empty)
            .await
            .unwrap_err(),
        DashboardError::DuplicateName(name) if name == "Default"
    ));
    let created = templates
        .create_template(" Scalping ", &Layout::empty(), &empty)
        .await
        .unwrap();
    assert_eq!(created.name, "Scalping");
}

#[tokio::test]
async fn active_template_cannot_be_deleted() {
    let dir = first_run_dir().await;
    let templates = file_store(dir.path());
    templates.resolve().await.unwrap();
    templates
        .create_template("Scalping", &Layout::empty(), &SettingsOverrides::new())
        .await
        .unwrap();

    assert!(matches!(
        templates.delete_template("Default").await.unwrap_err(),
        DashboardError::ActiveTemplateProtected(_)
    ));
    assert!(matches!(
        templates.delete_template("Nope").await.unwrap_err(),
        DashboardError::NotFound(_)
    ));
    templates.delete_template("Scalping").await.unwrap();
    let names: Vec<String> = templates
        .templates()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Default".to_string()]);
}

#[tokio::test]
async fn rename_moves_the_active_pointer() {
    let dir = first_run_dir().await;
    let templates = file_store(dir.path());
    templates.resolve().await.unwrap();
    templates.rename_template("Default", "Main").await.unwrap();
    assert_eq!(templates.active().await.unwrap().as_deref(), Some("Main"));
    assert!(matches!(
        templates.template("Default").await.unwrap_err(),
        DashboardError::NotFound(_)
    ));
    let resolved = file_store(dir.path()).resolve().await.unwrap();
    assert_eq!(resolved.source, ResolvedFrom::ActiveTemplate);
    assert_eq!(resolved.active.as_deref(), Some("Main"));
}

#[tokio::test]
async fn save_writes_config_and_active_template() {
    let dir = first_run_dir().await;
    let templates = file_store(dir.path());
    templates.resolve().await.unwrap();

    let mut layout = Layout::default();
    layout.tables = vec![Slot::from(WidgetId::StrategyPerformance), Slot::Empty];
    let mut settings = SettingsOverrides::new();
    settings.insert(WidgetId::Balance, json!({ "color": "#22c55e" }));
    templates.save(&layout, &settings).await.unwrap();

    let saved = templates.template("Default").await.unwrap();
    assert_eq!(saved.layout, layout);
    assert_eq!(saved.settings, settings);

    let raw = std::fs::read_to_string(dir.path().join("dashboard.json")).unwrap();
    let records: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let config = records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == "config")
        .unwrap();
    assert_eq!(config["layout"]["tables"], json!(["strategy-performance", "placeholder"]));
    assert_eq!(config["settings"]["balance"]["color"], "#22c55e");
}

#[tokio::test]
async fn store_without_templates_record_keeps_its_config() {
    let dir = tempdir().unwrap();
    let templates = file_store(dir.path());
    assert_eq!(
        templates.resolve().await.unwrap().source,
        ResolvedFrom::BuiltIn
    );

    let mut layout = Layout::default();
    layout.metrics[0] = Slot::from(WidgetId::NetPnl);
    let mut settings = SettingsOverrides::new();
    settings.insert(WidgetId::Drawdown, json!({ "style": "line" }));
    templates.save(&layout, &settings).await.unwrap();

    let resolved = file_store(dir.path()).resolve().await.unwrap();
    assert_eq!(resolved.source, ResolvedFrom::Config);
    assert_eq!(resolved.layout, layout);
    assert_eq!(resolved.settings, settings);
    assert!(templates.templates().await.unwrap().is_empty());
}
