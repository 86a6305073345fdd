//! Hot-reload integration tests: state round-trip, rollback, debounce.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use serde_json::json;
use tokio::sync::mpsc;

use cadre_kernel::plugin::{
    HostOptions, PluginError, PluginHost, PluginStatus, ReloadEvent, ReloadManager, ReloadOptions,
};
use cadre_test_utils::{ScriptedLoader, ScriptedModule, manifest_body, write_manifest};

fn host_at(dir: &Path, loader: Arc<ScriptedLoader>) -> Arc<PluginHost> {
    let options = HostOptions::new(Version::new(1, 0, 0), vec![dir.to_path_buf()]);
    Arc::new(PluginHost::new(options, loader).unwrap())
}

fn stateful_module(count: u64) -> Arc<ScriptedModule> {
    let module = ScriptedModule::new()
        .with_command("tally", "Show the current tally")
        .with_command("tally.reset", "Reset the tally");
    module.set_state_value("count", json!(count));
    Arc::new(module)
}

#[tokio::test]
async fn state_round_trips_across_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    let v1 = stateful_module(5);
    let v2 = stateful_module(0);
    loader.push_module("tally", Arc::clone(&v1));
    loader.push_module("tally", Arc::clone(&v2));

    let host = host_at(dir.path(), loader);
    host.load_all().await;

    let before = host.registry().get("tally").unwrap();
    let old_handle = before.handle.clone().unwrap();

    host.reload_plugin("tally").await.unwrap();

    // The replacement observed the captured payload.
    let restored = v2.restored().unwrap();
    assert_eq!(restored.get("count"), Some(&json!(5)));
    assert_eq!(v2.state().get("count"), Some(&json!(5)));

    // Same command ids, new handle, still registered.
    let after = host.registry().get("tally").unwrap();
    assert_eq!(after.status, PluginStatus::Registered);
    assert_eq!(after.command_ids, before.command_ids);
    let new_handle = after.handle.clone().unwrap();
    assert!(!Arc::ptr_eq(&old_handle, &new_handle));

    // The swap notification reached the new module exactly once.
    assert_eq!(v2.reload_notifications(), 1);
    assert_eq!(v1.reload_notifications(), 0);
}

#[tokio::test]
async fn reload_swaps_bindings_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "shift", &manifest_body("shift", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module(
        "shift",
        Arc::new(ScriptedModule::new().with_command("old.cmd", "v1 command")),
    );
    loader.push_module(
        "shift",
        Arc::new(ScriptedModule::new().with_command("new.cmd", "v2 command")),
    );

    let host = host_at(dir.path(), loader);
    host.load_all().await;
    assert!(host.commands().lookup("old.cmd").is_some());

    host.reload_plugin("shift").await.unwrap();

    let bindings = host.commands().snapshot();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].spec.id, "new.cmd");
    assert!(host.commands().lookup("old.cmd").is_none());
}

#[tokio::test]
async fn failed_module_load_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    let v1 = stateful_module(7);
    loader.push_module("tally", Arc::clone(&v1));
    loader.push_failure("tally", "compile exploded");

    let host = host_at(dir.path(), loader);
    host.load_all().await;
    let before = host.registry().get("tally").unwrap();
    let old_handle = before.handle.clone().unwrap();

    let err = host.reload_plugin("tally").await.unwrap_err();
    assert!(matches!(err, PluginError::Reload { .. }));
    assert!(err.to_string().contains("compile exploded"));

    // The running plugin is unaffected: same handle, same bindings, still
    // registered rather than failed.
    let after = host.registry().get("tally").unwrap();
    assert_eq!(after.status, PluginStatus::Registered);
    assert!(Arc::ptr_eq(&old_handle, &after.handle.clone().unwrap()));
    assert!(host.commands().lookup("tally").is_some());
}

#[tokio::test]
async fn failed_registration_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(1));
    loader.push_module(
        "tally",
        Arc::new(ScriptedModule::new().failing_register("new version is broken")),
    );

    let host = host_at(dir.path(), loader);
    host.load_all().await;

    let err = host.reload_plugin("tally").await.unwrap_err();
    assert!(err.to_string().contains("new version is broken"));
    assert_eq!(
        host.registry().get("tally").unwrap().status,
        PluginStatus::Registered
    );
    assert!(host.commands().lookup("tally").is_some());
}

#[tokio::test]
async fn failed_restore_rolls_back_before_the_swap() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(3));
    let v2 = Arc::new(
        ScriptedModule::new()
            .with_command("tally.v2", "would-be replacement")
            .failing_restore(),
    );
    loader.push_module("tally", Arc::clone(&v2));

    let host = host_at(dir.path(), loader);
    host.load_all().await;

    let err = host.reload_plugin("tally").await.unwrap_err();
    assert!(err.to_string().contains("restore_state"));

    // The replacement's commands never became visible.
    assert!(host.commands().lookup("tally.v2").is_none());
    assert!(host.commands().lookup("tally").is_some());
    assert_eq!(v2.reload_notifications(), 0);
}

#[tokio::test]
async fn manifest_version_gate_applies_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(0));

    let host = host_at(dir.path(), loader);
    host.load_all().await;

    // The edited manifest now demands a newer host; the reload must abort.
    write_manifest(
        dir.path(),
        "tally",
        &manifest_body("tally", "min_host_version = \"9.0.0\"\n"),
    );

    let err = host.reload_plugin("tally").await.unwrap_err();
    assert!(matches!(err, PluginError::Reload { .. }));
    let entry = host.registry().get("tally").unwrap();
    assert_eq!(entry.status, PluginStatus::Registered);
    assert!(entry.manifest.min_host_version.is_none());
}

#[tokio::test]
async fn only_registered_plugins_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "quiet",
        &manifest_body("quiet", "enabled_by_default = false\n"),
    );

    let loader = Arc::new(ScriptedLoader::new());
    let host = host_at(dir.path(), loader);
    host.load_all().await;

    assert_eq!(
        host.registry().get("quiet").unwrap().status,
        PluginStatus::PolicyDisabled
    );
    assert!(host.reload_plugin("quiet").await.is_err());
    assert!(host.reload_plugin("missing").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn manager_coalesces_change_bursts_into_one_reload() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(0));
    loader.push_module("tally", stateful_module(0));

    let host = host_at(dir.path(), Arc::clone(&loader));
    host.load_all().await;
    assert_eq!(loader.load_count(), 1);

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ReloadManager::spawn(
        Arc::clone(&host),
        rx,
        ReloadOptions {
            debounce: Duration::from_millis(200),
        },
    );
    let mut events = manager.subscribe();

    // A burst of writes to the same manifest collapses into one reload.
    for _ in 0..3 {
        tx.send(source.clone()).unwrap();
    }

    let event = events.recv().await.unwrap();
    assert!(matches!(event, ReloadEvent::Completed { plugin } if plugin == "tally"));
    assert_eq!(loader.load_count(), 2);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manager_ignores_paths_it_does_not_own() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(0));
    loader.push_module("tally", stateful_module(0));

    let host = host_at(dir.path(), Arc::clone(&loader));
    host.load_all().await;

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ReloadManager::spawn(Arc::clone(&host), rx, ReloadOptions::default());
    let mut events = manager.subscribe();

    tx.send(dir.path().join("unrelated.txt")).unwrap();
    tx.send(source).unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(event, ReloadEvent::Completed { .. }));
    // Only the owned manifest triggered a reload.
    assert_eq!(loader.load_count(), 2);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn manager_reports_rollbacks_as_events() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_manifest(dir.path(), "tally", &manifest_body("tally", ""));

    let loader = Arc::new(ScriptedLoader::new());
    loader.push_module("tally", stateful_module(0));
    loader.push_failure("tally", "scripted reload failure");

    let host = host_at(dir.path(), Arc::clone(&loader));
    host.load_all().await;

    let (tx, rx) = mpsc::unbounded_channel();
    let manager = ReloadManager::spawn(Arc::clone(&host), rx, ReloadOptions::default());
    let mut events = manager.subscribe();

    tx.send(source).unwrap();

    let event = events.recv().await.unwrap();
    let ReloadEvent::RolledBack { plugin, error } = event else {
        panic!("expected rollback event");
    };
    assert_eq!(plugin, "tally");
    assert!(error.contains("scripted reload failure"));
    assert_eq!(
        host.registry().get("tally").unwrap().status,
        PluginStatus::Registered
    );

    manager.shutdown().await;
}
