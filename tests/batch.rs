mod common;

use common::{FakeRegistry, Harness, version};
use modtrack::app::EngineOptions;
use modtrack::domain::{FingerprintScheme, InstalledMod, SyncError, TargetPlatform};
use std::sync::atomic::Ordering;

fn three_mods() -> FakeRegistry {
    FakeRegistry::new("modrinth")
        .with_mod(
            "a",
            "Alpha",
            vec![version("a", "a1", 1, &["fabric"], &["1.20.1"])],
        )
        .with_mod(
            "b",
            "Beta",
            vec![version("b", "b1", 1, &["fabric", "quilt"], &["1.20.1"])],
        )
        .with_mod(
            "forge-only",
            "Forge Only",
            vec![version("forge-only", "f1", 1, &["forge"], &["1.20.1"])],
        )
}

fn ids(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn add_all_reports_failures_next_to_successes() {
    let h = Harness::new(three_mods()).await;
    let mut seen = Vec::new();

    let report = h
        .engine
        .add_all(ids(&["a", "forge-only", "missing", "b"]), |outcome| {
            seen.push(outcome.item.clone())
        })
        .await;

    assert_eq!(report.len(), 4);
    assert_eq!(seen.len(), 4);
    let mut added: Vec<_> = report.successes().map(|(item, _)| item).collect();
    added.sort();
    assert_eq!(added, ["a", "b"]);

    let mut failed: Vec<_> = report
        .failures()
        .map(|(item, e)| (item, e.subject().map(str::to_string)))
        .collect();
    failed.sort();
    assert_eq!(
        failed,
        [
            ("forge-only", Some("forge-only".to_string())),
            ("missing", Some("missing".to_string())),
        ]
    );
    assert!(h.store().is_mod_installed("a"));
    assert!(h.store().is_mod_installed("b"));
    assert_eq!(h.store().snapshot().mods.len(), 2);
}

#[tokio::test]
async fn duplicate_ids_in_one_batch_install_once() {
    let h = Harness::new(three_mods()).await;

    let report = h.engine.add_all(ids(&["a", "a"]), |_| {}).await;

    assert_eq!(report.successes().count(), 1);
    assert!(matches!(
        report.failures().next(),
        Some((_, SyncError::AlreadyInstalled { .. }))
    ));
    assert_eq!(h.store().snapshot().mods.len(), 1);
}

#[tokio::test]
async fn bounded_batch_installs_everything() {
    let h = Harness::build(
        three_mods(),
        TargetPlatform::new("1.20.1", "fabric"),
        EngineOptions::default(),
        1,
    )
    .await;

    let report = h.engine.add_all(ids(&["a", "b"]), |_| {}).await;
    assert!(!report.has_failures());
    assert_eq!(h.store().snapshot().mods.len(), 2);
}

#[tokio::test]
async fn remove_all_keeps_going_past_unknown_ids() {
    let h = Harness::new(three_mods()).await;
    h.engine.add_all(ids(&["a", "b"]), |_| {}).await;

    let report = h.engine.remove_all(ids(&["a", "zzz", "b"]), |_| {}).await;

    assert_eq!(report.successes().count(), 2);
    let failed: Vec<_> = report.failures().map(|(item, _)| item).collect();
    assert_eq!(failed, ["zzz"]);
    assert!(h.store().snapshot().mods.is_empty());
}

#[tokio::test]
async fn remove_all_collapses_repeated_ids() {
    let h = Harness::new(three_mods()).await;
    h.engine.add("a").await.unwrap();

    let report = h.engine.remove_all(ids(&["a", "a"]), |_| {}).await;

    assert_eq!(report.len(), 1);
    assert!(!report.has_failures());
    assert!(!h.store().is_mod_installed("a"));
}

#[tokio::test]
async fn upgrade_all_collapses_repeated_ids() {
    let h = Harness::new(three_mods()).await;
    h.engine.add("a").await.unwrap();
    h.registry
        .publish("a", version("a", "a2", 2, &["fabric"], &["1.20.1"]));
    let before = h.registry.downloads.load(Ordering::SeqCst);

    let report = h.engine.upgrade_all(ids(&["a", "a"]), |_| {}).await;

    assert_eq!(report.len(), 1);
    assert!(!report.has_failures());
    assert_eq!(h.registry.downloads.load(Ordering::SeqCst), before + 1);
    assert_eq!(h.store().get("a").unwrap().version_id, "a2");
}

#[tokio::test]
async fn upgrade_all_without_ids_targets_active_provider_only() {
    let h = Harness::new(three_mods()).await;
    h.engine.add_all(ids(&["a", "b"]), |_| {}).await;
    // an entry from another registry must not be probed here
    let mut foreign = InstalledMod::from_version(
        "Foreign",
        &version("cf-1", "c1", 1, &["fabric"], &["1.20.1"]),
        "curseforge",
    );
    foreign.installed_file_path = "foreign.jar".to_string();
    h.store().insert_new(foreign).unwrap();

    h.registry
        .publish("a", version("a", "a2", 2, &["fabric"], &["1.20.1"]));
    h.store().set_pinned("b", true).unwrap();

    let report = h.engine.upgrade_all(Vec::new(), |_| {}).await;

    assert_eq!(report.len(), 2);
    assert!(!report.has_failures());
    let mut upgraded: Vec<_> = report
        .successes()
        .filter_map(|(item, m)| m.as_ref().map(|m| (item, m.version_id.as_str())))
        .collect();
    upgraded.sort();
    assert_eq!(upgraded, [("a", "a2")]);
    assert_eq!(h.store().get("cf-1").unwrap().version_id, "c1");
}

#[tokio::test]
async fn outdated_lists_pending_upgrades() {
    let h = Harness::new(three_mods()).await;
    h.engine.add_all(ids(&["a", "b"]), |_| {}).await;
    h.registry
        .publish("b", version("b", "b2", 2, &["fabric"], &["1.20.1"]));

    let report = h.engine.outdated(|_| {}).await;

    let mut pending: Vec<_> = report
        .successes()
        .map(|(item, (_, upgrade))| (item, upgrade.as_ref().map(|v| v.id.as_str())))
        .collect();
    pending.sort();
    assert_eq!(pending, [("a", None), ("b", Some("b2"))]);
    // probing does not install anything
    assert_eq!(h.store().get("b").unwrap().version_id, "b1");
}

#[tokio::test]
async fn discover_all_skips_tracked_files() {
    let h = Harness::new(three_mods().with_fingerprints(FingerprintScheme::Sha1)).await;
    h.engine.add("a").await.unwrap();
    std::fs::write(h.file("beta.jar"), h.registry.artifact("b1")).unwrap();
    std::fs::write(h.file("junk.jar"), b"junk").unwrap();

    let (tracked, beta, junk) = (h.arg("a-a1.jar"), h.arg("beta.jar"), h.arg("junk.jar"));

    let (report, skipped) = h
        .engine
        .discover_all(vec![tracked.clone(), beta.clone(), junk.clone()], |_| {})
        .await
        .unwrap();

    assert_eq!(skipped, [tracked]);
    assert_eq!(report.len(), 2);
    let found: Vec<_> = report.successes().map(|(file, m)| (file, m.id.as_str())).collect();
    assert_eq!(found, [(beta.as_str(), "b")]);
    let failed: Vec<_> = report.failures().map(|(file, _)| file).collect();
    assert_eq!(failed, [junk.as_str()]);
    assert!(h.store().is_file_known("beta.jar"));
}

#[tokio::test]
async fn discover_all_without_capability_fails_up_front() {
    let h = Harness::new(three_mods()).await;
    let err = h
        .engine
        .discover_all(ids(&["x.jar"]), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedCapability { .. }));
}
