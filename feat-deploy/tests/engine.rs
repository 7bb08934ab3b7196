//! End-to-end coverage of `Engine`'s resolve -> plan -> execute pipeline
//! against `FsRepositoryLoader` fixtures and `FakeModuleHost`.

use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use feat_catalog::FsRepositoryLoader;
use feat_deploy::testing::FakeModuleHost;
use feat_deploy::{synthetic_content_resolver, ContentResolver, Engine, EngineConfig, Error, ModuleState};
use feat_types::{
    BundleRef, Conditional, ConfigRef, Feature, FeatureId, FeatureRef, ModuleId, Repository, StaticStreamProvider, StreamProvider, Version,
    VersionRange,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::tempdir;
use testresult::TestResult;

fn write_repo(dir: &Path, repo: &Repository) -> TestResult {
    fs::write(dir.join(format!("{}.json", repo.uri)), serde_json::to_string(repo)?)?;
    Ok(())
}

fn feature(name: &str, version: &str, bundles: Vec<BundleRef>, dependencies: Vec<FeatureRef>) -> Feature {
    Feature {
        name: name.to_string(),
        version: Version::new(version).expect("valid version"),
        bundles,
        dependencies,
        conditionals: vec![],
        configurations: vec![],
    }
}

fn new_engine(catalog_dir: &Path, state_dir: &Path, host: &Arc<FakeModuleHost>) -> Result<Engine<FsRepositoryLoader, FakeModuleHost>, Error> {
    Engine::new(
        FsRepositoryLoader::new(catalog_dir),
        Arc::clone(host),
        synthetic_content_resolver(),
        state_dir,
        EngineConfig::default(),
        None,
    )
}

#[rstest]
fn fresh_install_resolves_and_starts_its_bundle() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    assert_eq!(engine.list(), vec![FeatureId::parse("webconsole/1.0.0")?]);
    let modules = host.modules();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].state, ModuleState::Active);
    assert_eq!(modules[0].symbolic_name.as_deref(), Some("webconsole"));
    Ok(())
}

#[rstest]
fn reinstalling_an_already_required_feature_does_not_duplicate_modules() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;
    engine.install("webconsole/1.0")?;

    assert_eq!(host.modules().len(), 1);
    assert_eq!(engine.list().len(), 1);
    Ok(())
}

#[rstest]
fn uninstall_stops_and_uninstalls_the_managed_module() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;
    let module_id = host.modules()[0].id;

    engine.uninstall("webconsole/1.0")?;

    assert!(engine.list().is_empty());
    assert_eq!(host.state(module_id), ModuleState::Uninstalled);
    Ok(())
}

#[rstest]
fn ambiguous_uninstall_without_a_version_is_rejected() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![
                feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![]),
                feature("webconsole", "2.0.0", vec![BundleRef::new("mvn:g/webconsole/2.0.0")], vec![]),
            ],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0.0")?;
    engine.install("webconsole/2.0.0")?;

    let result = engine.uninstall("webconsole");
    assert!(matches!(result, Err(Error::AmbiguousUninstall(name)) if name == "webconsole"));
    Ok(())
}

#[rstest]
fn cross_repository_dependency_resolves_transitively() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec!["libs".to_string()],
            features: vec![feature(
                "webapp",
                "1.0.0",
                vec![BundleRef::new("mvn:g/webapp/1.0.0")],
                vec![FeatureRef::new("lib", VersionRange::any())],
            )],
        },
    )?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "libs".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("lib", "1.0.0", vec![BundleRef::new("mvn:g/lib/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webapp/1.0")?;

    let installed = engine.list();
    assert!(installed.contains(&FeatureId::parse("webapp/1.0.0")?));
    assert!(installed.contains(&FeatureId::parse("lib/1.0.0")?));
    assert_eq!(host.modules().len(), 2);
    Ok(())
}

#[rstest]
fn a_failed_start_is_reported_but_does_not_abort_the_batch() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("flaky", "1.0.0", vec![BundleRef::new("mvn:g/flaky/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    // The fake host hands out sequential ids starting at 1; this is the
    // first (and only) module this deployment installs.
    host.fail_next_start(ModuleId(1));
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;

    let result = engine.install("flaky/1.0");
    assert!(matches!(result, Err(Error::StartFailures(1, _))));

    // State still committed: the feature is installed even though the
    // module it pulled in failed to start.
    assert_eq!(engine.list(), vec![FeatureId::parse("flaky/1.0.0")?]);
    assert_eq!(host.state(ModuleId(1)), ModuleState::Installed);
    Ok(())
}

#[rstest]
fn conditional_bundle_is_added_once_its_trigger_feature_is_installed() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![Feature {
                name: "base".to_string(),
                version: Version::new("1.0.0")?,
                bundles: vec![BundleRef::new("mvn:g/base/1.0.0")],
                dependencies: vec![],
                conditionals: vec![Conditional {
                    triggers: vec![FeatureRef::parse("ssh/1.0.0")?],
                    bundles: vec![BundleRef::new("mvn:g/ssh-console/1.0.0")],
                    configurations: vec![ConfigRef::default()],
                }],
                configurations: vec![],
            }],
        },
    )?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "ssh".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("ssh", "1.0.1", vec![BundleRef::new("mvn:g/ssh/1.0.1")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.add_repository("ssh")?;
    engine.install("base/1.0")?;
    engine.install("ssh/1.0.1")?;

    let symbolic_names: Vec<Option<String>> = host.modules().iter().map(|module| module.symbolic_name.clone()).collect();
    assert!(symbolic_names.contains(&Some("ssh-console".to_string())));
    Ok(())
}

#[rstest]
fn add_listener_replays_current_roots_and_installed_features() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = std::sync::Arc::clone(&seen);
    engine.add_listener(move |event| seen_clone.lock().expect("lock poisoned").push(event.clone()));

    let events = seen.lock().expect("lock poisoned");
    assert!(events.iter().any(|event| matches!(
        event,
        feat_deploy::Event::RepositoryAdded { uri, replayed: true } if uri == "base"
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        feat_deploy::Event::FeatureInstalled { id, replayed: true } if *id == FeatureId::parse("webconsole/1.0.0").unwrap()
    )));
    Ok(())
}

#[rstest]
fn installed_module_shape_is_stable() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature(
                "webconsole",
                "1.0.0",
                vec![BundleRef::new("mvn:g/webconsole/1.0.0"), BundleRef::new("mvn:g/webconsole-core/1.0.0")],
                vec![],
            )],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    let mut shape: Vec<(Option<String>, String, ModuleState)> = host
        .modules()
        .iter()
        .map(|module| (module.symbolic_name.clone(), module.version.to_string(), module.state))
        .collect();
    shape.sort();
    insta::assert_debug_snapshot!(shape);
    Ok(())
}

#[rstest]
fn snapshot_bundle_with_changed_content_is_updated_and_restarted() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature(
                "webconsole",
                "1.0.0",
                vec![BundleRef::new("mvn:g/webconsole/1.0.0.SNAPSHOT")],
                vec![],
            )],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let revision = Arc::new(AtomicU8::new(0));
    let revision_for_content = Arc::clone(&revision);
    let content: ContentResolver = Arc::new(move |location: &str| -> Arc<dyn StreamProvider> {
        let mut bytes = location.as_bytes().to_vec();
        bytes.push(revision_for_content.load(Ordering::SeqCst));
        Arc::new(StaticStreamProvider::new(bytes))
    });
    let engine = Engine::new(
        FsRepositoryLoader::new(catalog_dir.path()),
        Arc::clone(&host),
        content,
        state_dir.path(),
        EngineConfig::default(),
        None,
    )?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    let module_id = host.modules()[0].id;
    let first_content = host.content_of(module_id);

    revision.store(1, Ordering::SeqCst);
    engine.install("webconsole/1.0")?;

    assert_ne!(host.content_of(module_id), first_content);
    assert_eq!(host.modules().len(), 1);
    assert_eq!(host.state(module_id), ModuleState::Active);
    Ok(())
}

#[rstest]
fn bundle_start_level_is_applied_on_install() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    let mut bundle = BundleRef::new("mvn:g/webconsole/1.0.0");
    bundle.start_level = Some(42);
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature("webconsole", "1.0.0", vec![bundle], vec![])],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    let module_id = host.modules()[0].id;
    assert_eq!(host.start_level_of(module_id), Some(42));
    Ok(())
}

#[rstest]
fn no_refresh_config_skips_restarting_a_snapshot_whose_content_changed() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![feature(
                "webconsole",
                "1.0.0",
                vec![BundleRef::new("mvn:g/webconsole/1.0.0.SNAPSHOT")],
                vec![],
            )],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let revision = Arc::new(AtomicU8::new(0));
    let revision_for_content = Arc::clone(&revision);
    let content: ContentResolver = Arc::new(move |location: &str| -> Arc<dyn StreamProvider> {
        let mut bytes = location.as_bytes().to_vec();
        bytes.push(revision_for_content.load(Ordering::SeqCst));
        Arc::new(StaticStreamProvider::new(bytes))
    });
    let engine = Engine::new(
        FsRepositoryLoader::new(catalog_dir.path()),
        Arc::clone(&host),
        content,
        state_dir.path(),
        EngineConfig {
            no_refresh: true,
            ..EngineConfig::default()
        },
        None,
    )?;
    engine.add_repository("base")?;
    engine.install("webconsole/1.0")?;

    let module_id = host.modules()[0].id;
    revision.store(1, Ordering::SeqCst);
    // A restart would consume this and fail the deployment; with
    // no_refresh the updated-but-still-active module is never stopped and
    // restarted, so the scripted failure goes unused.
    host.fail_next_start(module_id);
    engine.install("webconsole/1.0")?;

    assert_eq!(host.state(module_id), ModuleState::Active);
    Ok(())
}

#[rstest]
fn install_without_a_version_prefers_the_highest_available() -> TestResult {
    let catalog_dir = tempdir()?;
    let state_dir = tempdir()?;
    write_repo(
        catalog_dir.path(),
        &Repository {
            uri: "base".to_string(),
            name: None,
            referenced_repositories: vec![],
            features: vec![
                feature("webconsole", "1.0.0", vec![BundleRef::new("mvn:g/webconsole/1.0.0")], vec![]),
                feature("webconsole", "2.0.0", vec![BundleRef::new("mvn:g/webconsole/2.0.0")], vec![]),
            ],
        },
    )?;

    let host = Arc::new(FakeModuleHost::new());
    let engine = new_engine(catalog_dir.path(), state_dir.path(), &host)?;
    engine.add_repository("base")?;
    engine.install("webconsole")?;

    assert_eq!(engine.list(), vec![FeatureId::parse("webconsole/2.0.0")?]);
    Ok(())
}
