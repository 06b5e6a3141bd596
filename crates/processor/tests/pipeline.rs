//! End-to-end pipeline tests: registries on disk, jar, notifier, worker pool.

use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use monster_core::{Enrichment, Notification, RULE_APPLICATION};
use monster_jar::store::InMemoryCookieStore;
use monster_jar::{CookieJar, RetryPolicy};
use monster_notify::{Notifier, Receive, ReceiveError};
use monster_processor::{ManagerConfig, ProcessorManager};
use monster_rules::{FilePattern, LoaderDocument, RuleDocument, SourceRegistry};
use serde_json::Map;
use tempfile::TempDir;

struct Recording {
    seen: Mutex<Vec<Notification>>,
}

impl Recording {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn topics(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|n| n.topic.clone()).collect()
    }
}

impl Receive for Recording {
    fn receive(&self, notification: &Notification) -> Result<(), ReceiveError> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct Pipeline {
    _plugin_dir: TempDir,
    jar: Arc<CookieJar>,
    rules: Arc<SourceRegistry<RuleDocument>>,
    loaders: Arc<SourceRegistry<LoaderDocument>>,
    recording: Arc<Recording>,
    manager: Arc<ProcessorManager>,
}

fn pipeline(rule_files: &[(&str, &str)], loader_files: &[(&str, &str)]) -> Pipeline {
    let plugin_dir = TempDir::new().unwrap();
    for (name, contents) in rule_files {
        fs::write(plugin_dir.path().join(name), contents).unwrap();
    }
    for (name, contents) in loader_files {
        fs::write(plugin_dir.path().join(name), contents).unwrap();
    }

    let mut rules = SourceRegistry::new(plugin_dir.path().to_path_buf(), FilePattern::dot_suffix("rule"));
    rules.start().unwrap();
    let mut loaders = SourceRegistry::new(plugin_dir.path().to_path_buf(), FilePattern::dot_suffix("loader"));
    loaders.start().unwrap();
    let rules = Arc::new(rules);
    let loaders = Arc::new(loaders);

    let jar = Arc::new(CookieJar::open(Arc::new(InMemoryCookieStore::new()), RetryPolicy::disabled()).unwrap());
    let recording = Recording::new();
    let notifier = Notifier::empty();
    notifier.register(recording.clone());

    let manager = ProcessorManager::start(
        Arc::clone(&jar),
        Arc::clone(&rules),
        Arc::clone(&loaders),
        Arc::new(notifier),
        ManagerConfig {
            workers: 2,
            dequeue_timeout: Duration::from_millis(50),
        },
    );

    Pipeline {
        _plugin_dir: plugin_dir,
        jar,
        rules,
        loaders,
        recording,
        manager,
    }
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

fn seed(jar: &CookieJar, id: &str) {
    jar.enrich(id, Enrichment::new("seed", Utc::now(), Map::new())).unwrap();
}

#[test]
fn terminating_rule_fires_once_and_settles() {
    let pipeline = pipeline(
        &[(
            "a.rule.yml",
            r#"apiVersion: v1
kind: Rule
metadata: { id: r1, priority: 100 }
when: { id_contains: "x" }
action:
  terminate: true
  notifications: [ { topic: n1 } ]
"#,
        )],
        &[],
    );

    seed(&pipeline.jar, "x/1");

    wait_until("cookie to settle", || {
        pipeline.jar.length() == (0, 0)
            && pipeline
                .jar
                .fetch("x/1")
                .unwrap()
                .map(|c| c.enrichments.len() == 2)
                .unwrap_or(false)
    });

    assert_eq!(pipeline.recording.topics(), vec!["n1"]);
    let cookie = pipeline.jar.fetch("x/1").unwrap().unwrap();
    assert_eq!(cookie.enrichments[0].source, "seed");
    assert_eq!(cookie.enrichments[1].source, RULE_APPLICATION);
    assert_eq!(cookie.enrichments[1].metadata["rule_id"], "r1");

    pipeline.manager.stop();
}

#[test]
fn enrichment_path_stabilizes_after_one_loader_round() {
    let pipeline = pipeline(
        &[],
        &[(
            "l1.loader.yml",
            r#"apiVersion: v1
kind: EnrichmentLoader
metadata: { id: l1 }
can_enrich:
  not: { has_source: l1 }
enrichment:
  source: l1
  metadata: { k: 1 }
"#,
        )],
    );

    seed(&pipeline.jar, "z");

    wait_until("loader round to settle", || {
        let settled = pipeline.jar.length() == (0, 0);
        let log = pipeline
            .jar
            .fetch("z")
            .unwrap()
            .map(|c| c.enrichments.iter().map(|e| e.source.clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        settled && log == vec!["seed".to_string(), "l1".to_string()]
    });

    assert!(pipeline.recording.topics().is_empty());
    pipeline.manager.stop();
}

#[test]
fn unknown_reserved_cookie_is_completed_silently() {
    let pipeline = pipeline(&[], &[]);

    // Dirty an id that has no durable document at all.
    pipeline.jar.mark_dirty("/ghost");
    wait_until("ghost to drain", || pipeline.jar.length() == (0, 0));

    pipeline.manager.stop();
}

#[test]
fn hot_reloaded_rules_apply_to_later_cookies() {
    let pipeline = pipeline(
        &[(
            "a.rule.yml",
            r#"apiVersion: v1
kind: Rule
metadata: { id: r1, priority: 100 }
when: { id_contains: "first" }
action:
  terminate: true
  notifications: [ { topic: old } ]
"#,
        )],
        &[],
    );

    seed(&pipeline.jar, "first/1");
    wait_until("first cookie", || pipeline.jar.length() == (0, 0));
    assert_eq!(pipeline.recording.topics(), vec!["old"]);

    // Swap the file contents and reload (the watcher also does this on its
    // own; reload_file makes the test deterministic).
    let path = pipeline._plugin_dir.path().join("a.rule.yml");
    fs::write(
        &path,
        r#"apiVersion: v1
kind: Rule
metadata: { id: r1, priority: 100 }
when: { id_contains: "second" }
action:
  terminate: true
  notifications: [ { topic: new } ]
"#,
    )
    .unwrap();
    pipeline.rules.reload_file(&path);
    wait_until("registry swap", || {
        pipeline.rules.snapshot().len() == 1
            && pipeline.rules.snapshot()[0].when
                == monster_rules::Predicate::IdContains("second".into())
    });

    seed(&pipeline.jar, "second/1");
    wait_until("second cookie", || {
        pipeline.recording.topics() == vec!["old".to_string(), "new".to_string()]
    });
    assert!(pipeline.loaders.snapshot().is_empty());

    pipeline.manager.stop();
}

#[test]
fn stop_is_cooperative_and_final() {
    let pipeline = pipeline(&[], &[]);

    wait_until("workers to block on the queue", || pipeline.manager.awaiting_cookie() == 2);
    pipeline.manager.stop();

    // Work arriving after shutdown stays queued.
    seed(&pipeline.jar, "/late");
    thread::sleep(Duration::from_millis(150));
    assert_eq!(pipeline.jar.length(), (1, 0));
}

#[test]
fn dump_workers_reports_every_worker() {
    let pipeline = pipeline(&[], &[]);

    let dump = pipeline.manager.dump_workers();
    assert_eq!(dump.len(), 2);
    for (index, worker) in dump.iter().enumerate() {
        assert_eq!(worker.worker_id, index);
        assert!(matches!(worker.state, "idle" | "awaiting_cookie" | "processing"));
    }

    pipeline.manager.stop();
}
