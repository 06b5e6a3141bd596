//! Single-cookie processing: one pass of rules, then enrichment.

use std::sync::Arc;

use chrono::Utc;
use monster_core::{Cookie, Enrichment};
use monster_jar::{CookieJar, JarError};
use monster_notify::Notifier;
use monster_rules::{LoaderDocument, RuleDocument};
use tracing::{debug, info};

/// Result of one processing pass over a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A rule terminated the pass; the cookie is done until new knowledge
    /// arrives.
    Completed,
    /// No rule terminated and this loader appended an enrichment; the append
    /// already re-queued the cookie.
    NeedsEnrichment { loader_id: String },
    /// No rule terminated and no loader applied.
    Unprocessable,
}

/// Stateless evaluation of one cookie against snapshots of the rule and
/// loader registries.
pub struct Processor<'a> {
    jar: &'a CookieJar,
    notifier: &'a Notifier,
    rules: &'a [Arc<RuleDocument>],
    loaders: &'a [Arc<LoaderDocument>],
}

impl<'a> Processor<'a> {
    pub fn new(
        jar: &'a CookieJar,
        notifier: &'a Notifier,
        rules: &'a [Arc<RuleDocument>],
        loaders: &'a [Arc<LoaderDocument>],
    ) -> Self {
        Self {
            jar,
            notifier,
            rules,
            loaders,
        }
    }

    /// Run one pass. Rules see the cookie including the rule-application
    /// records appended by higher-priority rules earlier in the same pass.
    pub fn process(&self, cookie: &mut Cookie) -> Result<Outcome, JarError> {
        if self.evaluate_rules(cookie)? {
            return Ok(Outcome::Completed);
        }
        self.attempt_enrichment(cookie)
    }

    /// Evaluate rules in snapshot order (priority descending). Returns whether
    /// a matching action terminated the pass.
    fn evaluate_rules(&self, cookie: &mut Cookie) -> Result<bool, JarError> {
        for rule in self.rules {
            if !rule.when.matches(cookie) {
                continue;
            }

            for notification in rule.notifications() {
                self.notifier.broadcast(&notification);
            }

            let terminated = rule.action.terminate;
            // Persist the firing without re-queueing the cookie.
            let record = Enrichment::rule_application(rule.rule_id(), Utc::now(), terminated);
            self.jar.append_quietly(&cookie.identifier, record.clone())?;
            cookie.enrich(record);

            info!(
                rule = rule.rule_id(),
                cookie = %cookie.identifier,
                terminated,
                "rule fired"
            );

            if terminated {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Ask loaders, in snapshot order, for the next enrichment. The first
    /// applicable loader wins; its append re-dirties the cookie.
    fn attempt_enrichment(&self, cookie: &Cookie) -> Result<Outcome, JarError> {
        for loader in self.loaders {
            if !loader.can_enrich.matches(cookie) {
                continue;
            }

            let enrichment = loader.load(Utc::now());
            info!(
                loader = loader.loader_id(),
                cookie = %cookie.identifier,
                source = %enrichment.source,
                "applying enrichment"
            );
            self.jar.enrich(&cookie.identifier, enrichment)?;
            return Ok(Outcome::NeedsEnrichment {
                loader_id: loader.loader_id().to_string(),
            });
        }

        debug!(cookie = %cookie.identifier, "no rule terminated and no loader applies");
        Ok(Outcome::Unprocessable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monster_core::RULE_APPLICATION;
    use monster_jar::store::InMemoryCookieStore;
    use monster_jar::RetryPolicy;
    use monster_notify::{Receive, ReceiveError};
    use monster_rules::SourceItem;
    use serde_json::Map;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<monster_core::Notification>>,
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
        fn receive(&self, notification: &monster_core::Notification) -> Result<(), ReceiveError> {
            self.seen.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn jar() -> CookieJar {
        CookieJar::open(Arc::new(InMemoryCookieStore::new()), RetryPolicy::disabled()).unwrap()
    }

    fn rule(yaml: &str) -> Arc<RuleDocument> {
        Arc::new(serde_yaml::from_str(yaml).unwrap())
    }

    fn loader(yaml: &str) -> Arc<LoaderDocument> {
        Arc::new(serde_yaml::from_str(yaml).unwrap())
    }

    fn seeded(jar: &CookieJar, id: &str) -> Cookie {
        jar.enrich(id, Enrichment::new("seed", Utc::now(), Map::new())).unwrap();
        let reserved = jar.next_for_processing(None).unwrap();
        assert_eq!(reserved, id);
        jar.fetch(id).unwrap().unwrap()
    }

    #[test]
    fn terminating_rule_completes_and_logs_the_firing() {
        let jar = jar();
        let recording = Recording::new();
        let notifier = Notifier::empty();
        notifier.register(recording.clone());

        let rules = vec![rule(
            r#"
apiVersion: v1
kind: Rule
metadata: { id: r1, priority: 100 }
when: { id_contains: "x" }
action:
  terminate: true
  notifications: [ { topic: n1 } ]
"#,
        )];

        let mut cookie = seeded(&jar, "x/1");
        let outcome = Processor::new(&jar, &notifier, &rules, &[]).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(recording.topics(), vec!["n1"]);

        // Durable log: seed enrichment then the rule application.
        let stored = jar.fetch("x/1").unwrap().unwrap();
        assert_eq!(stored.enrichments.len(), 2);
        assert_eq!(stored.enrichments[1].source, RULE_APPLICATION);
        assert_eq!(stored.enrichments[1].metadata["rule_id"], "r1");
        assert_eq!(stored.enrichments[1].metadata["terminated"], true);
        // The quiet append did not re-queue the in-flight cookie.
        jar.mark_complete("x/1").unwrap();
        assert_eq!(jar.length(), (0, 0));
    }

    #[test]
    fn non_terminating_rules_cascade_in_priority_order() {
        let jar = jar();
        let recording = Recording::new();
        let notifier = Notifier::empty();
        notifier.register(recording.clone());

        let rules = vec![
            rule(
                r#"
apiVersion: v1
kind: Rule
metadata: { id: r2, priority: 50 }
when: { always: true }
action:
  terminate: true
  notifications: [ { topic: n2 } ]
"#,
            ),
            rule(
                r#"
apiVersion: v1
kind: Rule
metadata: { id: r1, priority: 100 }
when: { always: true }
action:
  terminate: false
  notifications: [ { topic: n1 } ]
"#,
            ),
        ];
        // Snapshot order is priority descending.
        let mut rules = rules;
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority()));

        let mut cookie = seeded(&jar, "y");
        let outcome = Processor::new(&jar, &notifier, &rules, &[]).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(recording.topics(), vec!["n1", "n2"]);

        let stored = jar.fetch("y").unwrap().unwrap();
        let tail: Vec<_> = stored.enrichments[1..]
            .iter()
            .map(|e| e.metadata["rule_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(tail, vec!["r1", "r2"]);
    }

    #[test]
    fn later_rules_see_earlier_rule_applications() {
        let jar = jar();
        let notifier = Notifier::empty();

        let rules = vec![
            rule(
                r#"
apiVersion: v1
kind: Rule
metadata: { id: first, priority: 100 }
when: { always: true }
action: { terminate: false }
"#,
            ),
            rule(
                r#"
apiVersion: v1
kind: Rule
metadata: { id: second, priority: 50 }
when: { has_source: RULE_APPLICATION }
action: { terminate: true }
"#,
            ),
        ];

        let mut cookie = seeded(&jar, "z");
        let outcome = Processor::new(&jar, &notifier, &rules, &[]).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::Completed);
    }

    #[test]
    fn first_applicable_loader_wins_and_requeues() {
        let jar = jar();
        let notifier = Notifier::empty();

        let loaders = vec![
            loader(
                r#"
apiVersion: v1
kind: EnrichmentLoader
metadata: { id: never, priority: 100 }
can_enrich: { always: false }
enrichment: { source: never }
"#,
            ),
            loader(
                r#"
apiVersion: v1
kind: EnrichmentLoader
metadata: { id: l1, priority: 10 }
can_enrich:
  not: { has_source: l1 }
enrichment:
  source: l1
  metadata: { k: 1 }
"#,
            ),
        ];

        let mut cookie = seeded(&jar, "z");
        let outcome = Processor::new(&jar, &notifier, &[], &loaders).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::NeedsEnrichment { loader_id: "l1".into() });

        // The loader's append re-dirtied the in-flight cookie.
        jar.mark_complete("z").unwrap();
        assert_eq!(jar.length(), (1, 0));

        // Second pass: the loader no longer applies.
        let id = jar.next_for_processing(None).unwrap();
        let mut cookie = jar.fetch(&id).unwrap().unwrap();
        let outcome = Processor::new(&jar, &notifier, &[], &loaders).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::Unprocessable);

        let stored = jar.fetch("z").unwrap().unwrap();
        let sources: Vec<_> = stored.enrichments.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["seed", "l1"]);
    }

    #[test]
    fn no_rules_no_loaders_is_unprocessable() {
        let jar = jar();
        let notifier = Notifier::empty();
        let mut cookie = seeded(&jar, "a");
        let outcome = Processor::new(&jar, &notifier, &[], &[]).process(&mut cookie).unwrap();
        assert_eq!(outcome, Outcome::Unprocessable);
    }
}
