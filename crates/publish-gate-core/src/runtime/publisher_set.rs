// crates/publish-gate-core/src/runtime/publisher_set.rs
// ============================================================================
// Module: Publish Gate Publisher Set
// Description: Declared, dependency-ordered collection of publish targets.
// Purpose: Publish to independent targets concurrently and record every outcome.
// Dependencies: crate::{core, interfaces}, tracing
// ============================================================================

//! ## Overview
//! Publishers are declared in priority order and may depend on publishers
//! declared before them, which rules out cycles by construction. Execution
//! proceeds in waves: a wave holds every publisher whose dependencies all sit
//! in earlier waves, and publishers within a wave run concurrently.
//!
//! A publisher whose dependency did not succeed is recorded as skipped; its
//! independent siblings still run. Every declared target yields exactly one
//! [`PublishResult`], in declaration order. Nothing is rolled back.
//!
//! When a [`PublishJournal`] is attached, a target whose dedupe key already
//! has a recorded success is not contacted again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::core::ArtifactSnapshot;
use crate::core::identifiers::TargetName;
use crate::core::manifest::Manifest;
use crate::core::publish::DedupeKey;
use crate::core::publish::PublishResult;
use crate::interfaces::PublishJournal;
use crate::interfaces::PublishRequest;
use crate::interfaces::Publisher;
use crate::runtime::cancel::CancellationToken;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Publisher set configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublisherSetError {
    /// Two publishers share a target name.
    #[error("duplicate publish target: {0}")]
    DuplicateTarget(TargetName),
    /// A dependency names a target not declared earlier.
    #[error("target {target} depends on {dependency}, which is not declared before it")]
    UnknownDependency {
        /// Dependent target.
        target: TargetName,
        /// Missing dependency.
        dependency: TargetName,
    },
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Declared publisher with its dependencies and wave index.
struct PublisherEntry {
    /// Publisher implementation.
    publisher: Arc<dyn Publisher>,
    /// Targets that must succeed first.
    depends_on: Vec<TargetName>,
    /// Execution wave.
    wave: usize,
}

/// Builder for [`PublisherSet`].
#[derive(Default)]
pub struct PublisherSetBuilder {
    /// Declared publishers in priority order.
    declared: Vec<(Arc<dyn Publisher>, Vec<TargetName>)>,
    /// Optional publish journal.
    journal: Option<Arc<dyn PublishJournal>>,
}

impl PublisherSetBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an independent publisher.
    #[must_use]
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.declared.push((publisher, Vec::new()));
        self
    }

    /// Declares a publisher that runs after the named targets succeed.
    #[must_use]
    pub fn publisher_after(
        mut self,
        publisher: Arc<dyn Publisher>,
        depends_on: impl IntoIterator<Item = TargetName>,
    ) -> Self {
        self.declared.push((publisher, depends_on.into_iter().collect()));
        self
    }

    /// Attaches a publish journal for cross-run idempotency.
    #[must_use]
    pub fn journal(mut self, journal: Arc<dyn PublishJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Validates declarations and computes execution waves.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherSetError`] when targets repeat or a dependency is
    /// not declared earlier.
    pub fn build(self) -> Result<PublisherSet, PublisherSetError> {
        let mut waves: BTreeMap<TargetName, usize> = BTreeMap::new();
        let mut entries = Vec::with_capacity(self.declared.len());
        for (publisher, depends_on) in self.declared {
            let target = publisher.target().clone();
            if waves.contains_key(&target) {
                return Err(PublisherSetError::DuplicateTarget(target));
            }
            let mut wave = 0usize;
            for dependency in &depends_on {
                let Some(dependency_wave) = waves.get(dependency) else {
                    return Err(PublisherSetError::UnknownDependency {
                        target,
                        dependency: dependency.clone(),
                    });
                };
                wave = wave.max(dependency_wave + 1);
            }
            waves.insert(target, wave);
            entries.push(PublisherEntry {
                publisher,
                depends_on,
                wave,
            });
        }
        Ok(PublisherSet {
            entries,
            journal: self.journal,
        })
    }
}

// ============================================================================
// SECTION: Publisher Set
// ============================================================================

/// Validated, dependency-ordered publishers.
pub struct PublisherSet {
    /// Entries in declaration order.
    entries: Vec<PublisherEntry>,
    /// Optional publish journal.
    journal: Option<Arc<dyn PublishJournal>>,
}

impl PublisherSet {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> PublisherSetBuilder {
        PublisherSetBuilder::new()
    }

    /// Returns declared target names in order.
    #[must_use]
    pub fn targets(&self) -> Vec<&TargetName> {
        self.entries.iter().map(|entry| entry.publisher.target()).collect()
    }

    /// Returns the number of declared publishers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no publishers are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Publishes to every target and returns one result per target in
    /// declaration order.
    ///
    /// Cancellation prevents later waves from starting; calls already
    /// dispatched run to completion and their real outcomes are kept.
    #[must_use]
    pub fn publish_all(
        &self,
        manifest: &Manifest,
        artifacts: &ArtifactSnapshot,
        cancel: &CancellationToken,
    ) -> Vec<PublishResult> {
        let mut results: Vec<Option<PublishResult>> = self.entries.iter().map(|_| None).collect();
        let mut external_ids: BTreeMap<TargetName, String> = BTreeMap::new();
        let mut succeeded: BTreeSet<TargetName> = BTreeSet::new();
        let last_wave = self.entries.iter().map(|entry| entry.wave).max().unwrap_or(0);

        for wave in 0 ..= last_wave {
            let members: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.wave == wave)
                .map(|(index, _)| index)
                .collect();
            if members.is_empty() {
                continue;
            }

            let mut runnable = Vec::new();
            for index in members {
                let entry = &self.entries[index];
                let key = DedupeKey::derive(manifest.aggregate_digest(), entry.publisher.target());
                if cancel.is_cancelled() {
                    results[index] = Some(PublishResult::skipped(
                        entry.publisher.target().clone(),
                        key,
                        "cancelled before dispatch",
                    ));
                    continue;
                }
                if let Some(missing) =
                    entry.depends_on.iter().find(|dependency| !succeeded.contains(*dependency))
                {
                    results[index] = Some(PublishResult::skipped(
                        entry.publisher.target().clone(),
                        key,
                        format!("dependency {missing} did not succeed"),
                    ));
                    continue;
                }
                runnable.push((index, key));
            }

            let upstream = &external_ids;
            let wave_results: Vec<(usize, PublishResult)> = thread::scope(|scope| {
                let handles: Vec<_> = runnable
                    .into_iter()
                    .map(|(index, key)| {
                        let entry = &self.entries[index];
                        let target = entry.publisher.target().clone();
                        let handle = scope.spawn(move || {
                            self.publish_one(entry, manifest, artifacts, &key, upstream)
                        });
                        (index, target, handle)
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(index, target, handle)| {
                        let key = DedupeKey::derive(manifest.aggregate_digest(), &target);
                        let result = handle.join().unwrap_or_else(|_| {
                            PublishResult::failed(target, key, "publisher thread terminated")
                        });
                        (index, result)
                    })
                    .collect()
            });

            for (index, result) in wave_results {
                if result.succeeded() {
                    succeeded.insert(result.target.clone());
                    if let Some(external_id) = &result.external_id {
                        external_ids.insert(result.target.clone(), external_id.clone());
                    }
                }
                results[index] = Some(result);
            }
        }

        results
            .into_iter()
            .zip(&self.entries)
            .map(|(result, entry)| {
                result.unwrap_or_else(|| {
                    let target = entry.publisher.target().clone();
                    let key = DedupeKey::derive(manifest.aggregate_digest(), &target);
                    PublishResult::skipped(target, key, "not dispatched")
                })
            })
            .collect()
    }

    /// Publishes to one target, consulting the journal first.
    fn publish_one(
        &self,
        entry: &PublisherEntry,
        manifest: &Manifest,
        artifacts: &ArtifactSnapshot,
        key: &DedupeKey,
        upstream: &BTreeMap<TargetName, String>,
    ) -> PublishResult {
        let target = entry.publisher.target().clone();
        if let Some(journal) = &self.journal {
            match journal.lookup(key) {
                Ok(Some(mut recorded)) if recorded.succeeded() => {
                    info!(target = %target, key = %key, "publish replayed from journal");
                    recorded.replayed = true;
                    return recorded;
                }
                Ok(_) => {}
                Err(err) => {
                    let message = format!("journal lookup failed: {err}");
                    return PublishResult::failed(target, key.clone(), message);
                }
            }
        }

        let request = PublishRequest {
            manifest,
            artifacts,
            dedupe_key: key,
            upstream,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| entry.publisher.publish(&request)));
        let result = match outcome {
            Ok(Ok(receipt)) => PublishResult::success(target, key.clone(), receipt.external_id),
            Ok(Err(err)) => PublishResult::failed(target, key.clone(), err.to_string()),
            Err(_) => PublishResult::failed(target, key.clone(), "publisher panicked"),
        };
        if result.succeeded() {
            info!(
                target = %result.target,
                external_id = result.external_id.as_deref().unwrap_or(""),
                "publish succeeded"
            );
            if let Some(journal) = &self.journal
                && let Err(err) = journal.record(&result)
            {
                warn!(target = %result.target, error = %err, "publish journal write failed");
            }
        } else {
            warn!(
                target = %result.target,
                error = result.error.as_deref().unwrap_or(""),
                "publish failed"
            );
        }
        result
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
