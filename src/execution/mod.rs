//! Execution: walking a discovered tree and reporting every node's lifecycle.
//!
//! ## Event contract
//!
//! Every node gets exactly one `Started` followed by exactly one terminal event, and a container's terminal event
//! comes after all of its descendants' events. Nodes that never run (disabled, below a failed before-all hook, or
//! cut off by fail-fast) are still reported as `Started` then `Skipped`.
//!
//! ## Order within a container
//!
//! before-all hooks, then children in tree order, then after-all hooks. For each test: before-each hooks of every
//! enclosing container (outermost first), the body, then after-each hooks (innermost first). Hooks and bodies get
//! their arguments through [`resolve_parameters`]; a resolution failure fails only that invocation.
//!
//! Bodies and resolvers run under `catch_unwind`, so a panic fails its own node and the walk continues.
//!
//! A container (or the engine root) carrying a discovery failure terminates as `Failed` with that failure, unless a
//! hook already failed it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod outcome;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use trellis_core::{
    DescriptorTree, EventCounts, EventKind, EventPayload, EventSink, InvariantViolation, NodeId, TestDescriptor,
};

use crate::config::EngineConfig;
use crate::extension::{ExtensionContext, ExtensionRegistry, ParamDecl, resolve_parameters};
use crate::marker::{Arguments, Body, Hook, HookKind, TestMarker};

pub use outcome::{InvocationError, TestFailure};

/// Totals of one execution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Every emitted event, containers and the engine root included.
    pub counts: EventCounts,
    /// Events of test descriptors only.
    pub test_counts: EventCounts,
    pub duration: Duration,
}

impl ExecutionSummary {
    /// No test and no container failed.
    pub fn is_success(&self) -> bool {
        self.counts.failed == 0
    }
}

/// One enclosing container while its subtree runs.
struct Frame {
    hooks: Vec<Hook>,
    registry: ExtensionRegistry,
}

impl Frame {
    fn hooks_of(&self, kind: HookKind) -> impl Iterator<Item = &Hook> {
        self.hooks.iter().filter(move |h| h.kind == kind)
    }
}

/// Run every node of `tree`, reporting to `sink`.
#[tracing::instrument(skip_all, fields(nodes = tree.node_count(), fail_fast = config.fail_fast))]
pub fn execute(
    tree: &DescriptorTree,
    marker: &dyn TestMarker,
    config: &EngineConfig,
    sink: &mut dyn EventSink,
) -> Result<ExecutionSummary, InvariantViolation> {
    let start = Instant::now();
    let mut walk = Walk {
        tree,
        marker,
        config,
        sink,
        frames: Vec::new(),
        base_registry: ExtensionRegistry::with_builtins(),
        counts: EventCounts::default(),
        test_counts: EventCounts::default(),
        test_failed: false,
    };
    walk.node(tree.root())?;

    let summary = ExecutionSummary {
        counts: walk.counts,
        test_counts: walk.test_counts,
        duration: start.elapsed(),
    };
    tracing::info!(
        tests = summary.test_counts.started,
        succeeded = summary.test_counts.succeeded,
        failed = summary.test_counts.failed,
        skipped = summary.test_counts.skipped,
        aborted = summary.test_counts.aborted,
        "execution finished"
    );
    Ok(summary)
}

struct Walk<'a> {
    tree: &'a DescriptorTree,
    marker: &'a dyn TestMarker,
    config: &'a EngineConfig,
    sink: &'a mut dyn EventSink,
    frames: Vec<Frame>,
    base_registry: ExtensionRegistry,
    counts: EventCounts,
    test_counts: EventCounts,
    test_failed: bool,
}

impl Walk<'_> {
    fn emit(&mut self, descriptor: &TestDescriptor, kind: EventKind, payload: Option<EventPayload>) {
        self.counts.count(kind);
        if descriptor.is_test() {
            self.test_counts.count(kind);
        }
        self.sink.record(descriptor, kind, payload);
    }

    fn finish(&mut self, descriptor: &TestDescriptor, result: Result<(), InvocationError>) {
        match result {
            Ok(()) => self.emit(descriptor, EventKind::Succeeded, None),
            Err(error) => {
                let kind = if error.is_aborted() {
                    EventKind::Aborted
                } else {
                    EventKind::Failed
                };
                tracing::debug!(unique_id = %descriptor.unique_id(), %kind, error = %error, "node did not succeed");
                self.emit(descriptor, kind, Some(EventPayload::from_diagnostic(&error)));
            }
        }
    }

    fn node(&mut self, node: NodeId) -> Result<(), InvariantViolation> {
        let tree = self.tree;
        let descriptor = tree.descriptor(node)?;
        if descriptor.is_test() {
            self.test(descriptor)
        } else {
            self.container(node, descriptor)
        }
    }

    /// Report every node below `node` as started then skipped, innermost terminating first.
    fn skip_descendants(&mut self, node: NodeId, reason: &str) -> Result<(), InvariantViolation> {
        let tree = self.tree;
        for &child in tree.children(node) {
            let descriptor = tree.descriptor(child)?;
            self.emit(descriptor, EventKind::Started, None);
            self.skip_descendants(child, reason)?;
            self.emit(descriptor, EventKind::Skipped, Some(EventPayload::message(reason)));
        }
        Ok(())
    }

    fn container(&mut self, node: NodeId, descriptor: &TestDescriptor) -> Result<(), InvariantViolation> {
        self.emit(descriptor, EventKind::Started, None);

        let Some(container) = descriptor.source().map(|s| s.container.clone()) else {
            // The engine root: no hooks, no extensions of its own.
            self.children(node)?;
            match self.discovery_failure(node) {
                Some(payload) => self.emit(descriptor, EventKind::Failed, Some(payload)),
                None => self.emit(descriptor, EventKind::Succeeded, None),
            }
            return Ok(());
        };

        if let Some(reason) = self.marker.skip_reason(&container, None) {
            tracing::debug!(container = %container, reason = %reason, "container disabled");
            self.skip_descendants(node, &reason)?;
            self.emit(descriptor, EventKind::Skipped, Some(EventPayload::message(reason)));
            return Ok(());
        }

        let registry = self
            .innermost_registry()
            .child(container.as_str(), self.marker.container_extensions(&container));
        let frame = Frame {
            hooks: self.marker.hooks(&container),
            registry,
        };
        let extension = ExtensionContext::for_descriptor(descriptor);

        let before = run_hooks(
            frame.hooks_of(HookKind::BeforeAll),
            &frame.registry,
            &container,
            &extension,
            HookPolicy::StopAtFirstFailure,
        );
        let frame = match &before {
            Err(error) => {
                self.skip_descendants(node, &format!("before-all hook failed: {error}"))?;
                frame
            }
            Ok(()) => {
                self.frames.push(frame);
                self.children(node)?;
                match self.frames.pop() {
                    Some(frame) => frame,
                    None => unreachable!("INVARIANT: frame pushed for this container is still on the stack"),
                }
            }
        };

        let after = run_hooks(
            frame.hooks_of(HookKind::AfterAll),
            &frame.registry,
            &container,
            &extension,
            HookPolicy::RunAll,
        );
        match (before.and(after), self.discovery_failure(node)) {
            (Ok(()), Some(payload)) => self.emit(descriptor, EventKind::Failed, Some(payload)),
            (result, _) => self.finish(descriptor, result),
        }
        Ok(())
    }

    /// Payload for the first discovery failure recorded on `node`, if any.
    fn discovery_failure(&self, node: NodeId) -> Option<EventPayload> {
        let failures = self.tree.discovery_failures(node);
        let first = failures.first()?;
        tracing::debug!(selector = %first.selector, failures = failures.len(), "reporting discovery failure");
        Some(EventPayload {
            code: first.code.clone(),
            message: format!("failed to resolve {}: {}", first.selector, first.message),
        })
    }

    fn children(&mut self, node: NodeId) -> Result<(), InvariantViolation> {
        let tree = self.tree;
        for &child in tree.children(node) {
            self.node(child)?;
        }
        Ok(())
    }

    fn innermost_registry(&self) -> &ExtensionRegistry {
        self.frames.last().map_or(&self.base_registry, |f| &f.registry)
    }

    fn test(&mut self, descriptor: &TestDescriptor) -> Result<(), InvariantViolation> {
        self.emit(descriptor, EventKind::Started, None);

        if self.config.fail_fast && self.test_failed {
            self.emit(
                descriptor,
                EventKind::Skipped,
                Some(EventPayload::message("skipped after an earlier failure (fail-fast)")),
            );
            return Ok(());
        }

        let Some((container, signature)) = descriptor
            .source()
            .and_then(|s| s.member.clone().map(|m| (s.container.clone(), m)))
        else {
            let error = InvocationError::MissingBody {
                executable: descriptor.unique_id().to_string(),
            };
            self.test_failed = true;
            self.emit(descriptor, EventKind::Failed, Some(EventPayload::from_diagnostic(&error)));
            return Ok(());
        };

        if let Some(reason) = self.marker.skip_reason(&container, Some(signature.as_str())) {
            tracing::debug!(signature = %signature, reason = %reason, "test disabled");
            self.emit(descriptor, EventKind::Skipped, Some(EventPayload::message(reason)));
            return Ok(());
        }

        // Member-level extensions are visible to the test and to the hooks wrapped around it.
        let registry = self
            .innermost_registry()
            .child(signature.as_str(), self.marker.member_extensions(&container, &signature));
        let extension = ExtensionContext::for_descriptor(descriptor);

        let mut result = Ok(());
        for frame in &self.frames {
            result = run_hooks(
                frame.hooks_of(HookKind::BeforeEach),
                &registry,
                &container,
                &extension,
                HookPolicy::StopAtFirstFailure,
            );
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            result = self.invoke_test(&container, &signature, &registry, &extension);
        }
        for frame in self.frames.iter().rev() {
            let after = run_hooks(
                frame.hooks_of(HookKind::AfterEach),
                &registry,
                &container,
                &extension,
                HookPolicy::RunAll,
            );
            result = result.and(after);
        }

        if matches!(&result, Err(error) if !error.is_aborted()) {
            self.test_failed = true;
        }
        self.finish(descriptor, result);
        Ok(())
    }

    fn invoke_test(
        &self,
        container: &str,
        signature: &str,
        registry: &ExtensionRegistry,
        extension: &ExtensionContext,
    ) -> Result<(), InvocationError> {
        let params: Vec<ParamDecl> = self
            .marker
            .members(container)?
            .into_iter()
            .find(|m| m.signature() == signature)
            .map(|m| m.params)
            .unwrap_or_default();
        let body = self
            .marker
            .body(container, signature)
            .ok_or_else(|| InvocationError::MissingBody {
                executable: signature.to_string(),
            })?;
        invoke(signature, container, &params, &body, registry, extension)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookPolicy {
    /// before-* hooks: the first failure skips the rest.
    StopAtFirstFailure,
    /// after-* hooks: every hook runs; the first failure is kept.
    RunAll,
}

fn run_hooks<'h>(
    hooks: impl Iterator<Item = &'h Hook>,
    registry: &ExtensionRegistry,
    container: &str,
    extension: &ExtensionContext,
    policy: HookPolicy,
) -> Result<(), InvocationError> {
    let mut result = Ok(());
    for hook in hooks {
        let outcome = invoke(&hook.signature(), container, &hook.params, &hook.body, registry, extension);
        if outcome.is_err() && policy == HookPolicy::StopAtFirstFailure {
            return outcome;
        }
        result = result.and(outcome);
    }
    result
}

/// Resolve arguments for one executable and call it, turning a panic into an [`InvocationError`].
fn invoke(
    executable: &str,
    container: &str,
    params: &[ParamDecl],
    body: &Body,
    registry: &ExtensionRegistry,
    extension: &ExtensionContext,
) -> Result<(), InvocationError> {
    let values = resolve_parameters(executable, container, params, registry, extension)?;
    let arguments = Arguments::new(values);
    tracing::trace!(executable, arguments = arguments.len(), "invoking");
    match catch_unwind(AssertUnwindSafe(|| body(&arguments))) {
        Ok(result) => Ok(result?),
        Err(payload) => Err(InvocationError::from_panic(executable, payload.as_ref())),
    }
}
