//! Discovery through the engine: selectors in, descriptor trees and reports out.

mod common;

use common::{engine, engine_with};
use proptest::prelude::*;
use trellis::{
    ContainerSpec, DescriptorKind, Discovery, DiscoveryRequest, EngineConfig, MemberSpec, ParamDecl, Selector,
    TestCatalog, UniqueId, ValueType,
};

fn discover(catalog: TestCatalog, selectors: Vec<Selector>) -> Discovery {
    engine(catalog)
        .discover(&selectors.into_iter().collect::<DiscoveryRequest>())
        .unwrap()
}

fn local_test_case() -> TestCatalog {
    TestCatalog::new().container(
        ContainerSpec::new("LocalTestCase")
            .test("test1", |_| Ok(()))
            .test("test2", |_| Ok(()))
            .test("test3", |_| Ok(()))
            .helper("notATest"),
    )
}

fn nested_catalog() -> TestCatalog {
    TestCatalog::new()
        .container(ContainerSpec::new("Outer").test("outerTest", |_| Ok(())))
        .container(
            ContainerSpec::new("Inner")
                .nested_in("Outer")
                .member(MemberSpec::test("innerTest", |_| Ok(())).param(ParamDecl::new("x", ValueType::Int))),
        )
}

fn id(text: &str) -> UniqueId {
    UniqueId::parse(text).unwrap()
}

// ============================================================================
// Container and member selectors
// ============================================================================

#[test]
fn test_container_selection_skips_helpers() {
    let discovery = discover(local_test_case(), vec![Selector::container("LocalTestCase")]);
    let tree = &discovery.tree;

    assert_eq!(tree.descendants(tree.root()).len(), 4);
    assert!(discovery.report.is_clean());
    assert!(tree.lookup(&id("engine:trellis,container:LocalTestCase,member:notATest()")).is_none());
    let tests: Vec<&str> = tree
        .descendants(tree.root())
        .into_iter()
        .map(|n| tree.get(n).unwrap())
        .filter(|d| d.kind() == DescriptorKind::Test)
        .map(|d| d.display_name())
        .collect();
    assert_eq!(tests, vec!["test1()", "test2()", "test3()"]);
}

#[test]
fn test_member_selection_builds_container_chain() {
    let discovery = discover(local_test_case(), vec![Selector::member("LocalTestCase", "test2()")]);
    let tree = &discovery.tree;

    assert_eq!(tree.descendants(tree.root()).len(), 2);
    let node = tree
        .lookup(&id("engine:trellis,container:LocalTestCase,member:test2()"))
        .unwrap();
    let parent = tree.parent(node).unwrap();
    assert_eq!(tree.get(parent).unwrap().display_name(), "LocalTestCase");
    assert_eq!(tree.parent(parent), Some(tree.root()));
}

#[test]
fn test_member_then_container_merges() {
    let combined = discover(
        local_test_case(),
        vec![
            Selector::member("LocalTestCase", "test1()"),
            Selector::container("LocalTestCase"),
        ],
    );
    let alone = discover(local_test_case(), vec![Selector::container("LocalTestCase")]);

    assert_eq!(combined.tree.outline(), alone.tree.outline());
    assert_eq!(combined.tree.node_count(), alone.tree.node_count());
}

#[test]
fn test_duplicate_selectors_yield_one_subtree() {
    let discovery = discover(
        local_test_case(),
        vec![Selector::container("LocalTestCase"), Selector::container("LocalTestCase")],
    );
    assert_eq!(discovery.tree.descendants(discovery.tree.root()).len(), 4);
    assert!(discovery.report.is_clean());
}

#[test]
fn test_overloads_have_distinct_ids() {
    let catalog = TestCatalog::new().container(
        ContainerSpec::new("Calc")
            .member(
                MemberSpec::test("add", |_| Ok(()))
                    .param(ParamDecl::new("a", ValueType::Int))
                    .param(ParamDecl::new("b", ValueType::Int)),
            )
            .member(
                MemberSpec::test("add", |_| Ok(()))
                    .param(ParamDecl::new("a", ValueType::Float))
                    .param(ParamDecl::new("b", ValueType::Float)),
            ),
    );
    let discovery = discover(catalog, vec![Selector::container("Calc")]);
    let tree = &discovery.tree;

    let ints = tree.lookup(&id("engine:trellis,container:Calc,member:add(Int%2C Int)"));
    let floats = tree.lookup(&id("engine:trellis,container:Calc,member:add(Float%2C Float)"));
    assert!(ints.is_some());
    assert!(floats.is_some());
    assert_ne!(ints, floats);
}

// ============================================================================
// Unique-id selectors
// ============================================================================

#[test]
fn test_unique_id_of_member() {
    let discovery = discover(
        local_test_case(),
        vec![Selector::unique_id("engine:trellis,container:LocalTestCase,member:test3()")],
    );
    let tree = &discovery.tree;

    assert!(discovery.report.is_clean());
    assert_eq!(tree.descendants(tree.root()).len(), 2);
    assert!(tree.lookup(&id("engine:trellis,container:LocalTestCase,member:test3()")).is_some());
}

#[test]
fn test_unique_id_of_nested_container() {
    let discovery = discover(
        nested_catalog(),
        vec![Selector::unique_id("engine:trellis,container:Outer,nested-container:Inner")],
    );
    let tree = &discovery.tree;

    assert!(discovery.report.is_clean());
    assert!(tree.lookup(&id("engine:trellis,container:Outer")).is_some());
    assert!(tree.lookup(&id("engine:trellis,container:Outer,nested-container:Inner,member:innerTest(Int)")).is_some());
    // Selecting the inner container does not pull in the outer container's own tests.
    assert!(tree.lookup(&id("engine:trellis,container:Outer,member:outerTest()")).is_none());
}

#[test]
fn test_unique_id_of_another_engine_is_unmatched() {
    let selector = Selector::unique_id("engine:other,container:LocalTestCase");
    let discovery = discover(local_test_case(), vec![selector.clone()]);

    assert_eq!(discovery.report.unmatched(), &[selector]);
    assert_eq!(discovery.tree.node_count(), 1);
}

#[test]
fn test_unique_id_with_wrong_enclosing_chain_attaches_nothing() {
    let selector = Selector::unique_id("engine:trellis,container:Elsewhere,nested-container:Inner,member:innerTest(Int)");
    let discovery = discover(nested_catalog(), vec![selector.clone()]);

    assert_eq!(discovery.report.unmatched(), &[selector]);
    assert_eq!(discovery.tree.node_count(), 1);
}

#[test]
fn test_unique_id_of_engine_root_resolves() {
    let discovery = discover(local_test_case(), vec![Selector::unique_id("engine:trellis")]);
    assert!(discovery.report.is_clean());
    assert_eq!(discovery.tree.node_count(), 1);
}

#[test]
fn test_malformed_unique_id_is_recorded() {
    let discovery = discover(
        local_test_case(),
        vec![
            Selector::unique_id("engine:trellis,,container:LocalTestCase"),
            Selector::container("LocalTestCase"),
        ],
    );
    let failures = discovery.report.failures();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].code.as_deref(), Some("trellis::discovery::invalid_unique_id"));
    // The other selector is unaffected.
    assert_eq!(discovery.tree.descendants(discovery.tree.root()).len(), 4);
    assert_eq!(discovery.tree.discovery_failures(discovery.tree.root()).len(), 1);
}

#[test]
fn test_unknown_segment_kind_is_recorded() {
    let discovery = discover(local_test_case(), vec![Selector::unique_id("engine:trellis,method:test1()")]);
    let failures = discovery.report.failures();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].code.as_deref(), Some("trellis::discovery::unknown_segment"));
}

// ============================================================================
// Unmatched selectors and failures
// ============================================================================

#[test]
fn test_unknown_container_is_reported() {
    let discovery = discover(local_test_case(), vec![Selector::container("Missing")]);

    assert_eq!(discovery.report.unmatched(), &[Selector::container("Missing")]);
    assert_eq!(discovery.report.messages(), vec!["nothing found for selector container [Missing]"]);
    assert_eq!(discovery.tree.node_count(), 1);
}

#[test]
fn test_helper_member_is_not_selectable() {
    let discovery = discover(local_test_case(), vec![Selector::member("LocalTestCase", "notATest()")]);
    assert_eq!(discovery.report.unmatched().len(), 1);
    assert_eq!(discovery.tree.node_count(), 1);
}

#[test]
fn test_unreadable_container_is_isolated() {
    let catalog = local_test_case().container(ContainerSpec::new("Broken").unreadable("class file is corrupt"));
    let discovery = discover(
        catalog,
        vec![Selector::container("Broken"), Selector::container("LocalTestCase")],
    );
    let failures = discovery.report.failures();

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].selector, "container [Broken]");
    assert_eq!(failures[0].code.as_deref(), Some("trellis::discovery::marker"));
    assert!(failures[0].message.contains("class file is corrupt"));
    assert!(discovery.report.unmatched().is_empty());
    assert_eq!(discovery.tree.descendants(discovery.tree.root()).len(), 4);
}

#[test]
fn test_unreadable_nested_container_fails_its_branch_only() {
    let catalog = nested_catalog().container(ContainerSpec::new("Sealed").nested_in("Outer").unreadable("cannot list members"));
    let discovery = discover(catalog, vec![Selector::container("Outer")]);
    let tree = &discovery.tree;

    let outer = tree.lookup(&id("engine:trellis,container:Outer")).unwrap();
    assert_eq!(tree.discovery_failures(outer).len(), 1);
    assert!(tree.lookup(&id("engine:trellis,container:Outer,member:outerTest()")).is_some());
    assert!(tree.lookup(&id("engine:trellis,container:Outer,nested-container:Inner,member:innerTest(Int)")).is_some());
    assert!(tree.lookup(&id("engine:trellis,container:Outer,nested-container:Sealed")).is_none());
}

#[test]
fn test_unreadable_nested_container_keeps_readable_siblings() {
    let catalog = TestCatalog::new()
        .container(ContainerSpec::new("Outer"))
        .container(ContainerSpec::new("Sealed").nested_in("Outer").unreadable("cannot list members"))
        .container(ContainerSpec::new("Good").nested_in("Outer").test("t", |_| Ok(())));
    let discovery = discover(catalog, vec![Selector::container("Outer")]);
    let tree = &discovery.tree;

    let failures = discovery.report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].selector, "container [Sealed]");
    let outer = tree.lookup(&id("engine:trellis,container:Outer")).unwrap();
    assert_eq!(tree.discovery_failures(outer).len(), 1);
    assert!(tree.lookup(&id("engine:trellis,container:Outer,nested-container:Good,member:t()")).is_some());
}

#[test]
fn test_enclosing_cycle_is_a_failure() {
    let catalog = TestCatalog::new()
        .container(ContainerSpec::new("A").nested_in("B").test("t", |_| Ok(())))
        .container(ContainerSpec::new("B").nested_in("A").test("u", |_| Ok(())));
    let discovery = discover(catalog, vec![Selector::container("A")]);

    assert_eq!(discovery.report.failures().len(), 1);
    assert_eq!(
        discovery.report.failures()[0].code.as_deref(),
        Some("trellis::discovery::enclosing_cycle")
    );
}

// ============================================================================
// Tree shape
// ============================================================================

#[test]
fn test_nested_outline() {
    let discovery = discover(nested_catalog(), vec![Selector::container("Outer")]);
    insta::assert_snapshot!("nested_outline", discovery.tree.outline());
}

#[test]
fn test_tags_are_inherited_from_enclosing_containers() {
    let catalog = TestCatalog::new()
        .container(ContainerSpec::new("Outer").tag("integration"))
        .container(
            ContainerSpec::new("Inner")
                .nested_in("Outer")
                .member(MemberSpec::test("t", |_| Ok(())).tag("slow")),
        );
    let discovery = discover(catalog, vec![Selector::container("Outer")]);
    let tree = &discovery.tree;

    let node = tree
        .lookup(&id("engine:trellis,container:Outer,nested-container:Inner,member:t()"))
        .unwrap();
    let tags: Vec<&str> = tree.get(node).unwrap().tags().iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["integration", "slow"]);
}

// ============================================================================
// Filtering
// ============================================================================

fn tagged_catalog() -> TestCatalog {
    TestCatalog::new()
        .container(
            ContainerSpec::new("Mixed")
                .member(MemberSpec::test("fast", |_| Ok(())))
                .member(MemberSpec::test("slow", |_| Ok(())).tag("slow")),
        )
        .container(ContainerSpec::new("AllSlow").tag("slow").test("crawl", |_| Ok(())))
}

#[test]
fn test_exclude_tag_removes_tests_and_prunes_empty_containers() {
    let engine = engine_with(tagged_catalog(), EngineConfig::new().with_exclude_tag("slow"));
    let request = DiscoveryRequest::new()
        .select(Selector::container("Mixed"))
        .select(Selector::container("AllSlow"));
    let discovery = engine.discover(&request).unwrap();

    assert_eq!(discovery.filtered.tests_removed, 2);
    assert_eq!(discovery.filtered.containers_pruned, 1);
    insta::assert_snapshot!("exclude_slow_outline", discovery.tree.outline());
}

#[test]
fn test_include_tag_keeps_only_tagged_tests() {
    let engine = engine_with(tagged_catalog(), EngineConfig::new().with_include_tag("slow"));
    let request = DiscoveryRequest::new()
        .select(Selector::container("Mixed"))
        .select(Selector::container("AllSlow"));
    let discovery = engine.discover(&request).unwrap();
    let tree = &discovery.tree;

    assert_eq!(discovery.filtered.tests_removed, 1);
    assert!(tree.lookup(&id("engine:trellis,container:Mixed,member:slow()")).is_some());
    assert!(tree.lookup(&id("engine:trellis,container:AllSlow,member:crawl()")).is_some());
    assert!(tree.lookup(&id("engine:trellis,container:Mixed,member:fast()")).is_none());
}

#[test]
fn test_name_filter_matches_display_name() {
    let engine = engine_with(local_test_case(), EngineConfig::new().with_name_filter("test2"));
    let discovery = engine
        .discover(&DiscoveryRequest::new().select(Selector::container("LocalTestCase")))
        .unwrap();

    assert_eq!(discovery.filtered.tests_removed, 2);
    assert_eq!(discovery.tree.descendants(discovery.tree.root()).len(), 2);
}

#[test]
fn test_custom_engine_id_prefixes_every_id() {
    let engine = engine_with(local_test_case(), EngineConfig::new().with_engine_id("custom"));
    let discovery = engine
        .discover(&DiscoveryRequest::new().select(Selector::unique_id("engine:custom,container:LocalTestCase")))
        .unwrap();
    let tree = &discovery.tree;

    assert!(discovery.report.is_clean());
    assert_eq!(tree.descendants(tree.root()).len(), 4);
    for node in tree.descendants(tree.root()) {
        assert!(tree.get(node).unwrap().unique_id().is_descendant_of(&id("engine:custom")));
    }
}

// ============================================================================
// Properties
// ============================================================================

const MEMBERS: [&str; 3] = ["test1()", "test2()", "test3()"];

fn unique_ids(discovery: &Discovery) -> Vec<String> {
    let tree = &discovery.tree;
    let mut ids: Vec<String> = tree
        .descendants(tree.root())
        .into_iter()
        .map(|n| tree.get(n).unwrap().unique_id().to_string())
        .collect();
    ids.sort();
    ids
}

proptest! {
    /// Any mix of member selectors, duplicates included, yields each selected member exactly once.
    #[test]
    fn prop_member_selection_is_idempotent(picks in prop::collection::vec(0usize..3, 1..8)) {
        let selectors = picks
            .iter()
            .map(|i| Selector::member("LocalTestCase", MEMBERS[*i]))
            .collect();
        let discovery = discover(local_test_case(), selectors);
        let tree = &discovery.tree;

        let mut distinct = picks.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(tree.descendants(tree.root()).len(), distinct.len() + 1);
        prop_assert!(discovery.report.is_clean());
    }

    /// Adding the container selector to any member selection gives the same nodes as the container alone.
    #[test]
    fn prop_container_absorbs_member_selections(
        picks in prop::collection::vec(0usize..3, 0..5),
        container_first in any::<bool>(),
    ) {
        let mut selectors: Vec<Selector> = picks
            .iter()
            .map(|i| Selector::member("LocalTestCase", MEMBERS[*i]))
            .collect();
        if container_first {
            selectors.insert(0, Selector::container("LocalTestCase"));
        } else {
            selectors.push(Selector::container("LocalTestCase"));
        }
        let combined = discover(local_test_case(), selectors);
        let alone = discover(local_test_case(), vec![Selector::container("LocalTestCase")]);

        prop_assert_eq!(unique_ids(&combined), unique_ids(&alone));
    }
}
