//! Shared helpers for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use trellis::extension::{ExtensionContext, FnParameterResolver, ParameterContext, ParameterResolver};
use trellis::{
    DiscoveryRequest, Engine, EngineConfig, EventRecorder, ExecutionSummary, Selector, TestCatalog, Value, ValueType,
};

/// Install a test-friendly subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn engine(catalog: TestCatalog) -> Engine {
    engine_with(catalog, EngineConfig::new())
}

pub fn engine_with(catalog: TestCatalog, config: EngineConfig) -> Engine {
    init_tracing();
    Engine::new(catalog, config).unwrap()
}

/// Discover and execute every test of `container`.
pub fn execute_container(catalog: TestCatalog, container: &str) -> (EventRecorder, ExecutionSummary) {
    let engine = engine(catalog);
    let mut recorder = EventRecorder::new();
    let request = DiscoveryRequest::new().select(Selector::container(container));
    let (_, summary) = engine.run(&request, &mut recorder).unwrap();
    (recorder, summary)
}

/// Value type and qualifier used by the sample resolvers.
pub const CUSTOM_TYPE: &str = "CustomType";
pub const CUSTOM_ANNOTATION: &str = "custom-annotation";

/// Payload of a `CustomType` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomType(pub &'static str);

/// Supplies `CustomType` inputs.
pub fn custom_type_resolver() -> Arc<dyn ParameterResolver> {
    Arc::new(FnParameterResolver::new(
        "CustomTypeParameterResolver",
        |p: &ParameterContext<'_>| p.param.ty == ValueType::custom(CUSTOM_TYPE),
        |_: &ParameterContext<'_>, _: &ExtensionContext| Ok(Value::custom(CUSTOM_TYPE, CustomType("injected"))),
    ))
}

/// Supplies every input carrying the custom annotation, whatever its type.
pub fn custom_annotation_resolver() -> Arc<dyn ParameterResolver> {
    Arc::new(FnParameterResolver::new(
        "CustomAnnotationParameterResolver",
        |p: &ParameterContext<'_>| p.param.has_qualifier(CUSTOM_ANNOTATION),
        |_: &ParameterContext<'_>, _: &ExtensionContext| Ok(Value::from("enigma")),
    ))
}

/// Claims every numeric input and always produces the integer 42.
pub fn number_resolver() -> Arc<dyn ParameterResolver> {
    Arc::new(FnParameterResolver::new(
        "NumberParameterResolver",
        |p: &ParameterContext<'_>| matches!(p.param.ty, ValueType::Number | ValueType::Int | ValueType::Float),
        |_: &ParameterContext<'_>, _: &ExtensionContext| Ok(Value::Int(42)),
    ))
}
