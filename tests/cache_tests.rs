use std::{sync::Arc, thread};

use expressive::{
    CacheStats, CompilationCache, CompileOptions, Engine, Error, ModelType, NumericKind, Record, Toolchain, ValueType,
};

fn person_model() -> Arc<ModelType> {
    ModelType::builder("Person")
        .field("Name", ValueType::String)
        .field("Age", ValueType::Number(NumericKind::I32))
        .build()
}

fn person(model: &Arc<ModelType>, age: i32) -> Record {
    Record::builder(model).set("Name", "Ann").set("Age", age).build().unwrap()
}

#[test]
fn test_second_lookup_is_a_hit() {
    let cache = CompilationCache::new();
    let model = person_model();
    let toolchain = Toolchain::new();

    let first = cache
        .get_or_compile(&model, "Age >= 18", &toolchain, CompileOptions::default())
        .unwrap();
    let second = cache
        .get_or_compile(&model, "Age >= 18", &toolchain, CompileOptions::default())
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        cache.stats(),
        CacheStats {
            entries: 1,
            hits: 1,
            misses: 1,
            compilations: 1,
        }
    );
}

#[test]
fn test_key_includes_model_and_case_sensitivity() {
    let cache = CompilationCache::new();
    let toolchain = Toolchain::new();
    let a = person_model();
    let b = person_model();

    cache.get_or_compile(&a, "Age > 1", &toolchain, CompileOptions::default()).unwrap();
    cache.get_or_compile(&b, "Age > 1", &toolchain, CompileOptions::default()).unwrap();
    cache.get_or_compile(&a, "Age > 1", &toolchain, CompileOptions::ignore_case()).unwrap();
    cache.get_or_compile(&a, "Age > 2", &toolchain, CompileOptions::default()).unwrap();

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_failed_compilation_is_not_cached() {
    let cache = CompilationCache::new();
    let model = person_model();
    let toolchain = Toolchain::new();

    for _ in 0..2 {
        let error = cache
            .get_or_compile(&model, "Height > 1", &toolchain, CompileOptions::default())
            .unwrap_err();
        assert!(matches!(error, Error::Resolution { .. }));
    }
    assert!(cache.is_empty());
    assert_eq!(cache.stats().misses, 2);
    assert_eq!(cache.stats().compilations, 0);
}

#[test]
fn test_evict_and_clear() {
    let cache = CompilationCache::new();
    let model = person_model();
    let toolchain = Toolchain::new();

    cache.get_or_compile(&model, "Age > 1", &toolchain, CompileOptions::default()).unwrap();
    cache.get_or_compile(&model, "Age > 1", &toolchain, CompileOptions::ignore_case()).unwrap();
    cache.get_or_compile(&model, "Age > 2", &toolchain, CompileOptions::default()).unwrap();

    assert!(cache.evict(&model, "Age > 1"));
    assert!(!cache.evict(&model, "Age > 1"));
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_first_use_yields_one_predicate() {
    let cache = CompilationCache::new();
    let model = person_model();
    let toolchain = Toolchain::new();

    let predicates: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    cache
                        .get_or_compile(&model, "Age >= 18 && Name != null", &toolchain, CompileOptions::default())
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(predicates.iter().all(|p| Arc::ptr_eq(p, &predicates[0])));
    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits + stats.misses, 8);
    assert!(stats.compilations >= 1);
}

#[test]
fn test_predicates_evaluate_from_many_threads() {
    let engine = Engine::new();
    let model = person_model();
    let predicate = engine.compile(&model, "Age >= 18").unwrap();

    thread::scope(|scope| {
        for age in [10, 17, 18, 40] {
            let predicate = predicate.clone();
            let record = person(&model, age);
            scope.spawn(move || assert_eq!(predicate.evaluate(&record), age >= 18));
        }
    });
}

#[test]
fn test_engine_uses_its_toolchain_and_options() {
    let engine = Engine::with_toolchain(Toolchain::empty()).with_options(CompileOptions::ignore_case());
    let model = person_model();

    assert!(engine.evaluate(&model, "age > 1", &person(&model, 5)).unwrap());
    assert!(matches!(
        engine.compile(&model, "Trim(Name) == 'Ann'"),
        Err(Error::UnresolvedFunction { .. })
    ));
    assert!(engine.toolchain().signatures().is_empty());
    assert!(!engine.options().case_sensitive);
}
