//! End-to-end scenarios exercising the planner and executor together,
//! driven entirely through [`fetch_core`]'s public combinators.

use std::sync::Arc;

use fetch_core::{product, request, sequence, traverse, FetchAst};
use fetch_harness::MapSource;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(
            "fetch_core=debug".parse().expect("static directive parses"),
        ))
        .try_init();
}

fn one_src() -> Arc<MapSource<u32, i32>> {
    Arc::new(MapSource::new("one", [(1u32, 1i32), (2, 2), (3, 3), (4, 4)]))
}

fn many_src() -> Arc<MapSource<u32, Vec<i32>>> {
    Arc::new(MapSource::new("many", [(3u32, vec![0, 1, 2])]))
}

#[tokio::test]
async fn pure_value_takes_zero_rounds() {
    let ast: FetchAst<i32> = FetchAst::pure(42);
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, 42);
    assert_eq!(env.round_count(), 0);
}

#[tokio::test]
async fn mapped_pure_value_takes_zero_rounds() {
    // `map` always wraps `self` in a fresh `Bind` node, even when `self` is
    // already `Pure`. The run loop must not assume an empty frontier means
    // the ast is already a literal `Pure`/`Err`.
    let ast: FetchAst<i32> = FetchAst::pure(41).map(|x| x + 1);
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, 42);
    assert_eq!(env.round_count(), 0);
}

#[tokio::test]
async fn product_of_pure_values_takes_zero_rounds() {
    let ast = product(FetchAst::pure(1), FetchAst::pure(2));
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, (1, 2));
    assert_eq!(env.round_count(), 0);
}

#[tokio::test]
async fn sequence_of_pure_values_takes_zero_rounds() {
    let ast = sequence(vec![FetchAst::pure(1), FetchAst::pure(2), FetchAst::pure(3)]);
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, vec![1, 2, 3]);
    assert_eq!(env.round_count(), 0);
}

#[tokio::test]
async fn single_request_takes_one_round_one_batch_one_item() {
    let source = one_src();
    let ast = request(source, 1).map(|v| v + 1);
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, 2);
    assert_eq!(env.round_count(), 1);
    assert_eq!(env.rounds()[0].queries.len(), 1);
    assert_eq!(env.total_items_fetched(), 1);
}

#[tokio::test]
async fn dependent_requests_take_two_sequential_rounds() {
    init_tracing();
    let source = one_src();
    let ast = request(source.clone(), 1).flat_map(move |v| request(source.clone(), (v + 1) as u32));
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, 2);
    assert_eq!(env.round_count(), 2);
}

#[tokio::test]
async fn product_across_two_sources_shares_one_round() {
    init_tracing();
    let one = one_src();
    let many = many_src();
    let ast = product(request(one, 1), request(many, 3));
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, (1, vec![0, 1, 2]));
    assert_eq!(env.round_count(), 1);
    assert_eq!(env.rounds()[0].queries.len(), 2);
    for query in &env.rounds()[0].queries {
        assert_eq!(query.fetched.len(), 1);
    }
}

#[tokio::test]
async fn traverse_dedupes_identities_within_one_batch() {
    let source = one_src();
    let ast = traverse(vec![1u32, 1, 2], move |i| request(source.clone(), i));
    let (value, env) = fetch_core::run_env(ast).await.unwrap();

    assert_eq!(value, vec![1, 1, 2]);
    assert_eq!(env.round_count(), 1);
    assert_eq!(env.rounds()[0].queries.len(), 1);
    assert_eq!(env.total_items_fetched(), 2);
}

#[tokio::test]
async fn nested_products_against_one_source_collapse_to_one_batch() {
    let source = one_src();
    let ast = product(
        product(request(source.clone(), 1), product(request(source.clone(), 2), request(source.clone(), 3))),
        request(source, 4),
    );
    let (value, env) = fetch_core::run_env(ast).await.unwrap();
    let ((a, (b, c)), d) = value;

    assert_eq!((a, b, c, d), (1, 2, 3, 4));
    assert_eq!(env.round_count(), 1);
    assert_eq!(env.rounds()[0].queries.len(), 1);
    assert_eq!(env.total_items_fetched(), 4);
}

#[tokio::test]
async fn cache_is_monotonic_and_rerun_is_free() {
    let source = one_src();
    let ast = sequence(vec![request(source.clone(), 1), request(source.clone(), 2)]);
    let (value, env) = fetch_core::run_env(ast).await.unwrap();
    assert_eq!(value, vec![1, 2]);
    assert_eq!(env.round_count(), 1);

    let cache = env.into_cache();
    let config = fetch_core::RunConfig::new().with_cache(cache);
    let source = one_src();
    let ast2 = sequence(vec![request(source.clone(), 1), request(source, 2)]);
    let (value2, env2) = fetch_core::run_env_with(ast2, config).await.unwrap();

    assert_eq!(value2, vec![1, 2]);
    assert_eq!(env2.round_count(), 0);
}

#[tokio::test]
async fn not_found_surfaces_the_environment_so_far() {
    let source = one_src();
    let ast = request(source, 999);
    let err = fetch_core::run(ast).await.unwrap_err();

    match err {
        fetch_core::FetchError::NotFound { env, source, .. } => {
            assert_eq!(source.as_str(), "one");
            assert_eq!(env.round_count(), 1);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_identities_reported_for_a_many_query() {
    let source = one_src();
    let ast = traverse(vec![1u32, 999, 998], move |i| request(source.clone(), i));
    let err = fetch_core::run(ast).await.unwrap_err();

    match err {
        fetch_core::FetchError::MissingIdentities { missing, .. } => {
            let misses = missing.get(&fetch_core::SourceName::from("one")).unwrap();
            assert_eq!(misses.len(), 2);
        }
        other => panic!("expected MissingIdentities, got {other:?}"),
    }
}
