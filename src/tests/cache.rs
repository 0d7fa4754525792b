use super::*;
use crate::cache::{BetaCache, CorrelationCache, Drift, EngineConfig};
use crate::error::{ConfigError, EngineError, MergeError};
use crate::types::PriceSample;
use crate::types::{Benchmark, BetaColumn, BetaConfig, BetaMethod};

#[test]
fn incremental_updates_match_one_shot_update() {
    let config = correlation_config(4, vec![0, 1], &["X"], &["Y"]);

    let mut incremental = CorrelationCache::new();
    incremental
        .update(
            &config,
            &price_map(vec![
                ("X", prices(0, &X_CLOSES[..4])),
                ("Y", prices(0, &Y_CLOSES[..4])),
            ]),
        )
        .expect("first update should succeed");
    // overlapping tails: ts 2 and 3 were already consumed
    let stepped = incremental
        .update(
            &config,
            &price_map(vec![
                ("X", prices(2, &X_CLOSES[2..])),
                ("Y", prices(2, &Y_CLOSES[2..])),
            ]),
        )
        .expect("second update should succeed");

    let mut one_shot = CorrelationCache::new();
    let full = one_shot
        .update(
            &config,
            &price_map(vec![("X", prices(0, &X_CLOSES)), ("Y", prices(0, &Y_CLOSES))]),
        )
        .expect("update should succeed");

    assert_eq!(stepped.ts_ns, Some(6));
    assert_eq!(full.ts_ns, Some(6));
    assert_eq!(incremental.checkpoint(), Some(6));
    for lag in [0, 1] {
        let a = stepped.get(lag, "X", "Y").expect("incremental value");
        let b = full.get(lag, "X", "Y").expect("one-shot value");
        assert!(approx_eq(a, b), "lag {lag}: {a} vs {b}");
    }
}

#[test]
fn identical_paths_correlate_perfectly() {
    let config = correlation_config(5, vec![0], &["X"], &["Y"]);
    let mut cache = CorrelationCache::new();
    let frame = cache
        .update(
            &config,
            &price_map(vec![("X", prices(0, &X_CLOSES)), ("Y", prices(0, &X_CLOSES))]),
        )
        .expect("update should succeed");
    let corr = frame.get(0, "X", "Y").expect("lag 0 value");
    assert!(approx_eq(corr, 1.0), "corr={corr}");
}

#[test]
fn grown_universe_keeps_existing_pairs() {
    let base = correlation_config(4, vec![0], &["A", "B"], &["Y"]);
    let mut cache = CorrelationCache::new();
    cache
        .update(
            &base,
            &price_map(vec![
                ("A", prices(0, &X_CLOSES[..6])),
                ("B", prices(0, &Y_CLOSES[..6])),
                ("Y", prices(0, &Y_CLOSES[..6])),
            ]),
        )
        .expect("update should succeed");
    let engine = cache.engine().expect("engine built");
    assert_eq!(engine.pair("Y", "A").map(|p| p.count()), Some(4));

    let grown = correlation_config(4, vec![0], &["A", "B", "C"], &["Y"]);
    assert_eq!(cache.prepare(&grown), Ok(Drift::UniverseGrew));
    let engine = cache.engine().expect("engine kept");
    assert_eq!(engine.pair("Y", "A").map(|p| p.count()), Some(4));
    assert_eq!(engine.pair("Y", "C").map(|p| p.count()), Some(0));
    assert_eq!(cache.checkpoint(), Some(5));

    let more = [104.0, 101.0, 99.5, 102.5, 100.0];
    cache
        .update(
            &grown,
            &price_map(vec![
                ("A", prices(5, &more)),
                ("B", prices(5, &more)),
                ("C", prices(5, &more)),
                ("Y", prices(5, &more)),
            ]),
        )
        .expect("update should succeed");
    // C's first price only seeds its transformer; ts 6..=9 produce returns
    let engine = cache.engine().expect("engine kept");
    assert_eq!(engine.pair("Y", "C").map(|p| p.count()), Some(4));
    assert_eq!(cache.checkpoint(), Some(9));
}

#[test]
fn parameter_change_rebuilds_everything() {
    let base = correlation_config(4, vec![0], &["A", "B"], &["Y"]);
    let mut cache = CorrelationCache::new();
    assert_eq!(cache.prepare(&base), Ok(Drift::Full));
    cache
        .update(
            &base,
            &price_map(vec![("A", prices(0, &X_CLOSES)), ("Y", prices(0, &Y_CLOSES))]),
        )
        .expect("update should succeed");
    assert_eq!(cache.prepare(&base), Ok(Drift::None));

    let rewindowed = correlation_config(6, vec![0], &["A", "B"], &["Y"]);
    assert_eq!(cache.prepare(&rewindowed), Ok(Drift::Full));
    let engine = cache.engine().expect("engine rebuilt");
    assert_eq!(engine.window(), 6);
    assert_eq!(engine.pair("Y", "A").map(|p| p.count()), Some(0));
    assert_eq!(cache.checkpoint(), None);

    let shrunk = correlation_config(6, vec![0], &["A"], &["Y"]);
    assert_eq!(cache.prepare(&shrunk), Ok(Drift::Full));
    assert!(cache.engine().expect("engine rebuilt").pair("Y", "B").is_none());
}

#[test]
fn invalid_config_keeps_cached_state() {
    let config = correlation_config(4, vec![0], &["X"], &["Y"]);
    let mut cache = CorrelationCache::new();
    cache
        .update(
            &config,
            &price_map(vec![("X", prices(0, &X_CLOSES)), ("Y", prices(0, &Y_CLOSES))]),
        )
        .expect("update should succeed");

    let broken = correlation_config(0, vec![0], &["X"], &["Y"]);
    let err = cache
        .update(&broken, &BTreeMap::new())
        .expect_err("zero window must be rejected");
    assert_eq!(err, EngineError::Config(ConfigError::ZeroWindow));
    assert_eq!(cache.checkpoint(), Some(6));
    assert_eq!(cache.fingerprint(), Some(&config.fingerprint()));
}

#[test]
fn beta_cache_tracks_benchmark_twin() {
    let config = BetaConfig {
        timeframe_ns: 1,
        ..BetaConfig::new(
            3,
            BetaMethod::Both,
            Benchmark::Single("M".to_string()),
            ids(&["M", "A"]),
        )
    };
    let closes = [100.0, 102.0, 101.0, 104.0, 103.0, 106.0];
    let mut cache = BetaCache::new();
    let table = cache
        .update(
            &config,
            &price_map(vec![("M", prices(0, &closes)), ("A", prices(0, &closes))]),
        )
        .expect("update should succeed");

    assert_eq!(table.ts_ns, Some(5));
    assert_eq!(table.rows.len(), 1);
    let cov = table.get("A", BetaColumn::Covariance).expect("covariance beta");
    let reg = table.get("A", BetaColumn::Regression).expect("regression beta");
    assert!(approx_eq(cov, 1.0), "cov beta={cov}");
    assert!(approx_eq(reg, 1.0), "reg beta={reg}");
}

#[test]
fn unfilled_window_serializes_as_null() {
    let config = BetaConfig {
        timeframe_ns: 1,
        ..BetaConfig::new(
            10,
            BetaMethod::Covariance,
            Benchmark::Single("M".to_string()),
            ids(&["M", "A"]),
        )
    };
    let closes = [100.0, 102.0, 101.0];
    let mut cache = BetaCache::new();
    let table = cache
        .update(
            &config,
            &price_map(vec![("M", prices(0, &closes)), ("A", prices(0, &closes))]),
        )
        .expect("update should succeed");
    assert_eq!(table.get("A", BetaColumn::Covariance), None);
    let json = table.to_json().expect("table should serialize");
    assert!(json.contains("\"values\":[null]"), "json={json}");
}

#[test]
fn backwards_price_tail_is_rejected_untouched() {
    let config = correlation_config(4, vec![0], &["X"], &["Y"]);
    let scrambled: Vec<PriceSample> = [(0, 100.0), (5, 101.0), (3, 99.0), (6, 102.0)]
        .into_iter()
        .map(|(ts_ns, close)| PriceSample::new(ts_ns, close))
        .collect();
    let mut cache = CorrelationCache::new();
    let err = cache
        .update(
            &config,
            &price_map(vec![("X", scrambled.clone()), ("Y", scrambled)]),
        )
        .expect_err("out-of-order tail must fail");
    assert_eq!(
        err,
        EngineError::Merge(MergeError::NonMonotonicSeries {
            asset: "X".to_string(),
            prev_ts_ns: 5,
            ts_ns: 3,
        })
    );
    assert_eq!(cache.checkpoint(), None);

    // nothing was consumed, so a clean tail from ts 0 still fits fully
    let frame = cache
        .update(
            &config,
            &price_map(vec![("X", prices(0, &X_CLOSES)), ("Y", prices(0, &Y_CLOSES))]),
        )
        .expect("update should succeed");
    assert_eq!(frame.ts_ns, Some(6));
    let engine = cache.engine().expect("engine built");
    assert_eq!(engine.pair("Y", "X").map(|p| p.count()), Some(4));
}
