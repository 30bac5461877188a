//! Benchmarks for `PluginRegistry::resolve` and batch loading.
//!
//! Measures URL resolution across a registry of site handlers backed by
//! the builtin `hls`, `dash` and `http` fallbacks.
//!
//! Run with: `cargo bench --bench resolve_bench`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tapline::plugin::{builtin, Handler, HttpHandler};
use tapline::{Matchers, PluginRegistry};

// ---------------------------------------------------------------------------
// URL datasets
// ---------------------------------------------------------------------------

/// URLs claimed by a site handler.
const SITE_URLS: &[&str] = &[
    "https://site-3.example/watch/12345",
    "https://www.site-17.example/watch/987",
    "https://site-31.example/watch/1",
];

/// URLs only a fallback handler claims.
const FALLBACK_URLS: &[&str] = &[
    "https://cdn.example/live/master.m3u8",
    "https://cdn.example/vod/manifest.mpd",
    "https://cdn.example/files/clip.mp4?token=abc",
    "httpstream://cdn.example/raw",
];

/// URLs nothing claims.
const NON_MATCHING_URLS: &[&str] = &[
    "https://example.com/page",
    "https://docs.rs/tokio/latest/tokio/",
    "ftp://files.example/pub/archive.tar",
    "https://site-3.example/about",
];

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

fn site_handlers(count: usize) -> Vec<(String, Arc<dyn Handler>)> {
    (0..count)
        .map(|i| {
            let pattern = format!(r"^https?://(?:www\.)?site-{i}\.example/watch/(?P<id>\d+)");
            let matchers = Matchers::from_patterns([pattern]).unwrap();
            let handler: Arc<dyn Handler> = Arc::new(HttpHandler::new(matchers));
            (format!("site_{i}"), handler)
        })
        .collect()
}

/// Builtins and sites loaded as one batch, the way a session loads them.
fn registry(sites: usize) -> PluginRegistry {
    let registry = PluginRegistry::new();
    let mut batch = builtin::handlers();
    batch.extend(site_handlers(sites));
    registry.load(batch);
    registry
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let registry = registry(40);

    group.bench_function("site_hit", |b| {
        b.iter(|| {
            for url in SITE_URLS {
                black_box(registry.resolve(black_box(url)));
            }
        });
    });

    group.bench_function("fallback_hit", |b| {
        b.iter(|| {
            for url in FALLBACK_URLS {
                black_box(registry.resolve(black_box(url)));
            }
        });
    });

    group.bench_function("full_miss_scan", |b| {
        b.iter(|| {
            for url in NON_MATCHING_URLS {
                black_box(registry.resolve(black_box(url)));
            }
        });
    });

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    group.bench_function("builtin_batch", |b| {
        b.iter(|| {
            let registry = PluginRegistry::new();
            black_box(registry.load(builtin::handlers()));
        });
    });

    group.bench_function("forty_sites_over_builtin", |b| {
        b.iter(|| black_box(registry(40)));
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_load);
criterion_main!(benches);
