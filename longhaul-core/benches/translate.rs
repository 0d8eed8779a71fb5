use criterion::{black_box, criterion_group, criterion_main, Criterion};

use longhaul_core::protocol::{
    AspectRatio, SafeSearch, SearchRequest, TimeRange, TranscriptionRequest, UnifiedRequest,
    VideoRequest,
};
use longhaul_core::providers::brave::types::BraveResponse;
use longhaul_core::providers::{assemble, translate, ProviderKind, ProviderResult};

fn bench_translate(c: &mut Criterion) {
    let video: UnifiedRequest = VideoRequest::from_image_url("https://cdn.example.com/still.png")
        .with_prompt("slow dolly zoom across a foggy harbour at dawn")
        .with_seed(42)
        .with_aspect_ratio(AspectRatio::Landscape)
        .with_duration(10)
        .into();
    let transcription: UnifiedRequest =
        TranscriptionRequest::from_url("https://cdn.example.com/interview.wav")
            .with_language("en-US")
            .with_diarization(true)
            .into();
    let search: UnifiedRequest = SearchRequest::new("durable async workflows in rust")
        .with_max_results(20)
        .with_safe_search(SafeSearch::Moderate)
        .with_time_range(TimeRange::Month)
        .into();

    let mut group = c.benchmark_group("translate");
    group.bench_function("runway", |b| {
        b.iter(|| translate(black_box(&video), ProviderKind::Runway.descriptor()))
    });
    group.bench_function("azure", |b| {
        b.iter(|| translate(black_box(&transcription), ProviderKind::Azure.descriptor()))
    });
    group.bench_function("brave", |b| {
        b.iter(|| translate(black_box(&search), ProviderKind::Brave.descriptor()))
    });
    group.bench_function("rejected", |b| {
        b.iter(|| translate(black_box(&search), ProviderKind::Runway.descriptor()))
    });
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let results: Vec<_> = (0..20)
        .map(|i| {
            serde_json::json!({
                "title": format!("Result {}", i),
                "url": format!("https://example.com/{}", i),
                "description": "a snippet of moderate length describing the page",
                "age": "3 days ago"
            })
        })
        .collect();
    let response: BraveResponse = serde_json::from_value(serde_json::json!({
        "type": "search",
        "query": { "original": "rust", "more_results_available": true },
        "web": { "results": results }
    }))
    .expect("valid brave fixture");
    let raw = ProviderResult::Brave(response);

    c.bench_function("assemble/brave_page", |b| b.iter(|| assemble(black_box(&raw))));
}

criterion_group!(benches, bench_translate, bench_assemble);
criterion_main!(benches);
