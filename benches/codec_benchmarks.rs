//! Performance benchmarks for the live bridge codec
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use base64::{Engine, engine::general_purpose::BASE64_STANDARD};
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use std::time::Duration;

use kirana_gateway::core::realtime::ServerEvent;
use kirana_gateway::core::realtime::gemini::ClientMessage;
use kirana_gateway::handlers::live::{decode_client_frame, encode_outbound_frame};

fn audio_frame_json(bytes: usize) -> String {
    let data = BASE64_STANDARD.encode(vec![0x11u8; bytes]);
    json!({
        "realtime_input": {
            "media_chunks": [{ "mime_type": "audio/pcm;rate=16000", "data": data }]
        }
    })
    .to_string()
}

/// Client frame decoding across typical microphone chunk sizes
fn bench_client_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_decode");
    group.measurement_time(Duration::from_secs(5));

    // 20ms, 100ms and 500ms of 16kHz 16-bit mono PCM
    for bytes in [640usize, 3_200, 16_000] {
        let frame = audio_frame_json(bytes);
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("audio_chunk", bytes), &frame, |b, msg| {
            b.iter(|| decode_client_frame(black_box(msg)));
        });
    }

    let text = json!({ "client_content": { "text": "How many bags of rice are left?" } }).to_string();
    group.bench_function("text_turn", |b| {
        b.iter(|| decode_client_frame(black_box(&text)));
    });

    group.finish();
}

/// Upstream event encoding towards the client
fn bench_outbound_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("outbound_encode");
    group.measurement_time(Duration::from_secs(5));

    // 100ms of 24kHz 16-bit mono PCM
    let audio = ServerEvent::AudioChunk {
        mime_type: "audio/pcm;rate=24000".to_string(),
        payload: Bytes::from(vec![0x22u8; 4_800]),
    };
    group.throughput(Throughput::Bytes(4_800));
    group.bench_function("audio_chunk", |b| {
        b.iter(|| encode_outbound_frame(black_box(&audio)));
    });

    let delta = ServerEvent::TextDelta {
        text: "You have 12 bags of basmati rice in stock.".to_string(),
    };
    group.bench_function("text_delta", |b| {
        b.iter(|| encode_outbound_frame(black_box(&delta)));
    });

    group.finish();
}

/// Full client-to-upstream translation of one audio frame
fn bench_client_to_upstream(c: &mut Criterion) {
    let frame = audio_frame_json(3_200);
    c.bench_function("client_to_upstream_audio", |b| {
        b.iter(|| {
            let frames = decode_client_frame(black_box(&frame)).unwrap_or_default();
            for frame in frames {
                let message = ClientMessage::from_frame(frame);
                black_box(serde_json::to_string(&message).unwrap_or_default());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_client_decode,
    bench_outbound_encode,
    bench_client_to_upstream
);
criterion_main!(benches);
