use agent_stream::vendor::openai::OpenAiDecoder;
use agent_stream::{FrameReader, StreamDecoder, ToolCallAccumulator};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

// OpenAI-style body: `deltas` text frames, then a finish frame and the sentinel
fn create_text_body(deltas: usize, delta_size: usize) -> Vec<u8> {
    let text = "a".repeat(delta_size);
    let mut body = String::new();
    for _ in 0..deltas {
        let chunk = json!({"choices": [{"delta": {"content": text}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    let finish = json!({"choices": [{"delta": {}, "finish_reason": "stop"}]});
    body.push_str(&format!("data: {finish}\n\ndata: [DONE]\n\n"));
    body.into_bytes()
}

// Split a body into fixed-size chunks, the way a socket hands them over
fn chunk(body: &[u8], size: usize) -> Vec<Vec<u8>> {
    body.chunks(size).map(|c| c.to_vec()).collect()
}

// Benchmark: frame reading with varying chunk sizes
fn bench_frame_reader_by_chunk_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_reader_by_chunk_size");
    let body = create_text_body(200, 20);

    for size in [1, 16, 256, 4096].iter() {
        let chunks = chunk(&body, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &chunks, |b, chunks| {
            b.iter(|| {
                let mut reader = FrameReader::new();
                let mut count = 0;
                for piece in chunks {
                    count += reader.push(black_box(piece)).len();
                }
                count += reader.finish().map_or(0, |_| 1);
                count
            });
        });
    }

    group.finish();
}

// Benchmark: frame reading plus decoding with varying stream lengths
fn bench_decode_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_stream");

    for deltas in [10, 100, 1000].iter() {
        let body = create_text_body(*deltas, 8);
        group.bench_with_input(BenchmarkId::from_parameter(deltas), &body, |b, body| {
            b.iter(|| {
                let mut reader = FrameReader::new();
                let mut decoder = OpenAiDecoder::new();
                let mut events = 0;
                for frame in reader.push(black_box(body)) {
                    events += decoder.decode(&frame).map_or(0, |e| e.len());
                }
                events
            });
        });
    }

    group.finish();
}

// Benchmark: tool-call reassembly with varying fragment counts
fn bench_accumulator_fragments(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator_fragments");

    for fragments in [4, 64, 512].iter() {
        // Arguments split into `fragments` pieces for each of three interleaved calls
        let arguments = json!({"query": "x".repeat(*fragments)}).to_string();
        let step = arguments.len().div_ceil(*fragments).max(1);
        let pieces: Vec<String> = arguments
            .as_bytes()
            .chunks(step)
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(fragments),
            &pieces,
            |b, pieces| {
                b.iter(|| {
                    let mut acc = ToolCallAccumulator::new();
                    for index in 0..3u32 {
                        acc.push(index, Some("call"), Some("search"), None);
                    }
                    for piece in pieces {
                        for index in 0..3u32 {
                            acc.push(index, None, None, Some(black_box(piece)));
                        }
                    }
                    acc.get_tool_calls().map_or(0, |calls| calls.len())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_reader_by_chunk_size,
    bench_decode_stream,
    bench_accumulator_fragments,
);
criterion_main!(benches);
