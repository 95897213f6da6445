use criterion::{black_box, criterion_group, criterion_main, Criterion};
use s7_session::{decode, encode, layout, translate, Area, EngineCall, Values, WordLen};

fn bench_layout(c: &mut Criterion) {
    c.bench_function("layout_db_real_100", |b| {
        b.iter(|| layout(black_box(Area::DataBlock(1)), black_box(WordLen::Real), black_box(100)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let words = Values::Words((0..240u16).collect());
    let reals = Values::Reals((0..120).map(|i| i as f32 * 0.5).collect());

    c.bench_function("encode_words_240", |b| {
        b.iter(|| encode(black_box(&words), WordLen::Word))
    });
    c.bench_function("encode_reals_120", |b| {
        b.iter(|| encode(black_box(&reals), WordLen::Real))
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes: Vec<u8> = (0..480u32).map(|i| i as u8).collect();

    c.bench_function("decode_words_240", |b| {
        b.iter(|| decode(black_box(&bytes), WordLen::Word, 240))
    });
    c.bench_function("decode_dwords_120", |b| {
        b.iter(|| decode(black_box(&bytes), WordLen::DWord, 120))
    });
}

fn bench_translate(c: &mut Criterion) {
    c.bench_function("translate_cli_code", |b| {
        b.iter(|| translate(black_box(0x0090_0000), EngineCall::Read))
    });
}

criterion_group!(benches, bench_layout, bench_encode, bench_decode, bench_translate);
criterion_main!(benches);
