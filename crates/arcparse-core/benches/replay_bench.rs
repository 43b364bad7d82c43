use criterion::{black_box, criterion_group, criterion_main, Criterion};
use arcparse_core::{compute_heads, compute_tree, Corpus, Vocabulary};

const CORPUS: &str = "\
[][The-DT, quick-JJ, brown-JJ, fox-NN, jumps-VBZ, over-IN, the-DT, lazy-JJ, dog-NN, .-., ROOT-ROOT]
SHIFT
SHIFT
SHIFT
SHIFT
LEFT-ARC(amod)
LEFT-ARC(amod)
LEFT-ARC(det)
SHIFT
LEFT-ARC(nsubj)
SHIFT
SHIFT
SHIFT
SHIFT
LEFT-ARC(amod)
LEFT-ARC(det)
LEFT-ARC(case)
RIGHT-ARC(obl)
SHIFT
RIGHT-ARC(punct)
SHIFT
LEFT-ARC(root)
";

fn bench_replay(c: &mut Criterion) {
    let mut vocab = Vocabulary::new();
    let corpus = Corpus::read_training(CORPUS.as_bytes(), &mut vocab).unwrap();
    let sentence = corpus.get(0).unwrap();

    c.bench_function("compute_heads_11_tokens", |b| {
        b.iter(|| {
            compute_heads(
                black_box(sentence.len()),
                black_box(&sentence.actions),
                vocab.actions(),
            )
            .unwrap()
        });
    });

    c.bench_function("compute_tree_11_tokens", |b| {
        b.iter(|| {
            compute_tree(
                black_box(sentence.len()),
                black_box(&sentence.actions),
                vocab.actions(),
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
