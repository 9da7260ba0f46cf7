use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mython::lexer;

fn sample_program(classes: usize) -> String {
    let mut source = String::new();
    for i in 0..classes {
        source.push_str(&format!(
            "class Point{i}:\n  \
             def __init__(self, x, y):\n    \
             self.x = x\n    \
             self.y = y\n\n  \
             def norm(self):\n    \
             return self.x * self.x + self.y * self.y\n\n\
             p = Point{i}(1, 2)\n\
             print p.norm()  # squared length\n"
        ));
    }
    source
}

fn bench_frontend(c: &mut Criterion) {
    let source = sample_program(64);

    c.bench_function("frontend_tokenize", |b| {
        b.iter(|| {
            let out = lexer::tokenize(black_box(&source)).expect("tokenize");
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
