use criterion::{criterion_group, criterion_main, Criterion};
use kpr::Journal;
use std::fmt::Write;

fn synthetic_journal(days: u32) -> String {
    let mut text = String::from("unit USD 100\nunit JPY 1\n");
    for day in 0..days {
        writeln!(
            text,
            "tx 2020-{:02}-{:02} \"day {}\"\n\
             Expenses:Food {}.25 USD\n\
             Assets:Cash\n\
             end",
            day / 28 % 12 + 1,
            day % 28 + 1,
            day,
            day % 90 + 1,
        )
        .unwrap();
    }
    text
}

fn criterion_benchmark(c: &mut Criterion) {
    let text = synthetic_journal(2000);
    let inputs = vec![("bench.kpr".to_string(), text)];
    c.bench_function("Compile journal", |b| {
        b.iter(|| Journal::compile(&inputs, None))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
