use criterion::{black_box, criterion_group, criterion_main, Criterion};
use srgremap::{LoadOptions, MappingLoader, MappingTable, SrgMapping};

fn mapping_source() -> String {
    let mut source = String::from("PK: obf/ net/example/\n");
    for class in 0..500 {
        source.push_str(&format!("CL: obf/c{class} net/example/Class{class}\n"));
        for member in 0..10 {
            source.push_str(&format!(
                "FD: obf/c{class}/f{member} net/example/Class{class}/field{member}\n"
            ));
            source.push_str(&format!(
                "MD: obf/c{class}/m{member} (Lobf/c{member};)V net/example/Class{class}/method{member} (Lnet/example/Class{member};)V\n"
            ));
        }
    }
    source
}

fn criterion_benchmark(c: &mut Criterion) {
    let source = mapping_source();
    c.bench_function("srg records", |b| {
        b.iter(|| SrgMapping::new(black_box(&source)).summary())
    });
    c.bench_function("srg load", |b| {
        b.iter(|| black_box(&source).parse::<MappingTable>().unwrap())
    });
    let reverse = MappingLoader::new(LoadOptions::default().reverse(true));
    c.bench_function("srg load reversed", |b| {
        b.iter(|| reverse.load_str(black_box(&source)).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(25);
    targets = criterion_benchmark
}
criterion_main!(benches);
