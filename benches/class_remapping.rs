use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use srgremap::{ClassFile, ClassRewriter, MappingTable, SymbolResolver};

fn class_bytes() -> Vec<u8> {
    let mut class = ClassFile::new(0x21, "obf/c0", Some("obf/c1")).unwrap();
    for i in 0..50 {
        let owner = format!("obf/c{}", i % 10);
        class
            .constant_pool
            .add_method_ref(&owner, &format!("m{i}"), "(Lobf/c2;)V")
            .unwrap();
        class
            .constant_pool
            .add_field_ref(&owner, &format!("f{i}"), "Lobf/c3;")
            .unwrap();
        class.add_field(0x0002, &format!("f{i}"), "Lobf/c4;").unwrap();
        class.add_method(0x0001, &format!("m{i}"), "(Lobf/c2;)V", None).unwrap();
    }
    class.to_bytes().unwrap()
}

fn table() -> MappingTable {
    let mut source = String::new();
    for class in 0..10 {
        source.push_str(&format!("CL: obf/c{class} net/example/Class{class}\n"));
        for member in 0..50 {
            source.push_str(&format!(
                "FD: obf/c{class}/f{member} net/example/Class{class}/field{member}\n"
            ));
            source.push_str(&format!(
                "MD: obf/c{class}/m{member} (Lobf/c2;)V net/example/Class{class}/method{member} (Lnet/example/Class2;)V\n"
            ));
        }
    }
    source.parse().unwrap()
}

fn criterion_benchmark(c: &mut Criterion) {
    let data = class_bytes();
    let rewriter = ClassRewriter::new(SymbolResolver::new(Arc::new(table())));
    c.bench_function("class decode", |b| {
        b.iter(|| ClassFile::parse(black_box(&data)).unwrap())
    });
    c.bench_function("class rewrite", |b| {
        b.iter(|| rewriter.rewrite(black_box(&data)).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(25);
    targets = criterion_benchmark
}
criterion_main!(benches);
