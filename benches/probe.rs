use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use exeprobe::{collect_sections, inspect_path, ProbeConfig, Prober};

#[path = "../tests/common/mod.rs"]
mod common;

use common::*;

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    let elf_sections: Vec<_> = (0..32)
        .map(|i| SectionSpec::elf(".text", SHF_ALLOC | SHF_EXECINSTR, 0x1000 + i * 0x100, 0x100))
        .collect();
    let pe_sections: Vec<_> = (0..32)
        .map(|i| SectionSpec::pe(".data", SCN_MEM_READ | SCN_MEM_WRITE, 0x1000 + i * 0x100, 0x100))
        .collect();
    vec![
        ("elf32", build_elf(false, &elf_sections)),
        ("elf64", build_elf(true, &elf_sections)),
        ("pe64", build_pe(true, &pe_sections)),
        ("unknown", vec![0x90; 0x3000]),
    ]
}

fn bench_probe_and_enumerate(c: &mut Criterion) {
    let prober = Prober::default();
    let mut group = c.benchmark_group("probe");

    for (name, data) in fixtures() {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| match prober.probe(black_box(&data)) {
                Ok(object) => collect_sections(&object).map(|s| s.len()).unwrap_or(0),
                Err(_) => 0,
            })
        });
    }
    group.finish();
}

fn bench_inspect_path(c: &mut Criterion) {
    let file = temp_file_with(&text_and_data_elf64());
    let config = ProbeConfig::default();

    c.bench_function("inspect_path/elf64", |b| {
        b.iter(|| {
            let summary = inspect_path(file.path(), &config, |record| {
                black_box(record);
                Ok(())
            })
            .expect("fixture inspects cleanly");
            black_box(summary)
        })
    });
}

criterion_group!(benches, bench_probe_and_enumerate, bench_inspect_path);
criterion_main!(benches);
