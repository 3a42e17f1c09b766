//! Benchmark for VM throughput on a loop of ten thousand hash operations.

use alloy::primitives::Address;
use argus_common::utils::strings::decode_hex;
use argus_vm::core::vm::VM;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// PUSH2 10000, loop { SHA3(0, 32), POP, counter - 1, JUMPI }
const HASH_LOOP: &str = "0x6127105b60205f205060019003806003570000";

fn bench_hash_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("argus_vm");
    let bytecode = decode_hex(HASH_LOOP).expect("invalid bytecode");

    group.sample_size(50);
    group.bench_function(BenchmarkId::from_parameter("ten_thousand_hashes"), |b| {
        b.iter(|| {
            let mut vm = VM::new(&bytecode, &[], Address::default());
            let result = vm.execute(usize::MAX);
            assert!(result.exit.is_success());
            result.steps
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hash_loop);
criterion_main!(benches);
