// Ledger benchmarks for Tessera.
//
// Covers header hashing, transaction signing and verification, block
// verification at several sizes and pool snapshots.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tessera_protocol::crypto::{hash, PrivateKey};
use tessera_protocol::network::TxPool;
use tessera_protocol::storage::{Block, Blockchain, Header};
use tessera_protocol::transaction::Transaction;

fn signed_batch(count: usize, key: &PrivateKey) -> Vec<Transaction> {
    (0..count)
        .map(|i| {
            let mut tx = Transaction::new(format!("transfer #{i}").into_bytes());
            tx.sign(key);
            tx
        })
        .collect()
}

fn bench_header_hash(c: &mut Criterion) {
    c.bench_function("header/hash_uncached", |b| {
        b.iter(|| {
            let header = Header::new(1, hash(b"data"), hash(b"parent"), 42, 1_700_000_000);
            header.hash()
        });
    });
}

fn bench_sign_transaction(c: &mut Criterion) {
    let key = PrivateKey::generate();
    c.bench_function("transaction/sign", |b| {
        b.iter(|| {
            let mut tx = Transaction::new(b"pay 500 to bob".to_vec());
            tx.sign(&key);
            tx
        });
    });
}

fn bench_verify_transaction(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let mut tx = Transaction::new(b"pay 500 to bob".to_vec());
    tx.sign(&key);

    c.bench_function("transaction/verify", |b| {
        b.iter(|| tx.verify());
    });
}

fn bench_block_verify(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let mut group = c.benchmark_group("block/verify");

    for size in [1usize, 10, 100, 1000] {
        let mut block = Block::new_from_parent(&Header::genesis(), signed_batch(size, &key));
        block.sign(&key);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &block, |b, block| {
            b.iter(|| block.verify());
        });
    }
    group.finish();
}

fn bench_add_block(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let txs = signed_batch(100, &key);

    c.bench_function("chain/add_block_100_txs", |b| {
        b.iter_batched(
            || {
                let chain = Blockchain::new();
                let mut block = Block::new_from_parent(chain.tip(), txs.clone());
                block.sign(&key);
                (chain, block)
            },
            |(mut chain, block)| chain.add_block(&block),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_pool_snapshot(c: &mut Criterion) {
    let key = PrivateKey::generate();
    let mut group = c.benchmark_group("mempool/transactions");

    for size in [100usize, 1000, 10_000] {
        let mut pool = TxPool::new();
        for (i, mut tx) in signed_batch(size, &key).into_iter().enumerate() {
            tx.set_first_seen((size - i) as i64);
            pool.add(tx).expect("clock in range");
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| pool.transactions());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_header_hash,
    bench_sign_transaction,
    bench_verify_transaction,
    bench_block_verify,
    bench_add_block,
    bench_pool_snapshot,
);
criterion_main!(benches);
