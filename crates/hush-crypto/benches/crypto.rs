use hush_crypto::{open, seal, Domain, SecretKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_seal(bencher: divan::Bencher, size: usize) {
    let key = SecretKey::generate();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| seal(divan::black_box(&key), Domain::Payload, divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_open(bencher: divan::Bencher, size: usize) {
    let key = SecretKey::generate();
    let data = make_data(size);
    let sealed = seal(&key, Domain::Payload, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            open(
                divan::black_box(&key),
                Domain::Payload,
                divan::black_box(&sealed),
            )
            .unwrap()
        });
}

fn main() {
    divan::main();
}
