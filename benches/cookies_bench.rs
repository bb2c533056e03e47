use criterion::{black_box, criterion_group, criterion_main, Criterion};
use scriptswap::cookies::canonical_cookie::CanonicalCookie;
use scriptswap::cookies::monster::CookieMonster;
use url::Url;

fn benchmark_cookie_insert(c: &mut Criterion) {
    let store = CookieMonster::new();
    let url = Url::parse("https://shop.example.com").unwrap();

    c.bench_function("cookie_parse_and_save", |b| {
        b.iter(|| {
            store.parse_and_save_cookie(black_box(&url), black_box("session=abc; Path=/; Secure"));
        })
    });
}

fn benchmark_domain_scan(c: &mut Criterion) {
    let store = CookieMonster::new();
    // Pre-populate a few neighbouring domains
    for host in ["shop.example.com", "blog.example.com", "other.test"] {
        for i in 0..40 {
            store.set_canonical_cookie(CanonicalCookie::new(
                format!("app{}/js", i),
                "https%3A%2F%2Fcdn.example.com%2Fa.js",
                host,
            ));
        }
    }

    c.bench_function("cookies_for_domain", |b| {
        b.iter(|| black_box(store.cookies_for_domain(black_box("shop.example.com"), None)))
    });

    let url = Url::parse("https://shop.example.com/cart").unwrap();
    c.bench_function("cookie_header", |b| {
        b.iter(|| black_box(store.cookie_header(black_box(&url))))
    });
}

criterion_group!(benches, benchmark_cookie_insert, benchmark_domain_scan);
criterion_main!(benches);
