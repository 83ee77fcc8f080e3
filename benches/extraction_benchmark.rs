//! Extraction throughput over a full 16-listing results page

use std::hint::black_box;

use amazon_scrape::infrastructure::parsing::{
    HistogramFields, ListingFields, result_count, split_fragments,
};
use amazon_scrape::test_utils::{histogram, page_of_matches};
use criterion::{Criterion, criterion_group, criterion_main};
use url::Url;

fn bench_page_split(c: &mut Criterion) {
    let page = page_of_matches(3, 16, "usb cable");

    c.bench_function("result_count", |b| b.iter(|| result_count(black_box(&page))));
    c.bench_function("split_fragments", |b| {
        b.iter(|| split_fragments(black_box(&page), 16).map(|fragments| fragments.len()))
    });
}

fn bench_field_extraction(c: &mut Criterion) {
    let page = page_of_matches(3, 16, "usb cable");
    let base = Url::parse("https://www.amazon.com/").unwrap();
    let fragments = split_fragments(&page, 16).unwrap();
    let payload = histogram(1_204, [62, 18, 8, 4, 8]);

    c.bench_function("listing_fields_page", |b| {
        b.iter(|| {
            fragments
                .iter()
                .map(|fragment| ListingFields::extract(black_box(fragment), &base))
                .filter(|fields| fields.name.is_some())
                .count()
        })
    });
    c.bench_function("histogram_fields", |b| {
        b.iter(|| HistogramFields::extract(black_box(&payload)))
    });
}

criterion_group!(benches, bench_page_split, bench_field_extraction);
criterion_main!(benches);
