use criterion::{Criterion, black_box, criterion_group, criterion_main};

use renqing_ai::{CandidateItem, RecipientGender, RecipientProfile, Season, recommend_candidates};

fn build_candidates(n: usize) -> Vec<CandidateItem> {
    let categories = ["茶叶", "酒类", "礼品", "美妆", "保健品", "电子产品"];
    (0..n)
        .map(|i| CandidateItem {
            item_id: format!("item-{i}"),
            name: format!("商品{i}"),
            category: categories[i % categories.len()].to_string(),
            quantity: (i % 5) as i64,
            unit_price: 40_000 + (i as u64 * 997) % 120_000,
        })
        .collect()
}

fn bench_scorer(c: &mut Criterion) {
    let profile = RecipientProfile {
        age: Some(45),
        gender: Some(RecipientGender::Male),
    };

    for size in [50usize, 500, 5_000] {
        let candidates = build_candidates(size);
        c.bench_function(&format!("recommend_candidates/{size}"), |b| {
            b.iter(|| {
                recommend_candidates(
                    black_box(100_000),
                    Some(&profile),
                    Season::Autumn,
                    black_box(&candidates),
                )
            })
        });
    }
}

criterion_group!(benches, bench_scorer);
criterion_main!(benches);
