use criterion::{Criterion, black_box, criterion_group, criterion_main};
use domain::{CartItem, Money, OrderItem, OrderPreparation};

fn bench_sum(c: &mut Criterion) {
    let a = Money::new("USD", 12, 340_000_000).unwrap();
    let b = Money::new("USD", -3, -990_000_000).unwrap();
    c.bench_function("money_sum", |bench| {
        bench.iter(|| black_box(&a).sum(black_box(&b)).unwrap())
    });
}

fn bench_multiply(c: &mut Criterion) {
    let m = Money::new("USD", 19, 990_000_000).unwrap();
    let mut group = c.benchmark_group("money_multiply");
    for n in [1u32, 10, 100, 10_000] {
        group.bench_function(format!("direct_{n}"), |bench| {
            bench.iter(|| black_box(&m).multiply_slow(black_box(n)).unwrap())
        });
        group.bench_function(format!("folded_{n}"), |bench| {
            bench.iter(|| {
                let mut total = Money::zero("USD");
                for _ in 0..n {
                    total = total.sum(black_box(&m)).unwrap();
                }
                total
            })
        });
    }
    group.finish();
}

fn bench_order_total(c: &mut Criterion) {
    let cart_items: Vec<CartItem> = (0..50)
        .map(|i| CartItem::new(format!("SKU-{i:03}"), (i % 5) + 1))
        .collect();
    let prep = OrderPreparation {
        order_items: cart_items
            .iter()
            .map(|item| OrderItem::new(item.clone(), Money::new("USD", 9, 990_000_000).unwrap()))
            .collect(),
        cart_items,
        shipping_cost_localized: Money::new("USD", 8, 990_000_000).unwrap(),
    };
    c.bench_function("order_total_50_lines", |bench| {
        bench.iter(|| black_box(&prep).total("USD").unwrap())
    });
}

criterion_group!(benches, bench_sum, bench_multiply, bench_order_total);
criterion_main!(benches);
