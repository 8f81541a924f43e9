use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use safesql::{Dialect, MySqlDialect, Params, SelectStatement, Statement, Value};

const D: MySqlDialect = MySqlDialect::new();

fn timestamp() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_milli_opt(12, 30, 15, 250))
        .expect("valid timestamp")
}

fn bench_sanitize_value(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize/value");

    let cases: [(&str, Value, &str); 6] = [
        ("int", Value::Int(42), "INT"),
        ("decimal", Value::Decimal(Decimal::new(123_456, 3)), "DECIMAL(10,2)"),
        ("varchar", Value::from("O'Brien says \"hi\""), "VARCHAR(64)"),
        ("enum", Value::from("large"), "ENUM('small','medium','large')"),
        ("binary", Value::from(vec![0xde_u8, 0xad, 0xbe, 0xef]), "VARBINARY(16)"),
        ("datetime", Value::from(timestamp()), "DATETIME(3)"),
    ];
    for (name, value, ty) in &cases {
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(D.sanitize_value(value, Some(*ty))));
        });
    }

    group.finish();
}

fn bench_identifier(c: &mut Criterion) {
    c.bench_function("sanitize/identifier", |b| {
        b.iter(|| black_box(D.sanitize_identifier(black_box("ORDER_ITEM_QUANTITY"))));
    });
}

/// `WHERE c0 = :p0 AND c1 = :p1 ...` with `n` bound parameters.
fn build_select(n: usize) -> (SelectStatement, Params) {
    let filter = (0..n)
        .map(|i| format!("c{i} = :p{i}"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let params = (0..n).fold(Params::new(), |p, i| {
        p.bind_typed(format!(":p{i}"), i as i64, "BIGINT")
    });
    (SelectStatement::new("t").filter(filter).limit(10_u64), params)
}

fn bench_bind(c: &mut Criterion) {
    let mut group = c.benchmark_group("statement/bind");

    for n in [1, 10, 50] {
        let input = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, (stmt, params)| {
            b.iter(|| black_box(stmt.bind(&D, params)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sanitize_value, bench_identifier, bench_bind);
criterion_main!(benches);
