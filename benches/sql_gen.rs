//! SQL generation benchmarks: pure statement rendering, no database.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use paneldb::{Dialect, DialectRegistry, Driver};

fn quoting(c: &mut Criterion) {
    let registry = DialectRegistry::builtin();
    let mysql = registry.get(Driver::MySql).unwrap();
    let postgres = registry.get(Driver::Postgres).unwrap();

    c.bench_function("quote_identifier_mysql", |b| {
        b.iter(|| mysql.quote(black_box("user_name")))
    });
    c.bench_function("placeholder_postgres", |b| {
        b.iter(|| postgres.placeholder(black_box(17)))
    });
}

fn pagination(c: &mut Criterion) {
    let registry = DialectRegistry::builtin();
    let mysql = registry.get(Driver::MySql).unwrap();
    let mssql = registry.get(Driver::Mssql).unwrap();

    c.bench_function("paginate_mysql", |b| {
        b.iter(|| {
            mysql.paginate(
                black_box("SELECT * FROM `users`".to_string()),
                Some("`id` DESC"),
                Some(25),
                Some(100),
            )
        })
    });
    c.bench_function("paginate_mssql_row_number", |b| {
        b.iter(|| {
            mssql.paginate(
                black_box("SELECT [id], [name] FROM [users]".to_string()),
                Some("[id] DESC"),
                Some(25),
                Some(100),
            )
        })
    });
}

criterion_group!(benches, quoting, pagination);
criterion_main!(benches);
