use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use formloom::domain::{FieldDef, FormTree, TabDef};
use formloom::engine::{DependencyEngine, ValidationEngine};
use serde_json::{json, Value};
use std::sync::Arc;

fn profile_tree() -> Arc<FormTree> {
    Arc::new(
        FormTree::from_defs(vec![
            FieldDef::row(vec![
                FieldDef::text("firstName").required(true).max_length(64),
                FieldDef::text("lastName").required(true).max_length(64),
            ]),
            FieldDef::email("email").required(true),
            FieldDef::switch("emailNotifications"),
            FieldDef::switch("weeklyDigest").disabled_when(|data, _| data["emailNotifications"] != true),
            FieldDef::tabs(vec![
                TabDef::new("Billing", vec![FieldDef::text("card").pattern(r"^\d{16}$")]).named("billing"),
                TabDef::new("Shipping", vec![FieldDef::text("street").required(true)]).named("shipping"),
            ]),
            FieldDef::array(
                "contacts",
                vec![
                    FieldDef::select("kind").required(true),
                    FieldDef::email("email").required(true),
                    FieldDef::text("phone").hidden_when(|_, row| row["kind"] != "phone"),
                ],
            )
            .max_rows(500),
        ])
        .expect("benchmark tree is valid"),
    )
}

fn values_with_rows(rows: usize) -> Value {
    let contacts: Vec<Value> = (0..rows)
        .map(|i| {
            json!({
                "kind": if i % 2 == 0 { "phone" } else { "email" },
                "email": format!("user{}@example.com", i),
                "phone": "+44 20 7946 0000",
            })
        })
        .collect();
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "ada@example.com",
        "emailNotifications": true,
        "billing": { "card": "4111111111111111" },
        "shipping": { "street": "" },
        "contacts": contacts,
    })
}

fn benchmark_derive(c: &mut Criterion) {
    let tree = profile_tree();
    let values = values_with_rows(50);

    c.bench_function("derive_field_state", |b| {
        let mut engine = DependencyEngine::new(Arc::clone(&tree));
        b.iter(|| black_box(engine.derive(black_box(&values))));
    });
}

fn benchmark_validation_pass(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let tree = profile_tree();
    let validator = ValidationEngine::new(Arc::clone(&tree));

    let mut group = c.benchmark_group("validation_pass");
    for rows in [1usize, 10, 100] {
        let values = Arc::new(values_with_rows(rows));
        let derived = DependencyEngine::new(Arc::clone(&tree)).derive(&values);

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(validator.validate(Arc::clone(&values), &derived).await) });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_derive, benchmark_validation_pass);
criterion_main!(benches);
