use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use databind::{bind_bean, Bean, ClassBuilder, ObjectMapper, Param, Value, Visibility};

#[derive(Clone, Default)]
struct User {
    id: u32,
    name: String,
    email: String,
    active: bool,
}

impl Bean for User {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("id", Visibility::Public, (), |u| &u.id, |u| &mut u.id)
            .field("name", Visibility::Public, (), |u| &u.name, |u| &mut u.name)
            .field("email", Visibility::Public, (), |u| &u.email, |u| &mut u.email)
            .field("active", Visibility::Public, (), |u| &u.active, |u| &mut u.active)
            .default_creator(Visibility::Public, User::default)
    }
}

#[derive(Clone)]
struct Product {
    sku: String,
    price: f64,
    quantity: u32,
}

impl Bean for Product {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .getter("get_sku", Visibility::Public, (), |p| p.sku.clone())
            .getter("get_price", Visibility::Public, (), |p| p.price)
            .field("quantity", Visibility::Public, (), |p| &p.quantity, |p| &mut p.quantity)
            .creator(
                "new",
                Visibility::Public,
                (),
                vec![Param::named::<String>("sku"), Param::named::<f64>("price")],
                |mut args| {
                    Ok(Product {
                        sku: args.take(0)?,
                        price: args.take(1)?,
                        quantity: 0,
                    })
                },
            )
    }
}

#[derive(Clone, Default)]
struct Metadata {
    created: String,
    version: u32,
}

impl Bean for Metadata {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("created", Visibility::Public, (), |m| &m.created, |m| &mut m.created)
            .field("version", Visibility::Public, (), |m| &m.version, |m| &mut m.version)
            .default_creator(Visibility::Public, Metadata::default)
    }
}

#[derive(Clone, Default)]
struct NestedData {
    id: u32,
    metadata: Metadata,
    tags: Vec<String>,
}

impl Bean for NestedData {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("id", Visibility::Public, (), |n| &n.id, |n| &mut n.id)
            .field("metadata", Visibility::Public, (), |n| &n.metadata, |n| &mut n.metadata)
            .field("tags", Visibility::Public, (), |n| &n.tags, |n| &mut n.tags)
            .default_creator(Visibility::Public, NestedData::default)
    }
}

bind_bean!(User, Product, Metadata, NestedData);

fn user() -> User {
    User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
    }
}

fn products(size: u32) -> Vec<Product> {
    (0..size)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            price: 9.99 + f64::from(i),
            quantity: i,
        })
        .collect()
}

fn nested() -> NestedData {
    NestedData {
        id: 42,
        metadata: Metadata {
            created: "2023-01-01T00:00:00Z".to_string(),
            version: 3,
        },
        tags: vec![
            "important".to_string(),
            "verified".to_string(),
            "production".to_string(),
        ],
    }
}

fn benchmark_serialize_simple(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let user = user();

    c.bench_function("serialize_simple_bean", |b| {
        b.iter(|| mapper.to_tokens(black_box(&user)))
    });
}

fn benchmark_deserialize_simple(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let tokens = mapper.to_tokens(&user()).unwrap();

    c.bench_function("deserialize_simple_bean", |b| {
        b.iter(|| mapper.from_tokens::<User>(black_box(tokens.clone())))
    });
}

fn benchmark_cold_cache(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let data = nested();
    let tree = mapper.to_value(&data).unwrap();

    let mut group = c.benchmark_group("binding_construction");
    group.bench_function("warm", |b| {
        b.iter(|| mapper.from_value::<NestedData>(black_box(tree.clone())))
    });
    group.bench_function("cold", |b| {
        b.iter(|| {
            mapper.flush_cache();
            mapper.from_value::<NestedData>(black_box(tree.clone()))
        })
    });
    group.finish();
}

fn benchmark_serialize_array(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let mut group = c.benchmark_group("serialize_array");

    for size in [10, 50, 100, 500].iter() {
        let products = products(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &products, |b, products| {
            b.iter(|| mapper.to_tokens(black_box(products)))
        });
    }
    group.finish();
}

fn benchmark_deserialize_array(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let mut group = c.benchmark_group("deserialize_array");

    for size in [10, 50, 100, 500].iter() {
        let tree = mapper.to_value(&products(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| mapper.from_value::<Vec<Product>>(black_box(tree.clone())))
        });
    }
    group.finish();
}

fn benchmark_primitive_array(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let mut group = c.benchmark_group("primitive_array");

    let numbers: Vec<i32> = (0..100).collect();
    let floats: Vec<f64> = (0..100).map(|i| i as f64 * 1.5).collect();

    group.bench_function("serialize_integers", |b| {
        b.iter(|| mapper.to_value(black_box(&numbers)))
    });

    group.bench_function("serialize_floats", |b| {
        b.iter(|| mapper.to_value(black_box(&floats)))
    });

    let numbers_tree = mapper.to_value(&numbers).unwrap();
    group.bench_function("deserialize_integers", |b| {
        b.iter(|| mapper.from_value::<Vec<i32>>(black_box(numbers_tree.clone())))
    });

    group.finish();
}

fn benchmark_comparison_with_json(c: &mut Criterion) {
    let mapper = ObjectMapper::new();
    let data = nested();
    let json = serde_json::to_string(&mapper.to_value(&data).unwrap()).unwrap();

    let mut group = c.benchmark_group("json_document");
    group.bench_function("render", |b| {
        b.iter(|| serde_json::to_string(&mapper.to_value(black_box(&data)).unwrap()))
    });
    group.bench_function("parse_and_bind", |b| {
        b.iter(|| {
            let tree: Value = serde_json::from_str(black_box(&json)).unwrap();
            mapper.from_value::<NestedData>(tree)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_serialize_simple,
    benchmark_deserialize_simple,
    benchmark_cold_cache,
    benchmark_serialize_array,
    benchmark_deserialize_array,
    benchmark_primitive_array,
    benchmark_comparison_with_json
);
criterion_main!(benches);
