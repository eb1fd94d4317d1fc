use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use databind::introspect::AttributeDirectives;
use databind::{
    bind_bean, bind_enum, value, Annotation, Annotations, AutoDetect, Bean, ClassBuilder,
    CreatorMode, Detect, DirectiveSource, Error, Feature, Inclusion, MapperConfig,
    MappingErrorKind, MixIn, Number, ObjectMap, ObjectMapper, Param, ProblemHandler, Token, Value,
    Visibility, VisibilityPolicy,
};
use num_bigint::BigInt;

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: u32,
    name: String,
    active: bool,
    tags: Vec<String>,
}

impl Bean for User {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("id", Visibility::Public, (), |u| &u.id, |u| &mut u.id)
            .field("name", Visibility::Public, (), |u| &u.name, |u| &mut u.name)
            .field("active", Visibility::Public, (), |u| &u.active, |u| &mut u.active)
            .field("tags", Visibility::Public, (), |u| &u.tags, |u| &mut u.tags)
            .default_creator(Visibility::Public, User::default)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Product {
    sku: String,
    price: f64,
    quantity: u32,
}

impl Bean for Product {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("sku", Visibility::Public, (), |p| &p.sku, |p| &mut p.sku)
            .field("price", Visibility::Public, (), |p| &p.price, |p| &mut p.price)
            .field("quantity", Visibility::Public, (), |p| &p.quantity, |p| &mut p.quantity)
            .default_creator(Visibility::Public, Product::default)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Order {
    order_id: u32,
    customer: User,
    items: Vec<Product>,
    total: f64,
}

impl Bean for Order {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("order_id", Visibility::Public, (), |o| &o.order_id, |o| &mut o.order_id)
            .field("customer", Visibility::Public, (), |o| &o.customer, |o| &mut o.customer)
            .field("items", Visibility::Public, (), |o| &o.items, |o| &mut o.items)
            .field("total", Visibility::Public, (), |o| &o.total, |o| &mut o.total)
            .default_creator(Visibility::Public, Order::default)
    }
}

bind_bean!(User, Product, Order);

fn alice() -> User {
    User {
        id: 123,
        name: "Alice".to_string(),
        active: true,
        tags: vec!["admin".to_string(), "developer".to_string()],
    }
}

fn field_names(tokens: &[Token]) -> Vec<String> {
    let mut depth = 0usize;
    let mut names = Vec::new();
    for token in tokens {
        match token {
            Token::StartObject | Token::StartArray => depth += 1,
            Token::EndObject | Token::EndArray => depth -= 1,
            Token::FieldName(name) if depth == 1 => names.push(name.clone()),
            _ => {}
        }
    }
    names
}

fn keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn test_simple_bean() {
    let mapper = ObjectMapper::new();
    let user = alice();

    let tokens = mapper.to_tokens(&user).unwrap();
    assert_eq!(field_names(&tokens), vec!["id", "name", "active", "tags"]);
    assert_eq!(tokens[2], Token::Int(123));

    let back: User = mapper.from_tokens(tokens).unwrap();
    assert_eq!(back, user);
}

#[test]
fn test_nested_beans() {
    let mapper = ObjectMapper::new();
    let order = Order {
        order_id: 12345,
        customer: alice(),
        items: vec![
            Product {
                sku: "WIDGET-001".to_string(),
                price: 29.99,
                quantity: 2,
            },
            Product {
                sku: "GADGET-002".to_string(),
                price: 49.99,
                quantity: 1,
            },
        ],
        total: 109.97,
    };

    let tree = mapper.to_value(&order).unwrap();
    assert_eq!(
        tree.get("customer").and_then(|c| c.get("name")).and_then(Value::as_str),
        Some("Alice")
    );
    assert_eq!(tree.get("items").and_then(Value::as_array).map(Vec::len), Some(2));

    let back: Order = mapper.from_value(tree).unwrap();
    assert_eq!(back, order);
}

#[test]
fn test_json_document_input() {
    let json = r#"{"id": 7, "name": "Bob", "active": false, "tags": []}"#;
    let tree: Value = serde_json::from_str(json).unwrap();
    let user: User = ObjectMapper::new().from_value(tree).unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "Bob");
    assert!(user.tags.is_empty());

    let rendered = serde_json::to_string(&ObjectMapper::new().to_value(&user).unwrap()).unwrap();
    assert_eq!(rendered, r#"{"id":7,"name":"Bob","active":false,"tags":[]}"#);
}

#[test]
fn test_missing_properties_keep_defaults() {
    let user: User = ObjectMapper::new().from_value(value!({ "name": "Eve" })).unwrap();
    assert_eq!(user.name, "Eve");
    assert_eq!(user.id, 0);
    assert!(!user.active);
}

// Renaming, ignoring and accessor detection

#[derive(Debug, Default, PartialEq)]
struct Account {
    id: u64,
    display_name: String,
    secret: String,
}

impl Bean for Account {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("id", Visibility::Public, (), |a| &a.id, |a| &mut a.id)
            .field(
                "display_name",
                Visibility::Public,
                Annotation::property("displayName"),
                |a| &a.display_name,
                |a| &mut a.display_name,
            )
            .field("secret", Visibility::Public, Annotation::Ignore, |a| &a.secret, |a| &mut a.secret)
            .default_creator(Visibility::Public, Account::default)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Counter {
    count: i32,
}

impl Bean for Counter {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("count", Visibility::Private, (), |c| &c.count, |c| &mut c.count)
            .getter("get_count", Visibility::Public, (), |c| c.count)
            .setter("set_count", Visibility::Public, (), |c, v: i32| c.count = v)
            .is_getter("is_positive", Visibility::Public, (), |c| c.count > 0)
            .default_creator(Visibility::Public, Counter::default)
    }
}

bind_bean!(Account, Counter);

#[test]
fn test_rename_and_ignore() {
    let mapper = ObjectMapper::new();
    let account = Account {
        id: 1,
        display_name: "Ada".to_string(),
        secret: "hunter2".to_string(),
    };
    let tree = mapper.to_value(&account).unwrap();
    assert_eq!(keys(&tree), vec!["id", "displayName"]);

    // Ignored names are accepted and dropped on input.
    let back: Account = mapper
        .from_value(value!({ "id": 1, "displayName": "Ada", "secret": "leaked" }))
        .unwrap();
    assert_eq!(back.display_name, "Ada");
    assert_eq!(back.secret, "");
}

#[test]
fn test_accessors_merge_into_properties() {
    let mapper = ObjectMapper::new();
    let tree = mapper.to_value(&Counter { count: 3 }).unwrap();
    assert_eq!(keys(&tree), vec!["count", "positive"]);
    assert_eq!(tree.get("positive"), Some(&Value::Bool(true)));

    // "positive" has no mutator; it is read-only and skipped on input.
    let back: Counter = mapper
        .from_value(value!({ "count": 5, "positive": false }))
        .unwrap();
    assert_eq!(back, Counter { count: 5 });
}

// Visibility

#[derive(Debug, Default, PartialEq)]
struct Badge {
    label: String,
    code: String,
}

impl Bean for Badge {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("label", Visibility::Public, (), |b| &b.label, |b| &mut b.label)
            .field("code", Visibility::Private, (), |b| &b.code, |b| &mut b.code)
            .default_creator(Visibility::Public, Badge::default)
    }
}

#[derive(Debug, Default, PartialEq)]
struct OpenBadge {
    code: String,
}

impl Bean for OpenBadge {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::AutoDetect(AutoDetect::all(Detect::Any)))
            .field("code", Visibility::Private, (), |b| &b.code, |b| &mut b.code)
            .default_creator(Visibility::Private, OpenBadge::default)
    }
}

#[derive(Debug, Default, PartialEq)]
struct MarkedBadge {
    code: String,
}

impl Bean for MarkedBadge {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("code", Visibility::Private, Annotation::property(""), |b| &b.code, |b| &mut b.code)
            .default_creator(Visibility::Public, MarkedBadge::default)
    }
}

bind_bean!(Badge, OpenBadge, MarkedBadge);

#[test]
fn test_private_fields_hidden_by_default() {
    let badge = Badge {
        label: "guest".to_string(),
        code: "x1".to_string(),
    };
    let tree = ObjectMapper::new().to_value(&badge).unwrap();
    assert_eq!(keys(&tree), vec!["label"]);
}

#[test]
fn test_visibility_policy_widens_detection() {
    let mapper = ObjectMapper::new()
        .with_visibility_policy(VisibilityPolicy::new().with_field(Detect::Any));
    let badge = Badge {
        label: "guest".to_string(),
        code: "x1".to_string(),
    };
    let tree = mapper.to_value(&badge).unwrap();
    assert_eq!(keys(&tree), vec!["label", "code"]);
    let back: Badge = mapper.from_value(tree).unwrap();
    assert_eq!(back, badge);
}

#[test]
fn test_class_auto_detect_and_explicit_marker() {
    let mapper = ObjectMapper::new();
    let open = mapper.to_value(&OpenBadge { code: "a".to_string() }).unwrap();
    assert_eq!(open, value!({ "code": "a" }));
    let back: OpenBadge = mapper.from_value(open).unwrap();
    assert_eq!(back.code, "a");

    let marked = mapper.to_value(&MarkedBadge { code: "b".to_string() }).unwrap();
    assert_eq!(marked, value!({ "code": "b" }));
}

#[derive(Debug, Default)]
struct Hidden {
    value: i32,
}

impl Bean for Hidden {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("value", Visibility::Private, (), |h| &h.value, |h| &mut h.value)
            .default_creator(Visibility::Public, Hidden::default)
    }
}

bind_bean!(Hidden);

#[test]
fn test_empty_bean_fails_unless_disabled() {
    let err = ObjectMapper::new().to_value(&Hidden { value: 1 }).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("no serializable properties"));

    let lenient = ObjectMapper::new().with_feature(Feature::FailOnEmptyBeans, false);
    assert_eq!(lenient.to_value(&Hidden { value: 1 }).unwrap(), value!({}));
}

// Creators

#[derive(Debug, PartialEq)]
struct Money {
    amount: i64,
    currency: String,
    note: String,
}

impl Bean for Money {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("note", Visibility::Public, (), |m| &m.note, |m| &mut m.note)
            .getter("get_amount", Visibility::Public, (), |m| m.amount)
            .getter("get_currency", Visibility::Public, (), |m| m.currency.clone())
            .creator(
                "new",
                Visibility::Public,
                (),
                vec![Param::named::<i64>("amount"), Param::named::<String>("currency")],
                |mut args| {
                    Ok(Money {
                        amount: args.take(0)?,
                        currency: args.take(1)?,
                        note: String::new(),
                    })
                },
            )
    }
}

bind_bean!(Money);

#[test]
fn test_property_creator() {
    let mapper = ObjectMapper::new();
    let money = Money {
        amount: 250,
        currency: "EUR".to_string(),
        note: "rent".to_string(),
    };

    // Creator parameters are written first.
    let tree = mapper.to_value(&money).unwrap();
    assert_eq!(keys(&tree), vec!["amount", "currency", "note"]);

    // Order in the input does not matter; "note" is set after construction.
    let back: Money = mapper
        .from_value(value!({ "note": "rent", "currency": "EUR", "amount": 250 }))
        .unwrap();
    assert_eq!(back, money);
}

#[test]
fn test_missing_creator_property() {
    let mapper = ObjectMapper::new();
    let partial: Money = mapper.from_value(value!({ "amount": 5 })).unwrap();
    assert_eq!(partial.currency, "");

    let strict = mapper.with_feature(Feature::FailOnMissingCreatorProperties, true);
    let err = strict.from_value::<Money>(value!({ "amount": 5 })).unwrap_err();
    assert_eq!(
        err.kind(),
        Some(&MappingErrorKind::MissingProperty {
            name: "currency".to_string(),
            type_name: "Money".to_string(),
        })
    );
}

#[derive(Debug, PartialEq)]
struct Tags(Vec<String>);

impl Bean for Tags {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .getter("values", Visibility::Public, Annotation::Value, |t| t.0.clone())
            .creator(
                "from_list",
                Visibility::Public,
                Annotation::Creator(CreatorMode::Delegating),
                vec![Param::unnamed::<Vec<String>>()],
                |mut args| Ok(Tags(args.take(0)?)),
            )
    }
}

#[derive(Debug, PartialEq)]
struct Ident(String);

impl Bean for Ident {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .getter("text", Visibility::Public, Annotation::Value, |i| i.0.clone())
            .creator("parse", Visibility::Public, (), vec![Param::unnamed::<String>()], |mut args| {
                Ok(Ident(args.take(0)?))
            })
            .creator("from_int", Visibility::Public, (), vec![Param::unnamed::<i32>()], |mut args| {
                Ok(Ident(format!("int:{}", args.take::<i32>(0)?)))
            })
            .creator("from_long", Visibility::Public, (), vec![Param::unnamed::<i64>()], |mut args| {
                Ok(Ident(format!("long:{}", args.take::<i64>(0)?)))
            })
    }
}

bind_bean!(Tags, Ident);

#[test]
fn test_delegating_creator_and_value_accessor() {
    let mapper = ObjectMapper::new();
    let tags = Tags(vec!["a".to_string(), "b".to_string()]);
    let tree = mapper.to_value(&tags).unwrap();
    assert_eq!(tree, value!(["a", "b"]));
    assert_eq!(mapper.from_value::<Tags>(tree).unwrap(), tags);
}

#[test]
fn test_scalar_delegates() {
    let mapper = ObjectMapper::new();
    assert_eq!(
        mapper.from_value::<Ident>(value!("abc")).unwrap(),
        Ident("abc".to_string())
    );
    assert_eq!(
        mapper.from_value::<Ident>(value!(42)).unwrap(),
        Ident("int:42".to_string())
    );
    assert_eq!(
        mapper.from_tokens::<Ident>(vec![Token::Int(5_000_000_000)]).unwrap(),
        Ident("long:5000000000".to_string())
    );
    assert!(mapper.from_value::<Ident>(value!(true)).is_err());
}

#[derive(Debug)]
struct Ambiguous {
    a: i32,
    b: i32,
}

impl Bean for Ambiguous {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("a", Visibility::Public, (), |x| &x.a, |x| &mut x.a)
            .field("b", Visibility::Public, (), |x| &x.b, |x| &mut x.b)
            .creator(
                "new",
                Visibility::Public,
                (),
                vec![Param::named::<i32>("a"), Param::named::<i32>("b")],
                |mut args| Ok(Ambiguous { a: args.take(0)?, b: args.take(1)? }),
            )
            .creator(
                "swapped",
                Visibility::Public,
                (),
                vec![Param::named::<i32>("b"), Param::named::<i32>("a")],
                |mut args| Ok(Ambiguous { b: args.take(0)?, a: args.take(1)? }),
            )
    }
}

#[derive(Debug)]
struct Preferred {
    a: i32,
    b: i32,
}

impl Bean for Preferred {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("a", Visibility::Public, (), |x| &x.a, |x| &mut x.a)
            .field("b", Visibility::Public, (), |x| &x.b, |x| &mut x.b)
            .creator(
                "implicit",
                Visibility::Public,
                (),
                vec![Param::named::<i32>("a"), Param::named::<i32>("b")],
                |_| Ok(Preferred { a: -1, b: -1 }),
            )
            .creator(
                "marked",
                Visibility::Public,
                Annotation::Creator(CreatorMode::Properties),
                vec![Param::named::<i32>("a"), Param::named::<i32>("b")],
                |mut args| Ok(Preferred { a: args.take(0)?, b: args.take(1)? }),
            )
    }
}

#[derive(Debug)]
struct BadMarker {
    a: i32,
}

impl Bean for BadMarker {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("a", Visibility::Public, (), |x| &x.a, |x| &mut x.a)
            .creator(
                "new",
                Visibility::Public,
                Annotation::Creator(CreatorMode::Properties),
                vec![Param::unnamed::<i32>()],
                |mut args| Ok(BadMarker { a: args.take(0)? }),
            )
    }
}

#[derive(Debug)]
struct NoCreator {
    a: i32,
}

impl Bean for NoCreator {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class.field("a", Visibility::Public, (), |x| &x.a, |x| &mut x.a)
    }
}

bind_bean!(Ambiguous, Preferred, BadMarker, NoCreator);

#[test]
fn test_conflicting_creators_are_rejected() {
    let mapper = ObjectMapper::new();
    let err = mapper.from_value::<Ambiguous>(value!({ "a": 1, "b": 2 })).unwrap_err();
    match &err {
        Error::Configuration { type_name, msg } => {
            assert_eq!(type_name, "Ambiguous");
            assert!(msg.contains("conflicting property-based creators"), "{}", msg);
        }
        other => panic!("expected configuration error, got {:?}", other),
    }

    // A failed build is not cached: the same error comes back.
    let again = mapper.from_value::<Ambiguous>(value!({ "a": 1, "b": 2 })).unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
}

#[test]
fn test_marked_creator_beats_implicit() {
    let parsed: Preferred = ObjectMapper::new()
        .from_value(value!({ "a": 1, "b": 2 }))
        .unwrap();
    assert_eq!((parsed.a, parsed.b), (1, 2));
}

#[test]
fn test_marked_creator_needs_names() {
    let err = ObjectMapper::new()
        .from_value::<BadMarker>(value!({ "a": 1 }))
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("unnamed parameter"));
}

#[test]
fn test_no_creator_cannot_read_objects() {
    let mapper = ObjectMapper::new();
    assert_eq!(mapper.to_value(&NoCreator { a: 3 }).unwrap(), value!({ "a": 3 }));
    let err = mapper.from_value::<NoCreator>(value!({ "a": 3 })).unwrap_err();
    assert!(err.to_string().contains("no creator available"));
}

// Unknown properties

struct Recorder {
    seen: Mutex<Vec<String>>,
    handle: bool,
}

impl ProblemHandler for Recorder {
    fn handle_unknown_property(
        &self,
        type_name: &str,
        property: &str,
        _value: &Value,
    ) -> databind::Result<bool> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(format!("{}.{}", type_name, property));
        }
        Ok(self.handle)
    }
}

#[derive(Debug, Default)]
struct Tolerant {
    id: i32,
}

impl Bean for Tolerant {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::ignore_unknown())
            .field("id", Visibility::Public, (), |t| &t.id, |t| &mut t.id)
            .default_creator(Visibility::Public, Tolerant::default)
    }
}

#[derive(Debug, Default)]
struct Legacy {
    id: i32,
    legacy: String,
}

impl Bean for Legacy {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::ignore_properties(&["legacy", "removed"]))
            .field("id", Visibility::Public, (), |l| &l.id, |l| &mut l.id)
            .field("legacy", Visibility::Public, (), |l| &l.legacy, |l| &mut l.legacy)
            .default_creator(Visibility::Public, Legacy::default)
    }
}

bind_bean!(Tolerant, Legacy);

#[test]
fn test_unknown_property_fails_by_default() {
    let err = ObjectMapper::new()
        .from_value::<User>(value!({ "id": 1, "nickname": "al" }))
        .unwrap_err();
    match err.kind() {
        Some(MappingErrorKind::UnknownProperty {
            name,
            type_name,
            known,
        }) => {
            assert_eq!(name, "nickname");
            assert_eq!(type_name, "User");
            assert_eq!(known, &vec!["id", "name", "active", "tags"]);
        }
        other => panic!("unexpected error kind {:?}", other),
    }
    assert!(err.to_string().contains("unrecognized field \"nickname\""));
}

#[test]
fn test_unknown_property_skipped_when_disabled() {
    let mapper = ObjectMapper::new().with_feature(Feature::FailOnUnknownProperties, false);
    let user: User = mapper
        .from_value(value!({ "id": 1, "nickname": { "deep": [1, 2] }, "name": "Al" }))
        .unwrap();
    assert_eq!(user.name, "Al");
}

#[test]
fn test_class_level_ignores() {
    let mapper = ObjectMapper::new();
    let tolerant: Tolerant = mapper
        .from_value(value!({ "id": 2, "whatever": [true] }))
        .unwrap();
    assert_eq!(tolerant.id, 2);

    let legacy = Legacy {
        id: 4,
        legacy: "old".to_string(),
    };
    assert_eq!(mapper.to_value(&legacy).unwrap(), value!({ "id": 4 }));
    let back: Legacy = mapper
        .from_value(value!({ "id": 4, "legacy": "x", "removed": 1 }))
        .unwrap();
    assert_eq!(back.legacy, "");
}

#[test]
fn test_problem_handler_consulted() {
    let recorder = Arc::new(Recorder {
        seen: Mutex::new(Vec::new()),
        handle: true,
    });
    let mapper = ObjectMapper::from_config(
        MapperConfig::new().with_problem_handler(recorder.clone()),
    );
    let user: User = mapper
        .from_value(value!({ "id": 9, "extra": "x" }))
        .unwrap();
    assert_eq!(user.id, 9);
    assert_eq!(*recorder.seen.lock().unwrap(), vec!["User.extra"]);

    let declining = ObjectMapper::from_config(MapperConfig::new().with_problem_handler(Arc::new(
        Recorder {
            seen: Mutex::new(Vec::new()),
            handle: false,
        },
    )));
    assert!(declining
        .from_value::<User>(value!({ "extra": "x" }))
        .is_err());
}

// Any-setter / any-getter

#[derive(Debug, Default, PartialEq)]
struct Bag {
    name: String,
    extras: ObjectMap,
}

impl Bean for Bag {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("name", Visibility::Public, (), |b| &b.name, |b| &mut b.name)
            .any_setter("set_extra", (), |b, key, value| {
                b.extras.insert(key, value);
            })
            .any_getter("extras", (), |b| b.extras.clone())
            .default_creator(Visibility::Public, Bag::default)
    }
}

bind_bean!(Bag);

#[test]
fn test_any_setter_and_getter() {
    let mapper = ObjectMapper::new();
    let input = value!({ "name": "box", "color": "red", "size": { "w": 2, "h": 3 } });
    let bag: Bag = mapper.from_value(input.clone()).unwrap();
    assert_eq!(bag.name, "box");
    assert_eq!(bag.extras.len(), 2);
    assert_eq!(bag.extras.get("color").and_then(Value::as_str), Some("red"));

    assert_eq!(mapper.to_value(&bag).unwrap(), input);
}

// Inclusion

#[derive(Debug, Default, PartialEq)]
struct Profile {
    nickname: Option<String>,
    tags: Vec<String>,
    score: i32,
    bio: Option<String>,
}

impl Bean for Profile {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field(
                "nickname",
                Visibility::Public,
                Annotation::Include(Inclusion::NonNull),
                |p| &p.nickname,
                |p| &mut p.nickname,
            )
            .field(
                "tags",
                Visibility::Public,
                Annotation::Include(Inclusion::NonEmpty),
                |p| &p.tags,
                |p| &mut p.tags,
            )
            .field(
                "score",
                Visibility::Public,
                Annotation::Include(Inclusion::NonDefault),
                |p| &p.score,
                |p| &mut p.score,
            )
            .field("bio", Visibility::Public, (), |p| &p.bio, |p| &mut p.bio)
            .default_creator(Visibility::Public, Profile::default)
    }
}

bind_bean!(Profile);

#[test]
fn test_property_inclusion() {
    let mapper = ObjectMapper::new();
    assert_eq!(
        mapper.to_value(&Profile::default()).unwrap(),
        value!({ "bio": null })
    );

    let full = Profile {
        nickname: Some("z".to_string()),
        tags: vec!["t".to_string()],
        score: 3,
        bio: None,
    };
    assert_eq!(
        keys(&mapper.to_value(&full).unwrap()),
        vec!["nickname", "tags", "score", "bio"]
    );
}

#[test]
fn test_default_inclusion_from_config() {
    let mapper =
        ObjectMapper::from_config(MapperConfig::new().with_default_inclusion(Inclusion::NonNull));
    let tree = mapper.to_value(&Profile::default()).unwrap();
    assert!(tree.get("bio").is_none());
}

#[derive(Debug, Clone, PartialEq)]
struct Limits {
    min: i32,
    max: i32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { min: 0, max: 10 }
    }
}

impl Bean for Limits {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("min", Visibility::Public, (), |l| &l.min, |l| &mut l.min)
            .field("max", Visibility::Public, Annotation::views(&["admin"]), |l| &l.max, |l| &mut l.max)
            .default_creator(Visibility::Public, Limits::default)
    }
}

#[derive(Debug, Default)]
struct Quota {
    name: String,
    limits: Limits,
}

impl Bean for Quota {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("name", Visibility::Public, (), |q| &q.name, |q| &mut q.name)
            .field(
                "limits",
                Visibility::Public,
                Annotation::Include(Inclusion::NonDefault),
                |q| &q.limits,
                |q| &mut q.limits,
            )
            .default_creator(Visibility::Public, Quota::default)
    }
}

bind_bean!(Limits, Quota);

#[test]
fn test_non_default_ignores_active_view() {
    let mapper = ObjectMapper::new();
    let stock = Quota {
        name: "q".to_string(),
        limits: Limits::default(),
    };
    // The first render happens under a view that hides `max`.
    assert_eq!(keys(&mapper.with_view("public").to_value(&stock).unwrap()), vec!["name"]);
    assert_eq!(keys(&mapper.to_value(&stock).unwrap()), vec!["name"]);

    let raised = Quota {
        name: "q".to_string(),
        limits: Limits { min: 0, max: 99 },
    };
    assert_eq!(
        mapper.with_view("public").to_value(&raised).unwrap(),
        value!({ "name": "q", "limits": { "min": 0 } })
    );
    assert_eq!(
        mapper.to_value(&raised).unwrap(),
        value!({ "name": "q", "limits": { "min": 0, "max": 99 } })
    );
}

// Views

#[derive(Debug, Default, PartialEq)]
struct Document {
    title: String,
    body: String,
    audit: String,
}

impl Bean for Document {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("title", Visibility::Public, (), |d| &d.title, |d| &mut d.title)
            .field("body", Visibility::Public, Annotation::views(&["internal"]), |d| &d.body, |d| &mut d.body)
            .field("audit", Visibility::Public, Annotation::views(&["admin"]), |d| &d.audit, |d| &mut d.audit)
            .default_creator(Visibility::Public, Document::default)
    }
}

bind_bean!(Document);

fn document() -> Document {
    Document {
        title: "t".to_string(),
        body: "b".to_string(),
        audit: "a".to_string(),
    }
}

#[test]
fn test_views_filter_output() {
    let mapper = ObjectMapper::from_config(
        MapperConfig::new()
            .with_view_parent("internal", "public")
            .with_view_parent("admin", "internal"),
    );
    let doc = document();

    assert_eq!(keys(&mapper.to_value(&doc).unwrap()), vec!["title", "body", "audit"]);
    assert_eq!(keys(&mapper.with_view("public").to_value(&doc).unwrap()), vec!["title"]);
    assert_eq!(
        keys(&mapper.with_view("internal").to_value(&doc).unwrap()),
        vec!["title", "body"]
    );
    assert_eq!(
        keys(&mapper.with_view("admin").to_value(&doc).unwrap()),
        vec!["title", "body", "audit"]
    );

    let strict = mapper.with_feature(Feature::DefaultViewInclusion, false);
    assert_eq!(keys(&strict.with_view("admin").to_value(&doc).unwrap()), vec!["body", "audit"]);
}

#[test]
fn test_views_filter_input() {
    let mapper = ObjectMapper::new();
    let doc: Document = mapper
        .reader_with_view("public")
        .from_value(value!({ "title": "t", "body": "b", "audit": "a" }))
        .unwrap();
    assert_eq!(doc.title, "t");
    assert_eq!(doc.body, "");
    assert_eq!(doc.audit, "");
}

// Ordering

#[derive(Debug, Default)]
struct Ordered {
    a: i32,
    b: i32,
    c: i32,
}

impl Bean for Ordered {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::order(&["c", "a"]))
            .field("a", Visibility::Public, (), |o| &o.a, |o| &mut o.a)
            .field("b", Visibility::Public, (), |o| &o.b, |o| &mut o.b)
            .field("c", Visibility::Public, (), |o| &o.c, |o| &mut o.c)
            .default_creator(Visibility::Public, Ordered::default)
    }
}

bind_bean!(Ordered);

#[test]
fn test_explicit_property_order() {
    let tree = ObjectMapper::new().to_value(&Ordered::default()).unwrap();
    assert_eq!(keys(&tree), vec!["c", "a", "b"]);
}

#[test]
fn test_alphabetic_order() {
    let mapper = ObjectMapper::new().with_feature(Feature::SortPropertiesAlphabetically, true);
    let tree = mapper.to_value(&alice()).unwrap();
    assert_eq!(keys(&tree), vec!["active", "id", "name", "tags"]);
}

#[derive(Debug, Default, PartialEq)]
struct Ranked {
    e: i32,
    a: i32,
    b: i32,
    c: i32,
    d: i32,
}

impl Bean for Ranked {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::order(&["d", "c"]))
            .field("e", Visibility::Public, (), |r| &r.e, |r| &mut r.e)
            .field("a", Visibility::Public, (), |r| &r.a, |r| &mut r.a)
            .field("b", Visibility::Public, (), |r| &r.b, |r| &mut r.b)
            .field("c", Visibility::Public, (), |r| &r.c, |r| &mut r.c)
            .field("d", Visibility::Public, (), |r| &r.d, |r| &mut r.d)
            .creator(
                "with_b",
                Visibility::Public,
                (),
                vec![Param::named::<i32>("b")],
                |mut args| {
                    Ok(Ranked {
                        b: args.take(0)?,
                        ..Ranked::default()
                    })
                },
            )
    }
}

// Private field exposed through a public getter only.
#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
}

impl Bean for Person {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("name", Visibility::Private, (), |p| &p.name, |p| &mut p.name)
            .getter("getName", Visibility::Public, (), |p| p.name.clone())
            .default_creator(Visibility::Public, Person::default)
    }
}

bind_bean!(Ranked, Person);

#[test]
fn test_order_with_creator_parameters() {
    let ranked = Ranked {
        e: 5,
        a: 1,
        b: 2,
        c: 3,
        d: 4,
    };
    let mapper = ObjectMapper::new();
    let tree = mapper.to_value(&ranked).unwrap();
    assert_eq!(keys(&tree), vec!["d", "c", "b", "e", "a"]);
    assert_eq!(mapper.from_value::<Ranked>(tree).unwrap(), ranked);

    let sorted = mapper.with_feature(Feature::SortPropertiesAlphabetically, true);
    let tree = sorted.to_value(&ranked).unwrap();
    assert_eq!(keys(&tree), vec!["d", "c", "b", "a", "e"]);
}

#[test]
fn test_getter_only_property_is_read_only() {
    let mapper = ObjectMapper::new();
    let person = Person {
        name: "x".to_string(),
    };
    assert_eq!(mapper.to_value(&person).unwrap(), value!({ "name": "x" }));

    let read: Person = mapper.from_value(value!({ "name": "y" })).unwrap();
    assert_eq!(read.name, "");
}

// Directive sources and mix-ins

#[derive(Debug, Default, PartialEq)]
struct Entity {
    label: String,
    internal_id: u32,
}

impl Bean for Entity {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field(
                "label",
                Visibility::Public,
                [Annotation::attr("name", "title"), Annotation::property("entityLabel")],
                |e| &e.label,
                |e| &mut e.label,
            )
            .field(
                "internal_id",
                Visibility::Public,
                Annotation::attr("internal", "true"),
                |e| &e.internal_id,
                |e| &mut e.internal_id,
            )
            .default_creator(Visibility::Public, Entity::default)
    }
}

bind_bean!(Entity);

/// Hides members tagged `internal`.
struct InternalHidden;

impl DirectiveSource for InternalHidden {
    fn is_ignored(&self, annotations: &Annotations) -> bool {
        annotations
            .iter()
            .any(|a| matches!(a, Annotation::Attr { key, .. } if key == "internal"))
    }
}

#[test]
fn test_secondary_vocabulary() {
    let entity = Entity {
        label: "x".to_string(),
        internal_id: 7,
    };

    let native = ObjectMapper::new();
    assert_eq!(keys(&native.to_value(&entity).unwrap()), vec!["entityLabel", "internal_id"]);

    // The native name wins; the attribute vocabulary only adds to it.
    let both = native.with_additional_directive_source(Arc::new(AttributeDirectives));
    assert_eq!(keys(&both.to_value(&entity).unwrap()), vec!["entityLabel", "internal_id"]);

    let attrs_first = ObjectMapper::from_config(
        MapperConfig::new().with_directives(databind::DirectiveChain::pair(
            Arc::new(AttributeDirectives),
            Arc::new(databind::introspect::NativeDirectives),
        )),
    );
    assert_eq!(keys(&attrs_first.to_value(&entity).unwrap()), vec!["title", "internal_id"]);

    let hiding = native.with_additional_directive_source(Arc::new(InternalHidden));
    assert_eq!(keys(&hiding.to_value(&entity).unwrap()), vec!["entityLabel"]);
}

#[test]
fn test_directives_disabled() {
    let mapper = ObjectMapper::from_config(MapperConfig::new().with_use_directives(false));
    let tree = mapper
        .to_value(&Account {
            id: 1,
            display_name: "n".to_string(),
            secret: "s".to_string(),
        })
        .unwrap();
    assert_eq!(keys(&tree), vec!["id", "display_name", "secret"]);
}

#[test]
fn test_mix_in_overrides_registration() {
    let base = ObjectMapper::new();
    let mixed = base.with_mix_in::<User>(
        MixIn::new()
            .class(Annotation::order(&["userName"]))
            .member("name", Annotation::property("userName"))
            .member("tags", Annotation::Ignore),
    );

    let tree = mixed.to_value(&alice()).unwrap();
    assert_eq!(keys(&tree), vec!["userName", "id", "active"]);

    // The original mapper keeps its own bindings.
    assert_eq!(keys(&base.to_value(&alice()).unwrap()), vec!["id", "name", "active", "tags"]);
}

// Root wrapping

#[derive(Debug, Default, PartialEq)]
struct Tagged {
    id: i32,
}

impl Bean for Tagged {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::TypeName("tagged_item".to_string()))
            .field("id", Visibility::Public, (), |t| &t.id, |t| &mut t.id)
            .default_creator(Visibility::Public, Tagged::default)
    }
}

bind_bean!(Tagged);

#[test]
fn test_root_wrapping() {
    let mapper = ObjectMapper::new()
        .with_feature(Feature::WrapRootValue, true)
        .with_feature(Feature::UnwrapRootValue, true);

    let tree = mapper.to_value(&alice()).unwrap();
    assert_eq!(keys(&tree), vec!["User"]);
    assert_eq!(mapper.from_value::<User>(tree).unwrap(), alice());

    let tagged = mapper.to_value(&Tagged { id: 2 }).unwrap();
    assert_eq!(tagged, value!({ "tagged_item": { "id": 2 } }));

    let err = mapper
        .from_value::<Tagged>(value!({ "other": { "id": 2 } }))
        .unwrap_err();
    assert!(err.to_string().contains("does not match expected \"tagged_item\""));
}

// Error reporting

#[derive(Debug, Default)]
struct Team {
    members: Vec<User>,
    leads: BTreeMap<String, User>,
}

impl Bean for Team {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("members", Visibility::Public, (), |t| &t.members, |t| &mut t.members)
            .field("leads", Visibility::Public, (), |t| &t.leads, |t| &mut t.leads)
            .default_creator(Visibility::Public, Team::default)
    }
}

bind_bean!(Team);

#[test]
fn test_error_path_through_sequence() {
    let err = ObjectMapper::new()
        .from_value::<Team>(value!({
            "members": [{ "id": 1 }, { "id": "abc" }]
        }))
        .unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "members[1].id");
    assert!(matches!(err.kind(), Some(MappingErrorKind::TypeMismatch { .. })));
    assert!(err.to_string().contains("(at members[1].id)"));
}

#[test]
fn test_error_path_through_map() {
    let err = ObjectMapper::new()
        .from_value::<Team>(value!({
            "leads": { "bob": { "active": [] } }
        }))
        .unwrap_err();
    assert_eq!(err.path().unwrap().to_string(), "leads[\"bob\"].active");
}

#[test]
fn test_type_mismatch_for_bean() {
    let err = ObjectMapper::new().from_value::<User>(value!([1])).unwrap_err();
    assert!(err.to_string().contains("expected object for User"));
}

#[derive(Debug, Default, PartialEq)]
struct Node {
    name: String,
    children: Vec<Node>,
}

impl Bean for Node {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("name", Visibility::Public, (), |n| &n.name, |n| &mut n.name)
            .field("children", Visibility::Public, (), |n| &n.children, |n| &mut n.children)
            .default_creator(Visibility::Public, Node::default)
    }
}

bind_bean!(Node);

fn chain(depth: usize) -> Node {
    let mut node = Node {
        name: format!("n{}", depth),
        children: Vec::new(),
    };
    for level in (0..depth).rev() {
        node = Node {
            name: format!("n{}", level),
            children: vec![node],
        };
    }
    node
}

#[test]
fn test_recursive_type_round_trip() {
    let mapper = ObjectMapper::new();
    let tree = chain(6);
    let value = mapper.to_value(&tree).unwrap();
    assert_eq!(mapper.from_value::<Node>(value).unwrap(), tree);
}

#[test]
fn test_depth_limit() {
    let deep = ObjectMapper::new().to_value(&chain(20)).unwrap();
    let mapper = ObjectMapper::from_config(MapperConfig::new().with_max_depth(8));

    let err = mapper.from_value::<Node>(deep).unwrap_err();
    assert_eq!(err.kind(), Some(&MappingErrorKind::DepthExceeded { limit: 8 }));
    assert!(err.path().unwrap().to_string().starts_with("children[0]"));

    let err = mapper.to_value(&chain(20)).unwrap_err();
    assert_eq!(err.kind(), Some(&MappingErrorKind::DepthExceeded { limit: 8 }));
}

// Scalars, coercion and special types

#[derive(Debug, Default, PartialEq)]
struct Settings {
    port: u16,
    ratio: f64,
    enabled: bool,
    initial: char,
}

impl Bean for Settings {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("port", Visibility::Public, (), |s| &s.port, |s| &mut s.port)
            .field("ratio", Visibility::Public, (), |s| &s.ratio, |s| &mut s.ratio)
            .field("enabled", Visibility::Public, (), |s| &s.enabled, |s| &mut s.enabled)
            .field("initial", Visibility::Public, (), |s| &s.initial, |s| &mut s.initial)
            .default_creator(Visibility::Public, Settings::default)
    }
}

bind_bean!(Settings);

#[test]
fn test_lenient_scalar_coercion() {
    let settings: Settings = ObjectMapper::new()
        .from_value(value!({ "port": "8080", "ratio": "0.5", "enabled": "true", "initial": "x" }))
        .unwrap();
    assert_eq!(
        settings,
        Settings {
            port: 8080,
            ratio: 0.5,
            enabled: true,
            initial: 'x',
        }
    );

    let from_float: Settings = ObjectMapper::new()
        .from_value(value!({ "port": 80.0, "ratio": 2 }))
        .unwrap();
    assert_eq!(from_float.port, 80);
    assert_eq!(from_float.ratio, 2.0);
}

#[test]
fn test_out_of_range_integer() {
    let err = ObjectMapper::new()
        .from_value::<Settings>(value!({ "port": 70000 }))
        .unwrap_err();
    assert!(err.to_string().contains("70000 is out of range for u16"));
    assert_eq!(err.path().unwrap().to_string(), "port");
}

#[test]
fn test_null_for_primitives() {
    let mapper = ObjectMapper::new();
    let settings: Settings = mapper.from_value(value!({ "port": null })).unwrap();
    assert_eq!(settings.port, 0);

    let strict = mapper.with_feature(Feature::FailOnNullForPrimitives, true);
    assert!(strict.from_value::<Settings>(value!({ "port": null })).is_err());
}

#[test]
fn test_single_value_as_array() {
    let mapper = ObjectMapper::new();
    assert!(mapper.from_value::<Vec<String>>(value!("solo")).is_err());

    let lenient = mapper.with_feature(Feature::AcceptSingleValueAsArray, true);
    assert_eq!(
        lenient.from_value::<Vec<String>>(value!("solo")).unwrap(),
        vec!["solo".to_string()]
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Status {
    Active,
    Inactive,
    Suspended,
}

bind_enum!(Status {
    Active => "active",
    Inactive => "inactive",
    Suspended,
});

#[test]
fn test_enum_values_and_keys() {
    let mapper = ObjectMapper::new();
    assert_eq!(mapper.to_value(&Status::Active).unwrap(), value!("active"));
    assert_eq!(mapper.to_value(&Status::Suspended).unwrap(), value!("Suspended"));
    assert_eq!(mapper.from_value::<Status>(value!("inactive")).unwrap(), Status::Inactive);
    assert_eq!(mapper.from_value::<Status>(value!(2)).unwrap(), Status::Suspended);

    let err = mapper.from_value::<Status>(value!("gone")).unwrap_err();
    assert!(err.to_string().contains("expected one of"));

    let mut counts = HashMap::new();
    counts.insert(Status::Active, 3u32);
    counts.insert(Status::Suspended, 1u32);
    let tree = mapper.to_value(&counts).unwrap();
    assert_eq!(tree.get("active").and_then(Value::as_i64), Some(3));
    assert_eq!(mapper.from_value::<HashMap<Status, u32>>(tree).unwrap(), counts);
}

#[test]
fn test_integer_map_keys() {
    let mut scores = BTreeMap::new();
    scores.insert(10u16, "ten".to_string());
    scores.insert(2u16, "two".to_string());
    let mapper = ObjectMapper::new();
    let tree = mapper.to_value(&scores).unwrap();
    assert_eq!(tree.get("10").and_then(Value::as_str), Some("ten"));
    assert_eq!(mapper.from_value::<BTreeMap<u16, String>>(tree).unwrap(), scores);

    let err = mapper
        .from_value::<BTreeMap<u16, String>>(value!({ "x": "bad" }))
        .unwrap_err();
    assert!(err.kind().is_some());
}

#[test]
fn test_dates() {
    let when: DateTime<Utc> = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    let mapper = ObjectMapper::new();

    let tree = mapper.to_value(&when).unwrap();
    assert_eq!(tree, Value::Number(Number::Integer(1_700_000_000_123)));
    assert_eq!(mapper.from_value::<DateTime<Utc>>(tree).unwrap(), when);

    let text = mapper.with_feature(Feature::WriteDatesAsTimestamps, false);
    let tree = text.to_value(&when).unwrap();
    assert!(tree.as_str().unwrap().starts_with("2023-11-14T22:13:20"));
    assert_eq!(text.from_value::<DateTime<Utc>>(tree).unwrap(), when);
}

#[test]
fn test_big_integers() {
    let huge: BigInt = "123456789012345678901234567890".parse().unwrap();
    let mapper = ObjectMapper::new();
    let tokens = mapper.to_tokens(&huge).unwrap();
    assert_eq!(tokens, vec![Token::BigInt(huge.clone())]);
    assert_eq!(mapper.from_tokens::<BigInt>(tokens).unwrap(), huge);

    let max = u64::MAX;
    let tree = mapper.to_value(&max).unwrap();
    assert_eq!(mapper.from_value::<u64>(tree).unwrap(), max);
}

#[test]
fn test_tree_values_pass_through() {
    let mapper = ObjectMapper::new();
    let tree = value!({ "a": [1, "two", null], "b": { "c": true } });
    let tokens = mapper.to_tokens(&tree).unwrap();
    assert_eq!(mapper.from_tokens::<Value>(tokens).unwrap(), tree);
}

#[test]
fn test_trailing_tokens_are_not_consumed() {
    let mapper = ObjectMapper::new();
    let mut reader = databind::BufferReader::new(vec![Token::Int(1), Token::Int(2)]);
    assert_eq!(mapper.read_tokens::<i32>(&mut reader).unwrap(), 1);
    assert_eq!(mapper.read_tokens::<i32>(&mut reader).unwrap(), 2);
}

// Custom converters

struct FahrenheitWriter;

impl databind::Serializer for FahrenheitWriter {
    fn serialize(
        &self,
        value: &dyn std::any::Any,
        w: &mut dyn databind::TokenWriter,
        _ctx: &mut databind::SerializationContext<'_>,
    ) -> databind::Result<()> {
        let celsius = value
            .downcast_ref::<f64>()
            .ok_or_else(|| Error::custom("expected f64"))?;
        w.write_token(Token::Float(celsius * 1.8 + 32.0))
    }
}

struct FahrenheitReader;

impl databind::Deserializer for FahrenheitReader {
    fn deserialize(
        &self,
        ctx: &mut databind::DeserializationContext<'_>,
    ) -> databind::Result<databind::AnyValue> {
        let fahrenheit = match ctx.current()? {
            Token::Float(f) => *f,
            Token::Int(i) => *i as f64,
            other => return Err(Error::custom(format!("unexpected {:?}", other))),
        };
        Ok(Box::new((fahrenheit - 32.0) / 1.8))
    }
}

#[derive(Debug, Default, PartialEq)]
struct Reading {
    station: String,
    celsius: f64,
}

impl Bean for Reading {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("station", Visibility::Public, (), |r| &r.station, |r| &mut r.station)
            .field(
                "celsius",
                Visibility::Public,
                vec![
                    Annotation::SerializeWith(Arc::new(FahrenheitWriter)),
                    Annotation::DeserializeWith(Arc::new(FahrenheitReader)),
                ],
                |r| &r.celsius,
                |r| &mut r.celsius,
            )
            .default_creator(Visibility::Public, Reading::default)
    }
}

// Inheritance by composition

#[derive(Debug, Default, PartialEq)]
struct Named {
    name: String,
    created: i64,
}

impl Bean for Named {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("name", Visibility::Public, (), |n| &n.name, |n| &mut n.name)
            .field("created", Visibility::Public, (), |n| &n.created, |n| &mut n.created)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Pet {
    base: Named,
    owner: String,
}

impl Bean for Pet {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("owner", Visibility::Public, (), |p| &p.owner, |p| &mut p.owner)
            .default_creator(Visibility::Public, Pet::default)
            .extends(|p| &p.base, |p| &mut p.base)
    }
}

// Two getters deriving the same property name.
#[derive(Debug, Default)]
struct Doubled {
    label: String,
}

impl Bean for Doubled {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .getter("get_label", Visibility::Public, (), |d| d.label.clone())
            .getter("getLabel", Visibility::Public, (), |d| d.label.to_uppercase())
    }
}

bind_bean!(Reading, Named, Pet, Doubled);

#[test]
fn test_custom_converters() {
    let mapper = ObjectMapper::new();
    let reading = Reading {
        station: "north".to_string(),
        celsius: 100.0,
    };
    let tree = mapper.to_value(&reading).unwrap();
    assert_eq!(tree, value!({ "station": "north", "celsius": 212.0 }));

    let back: Reading = mapper
        .from_value(value!({ "station": "south", "celsius": 32 }))
        .unwrap();
    assert_eq!(back.station, "south");
    assert!(back.celsius.abs() < 1e-9);
}

#[test]
fn test_inherited_members() {
    let mapper = ObjectMapper::new();
    let pet = Pet {
        base: Named {
            name: "Rex".to_string(),
            created: 17,
        },
        owner: "Sam".to_string(),
    };
    let tree = mapper.to_value(&pet).unwrap();
    assert_eq!(tree.get("name"), Some(&value!("Rex")));
    assert_eq!(tree.get("created"), Some(&value!(17)));
    assert_eq!(tree.get("owner"), Some(&value!("Sam")));
    assert_eq!(mapper.from_value::<Pet>(tree).unwrap(), pet);
}

#[test]
fn test_duplicate_getters_are_rejected() {
    let mapper = ObjectMapper::new();
    let err = mapper.to_value(&Doubled::default()).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("duplicate property definitions for \"label\""));
}
