//! Registering a bean and mapping it to and from JSON.
//!
//! Run with: cargo run --example bean_binding

use databind::{bind_bean, Annotation, Bean, ClassBuilder, Inclusion, ObjectMapper, Visibility};
use std::error::Error;

#[derive(Debug, Default, PartialEq)]
struct Account {
    id: u32,
    owner: String,
    nickname: Option<String>,
    password: String,
}

impl Bean for Account {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("id", Visibility::Public, (), |a| &a.id, |a| &mut a.id)
            .field(
                "owner",
                Visibility::Public,
                Annotation::property("ownerName"),
                |a| &a.owner,
                |a| &mut a.owner,
            )
            .field(
                "nickname",
                Visibility::Public,
                Annotation::Include(Inclusion::NonNull),
                |a| &a.nickname,
                |a| &mut a.nickname,
            )
            .field("password", Visibility::Public, Annotation::Ignore, |a| &a.password, |a| &mut a.password)
            .default_creator(Visibility::Public, Account::default)
    }
}

bind_bean!(Account);

fn main() -> Result<(), Box<dyn Error>> {
    let mapper = ObjectMapper::new();
    let account = Account {
        id: 7,
        owner: "Ada Lovelace".to_string(),
        nickname: None,
        password: "secret".to_string(),
    };

    // Bean to value tree, then to JSON through serde
    let tree = mapper.to_value(&account)?;
    let json = serde_json::to_string_pretty(&tree)?;
    println!("JSON output:\n{}\n", json);

    // And back: the ignored password keeps its default
    let parsed: databind::Value = serde_json::from_str(&json)?;
    let back: Account = mapper.from_value(parsed)?;
    assert_eq!(back.owner, account.owner);
    assert_eq!(back.password, "");
    println!("✓ Round-trip successful");

    Ok(())
}
