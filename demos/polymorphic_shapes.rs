//! Polymorphic values behind a trait object, tagged with a type property.
//!
//! Run with: cargo run --example polymorphic_shapes

use databind::{
    bind_abstract, bind_bean, AbstractBuilder, Annotation, Bean, ClassBuilder, ObjectMapper,
    Polymorphic, TypeInfoSpec, Visibility,
};
use std::any::Any;
use std::error::Error;
use std::fmt::Debug;

trait Shape: Any + Debug {
    fn as_any(&self) -> &dyn Any;
    fn area(&self) -> f64;
}

#[derive(Debug, Default)]
struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

impl Bean for Circle {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .field("radius", Visibility::Public, (), |c| &c.radius, |c| &mut c.radius)
            .default_creator(Visibility::Public, Circle::default)
    }
}

#[derive(Debug, Default)]
struct Rectangle {
    width: f64,
    height: f64,
}

impl Shape for Rectangle {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Bean for Rectangle {
    fn describe(class: ClassBuilder<Self>) -> ClassBuilder<Self> {
        class
            .annotate(Annotation::TypeName("rect".to_string()))
            .field("width", Visibility::Public, (), |r| &r.width, |r| &mut r.width)
            .field("height", Visibility::Public, (), |r| &r.height, |r| &mut r.height)
            .default_creator(Visibility::Public, Rectangle::default)
    }
}

bind_bean!(Circle, Rectangle);

impl Polymorphic for Box<dyn Shape> {
    fn describe(base: AbstractBuilder<Self>) -> AbstractBuilder<Self> {
        base.annotate(Annotation::TypeInfo(TypeInfoSpec::named_property("kind")))
            .narrow(|s| s.as_any())
            .subtype::<Circle>(Some("circle"), |c| Box::new(c) as Box<dyn Shape>)
            .subtype::<Rectangle>(None, |r| Box::new(r) as Box<dyn Shape>)
    }
}

bind_abstract!(Box<dyn Shape>);

fn main() -> Result<(), Box<dyn Error>> {
    let mapper = ObjectMapper::new();
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Circle { radius: 1.5 }),
        Box::new(Rectangle {
            width: 2.0,
            height: 3.0,
        }),
    ];

    // Each element carries its type id in the "kind" property
    let json = serde_json::to_string(&mapper.to_value(&shapes)?)?;
    println!("JSON output:\n{}\n", json);

    // Reading picks the concrete subtype from the marker
    let back: Vec<Box<dyn Shape>> = mapper.from_value(serde_json::from_str(&json)?)?;
    for shape in &back {
        println!("{:?} has area {:.2}", shape, shape.area());
    }
    assert_eq!(back.len(), shapes.len());
    println!("✓ Round-trip successful");

    Ok(())
}
