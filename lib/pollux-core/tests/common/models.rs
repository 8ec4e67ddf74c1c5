//! Generated-style polymorphic models.

use std::collections::HashMap;
use std::sync::LazyLock;

use pollux_core::decode::{self, Polymorphic, VariantRegistry};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! polymorphic {
    ($name:ident, $registry:ident) => {
        impl Polymorphic for $name {
            fn registry() -> &'static VariantRegistry<Self> {
                &$registry
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                decode::deserialize(deserializer)
            }
        }
    };
}

// Birds, with recursive relations

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bird {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub wingspan: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Goose {
    pub kind: String,
    pub wingspan: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeaGull {
    pub kind: String,
    pub wingspan: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sparrow {
    pub kind: String,
    pub wingspan: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Eagle {
    pub kind: String,
    pub wingspan: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner: Option<Box<BirdClassification>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<BirdClassification>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub hate: HashMap<String, BirdClassification>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BirdClassification {
    Bird(Bird),
    Goose(Goose),
    SeaGull(SeaGull),
    Sparrow(Sparrow),
    Eagle(Eagle),
}

pub static BIRDS: LazyLock<VariantRegistry<BirdClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("BirdClassification", "kind", BirdClassification::Bird)
        .variant("goose", BirdClassification::Goose)
        .variant("seagull", BirdClassification::SeaGull)
        .variant("sparrow", BirdClassification::Sparrow)
        .variant("eagle", BirdClassification::Eagle)
        .build()
});

polymorphic!(BirdClassification, BIRDS);

// Fish, with sub-hierarchies

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fish {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fishtype: Option<String>,
    pub length: f32,
    #[serde(default)]
    pub siblings: Vec<FishClassification>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Salmon {
    pub fishtype: String,
    pub length: f32,
    pub location: Option<String>,
    pub iswild: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SmartSalmon {
    pub fishtype: String,
    pub length: f32,
    pub location: Option<String>,
    pub college_degree: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SalmonClassification {
    Salmon(Salmon),
    SmartSalmon(SmartSalmon),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Shark {
    pub fishtype: String,
    pub length: f32,
    pub age: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sawshark {
    pub fishtype: String,
    pub length: f32,
    pub age: Option<i32>,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Goblinshark {
    pub fishtype: String,
    pub length: f32,
    pub age: Option<i32>,
    pub jawsize: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SharkClassification {
    Shark(Shark),
    Sawshark(Sawshark),
    Goblinshark(Goblinshark),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FishClassification {
    Fish(Fish),
    Salmon(SalmonClassification),
    Shark(SharkClassification),
}

pub static SALMONS: LazyLock<VariantRegistry<SalmonClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("SalmonClassification", "fishtype", SalmonClassification::Salmon)
        .variant("smart_salmon", SalmonClassification::SmartSalmon)
        .build()
});

pub static SHARKS: LazyLock<VariantRegistry<SharkClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("SharkClassification", "fishtype", SharkClassification::Shark)
        .variant("sawshark", SharkClassification::Sawshark)
        .variant("goblin", SharkClassification::Goblinshark)
        .build()
});

pub static FISHES: LazyLock<VariantRegistry<FishClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("FishClassification", "fishtype", FishClassification::Fish)
        .sub_hierarchy("salmon", FishClassification::Salmon)
        .sub_hierarchy("smart_salmon", FishClassification::Salmon)
        .sub_hierarchy("shark", FishClassification::Shark)
        .sub_hierarchy("sawshark", FishClassification::Shark)
        .sub_hierarchy("goblin", FishClassification::Shark)
        .build()
});

polymorphic!(SalmonClassification, SALMONS);
polymorphic!(SharkClassification, SHARKS);
polymorphic!(FishClassification, FISHES);

// Animals

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Animal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dog {
    pub kind: String,
    pub name: Option<String>,
    pub breed: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Cat {
    pub kind: String,
    pub name: Option<String>,
    pub lives: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnimalClassification {
    Animal(Animal),
    Dog(Dog),
    Cat(Cat),
}

pub static ANIMALS: LazyLock<VariantRegistry<AnimalClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("AnimalClassification", "kind", AnimalClassification::Animal)
        .variant("dog", AnimalClassification::Dog)
        .variant("cat", AnimalClassification::Cat)
        .build()
});

polymorphic!(AnimalClassification, ANIMALS);
