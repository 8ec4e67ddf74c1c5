//! Wire models of the disk service.

use std::sync::LazyLock;

use pollux_core::decode::{self, Polymorphic, VariantRegistry};
use serde::{Deserialize, Deserializer, Serialize};

/// A managed disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    pub size_gb: u32,
    pub properties: DiskProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskProperties {
    pub provisioning_state: String,
}

/// Body of a create-or-update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUpdate {
    pub size_gb: u32,
}

/// Base shape of every animal, also used for kinds this client does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    pub kind: String,
    pub name: String,
    pub breed: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub friends: Vec<AnimalClassification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub kind: String,
    pub name: String,
    pub lives: u8,
}

/// The `Animal` hierarchy, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnimalClassification {
    Animal(Animal),
    Dog(Dog),
    Cat(Cat),
}

impl AnimalClassification {
    pub fn name(&self) -> &str {
        match self {
            Self::Animal(Animal { name, .. })
            | Self::Dog(Dog { name, .. })
            | Self::Cat(Cat { name, .. }) => name,
        }
    }
}

static ANIMALS: LazyLock<VariantRegistry<AnimalClassification>> = LazyLock::new(|| {
    VariantRegistry::builder("AnimalClassification", "kind", AnimalClassification::Animal)
        .variant("dog", AnimalClassification::Dog)
        .variant("cat", AnimalClassification::Cat)
        .build()
});

impl Polymorphic for AnimalClassification {
    fn registry() -> &'static VariantRegistry<Self> {
        &ANIMALS
    }
}

impl<'de> Deserialize<'de> for AnimalClassification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        decode::deserialize(deserializer)
    }
}
