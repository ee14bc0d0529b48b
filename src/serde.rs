use super::ShardedMap;

use serde::de::{Deserialize, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserializer;

use std::fmt;
use std::marker::PhantomData;

pub struct ShardedMapVisitor<V> {
    marker: PhantomData<fn() -> ShardedMap<V>>,
}

impl<V> ShardedMapVisitor<V> {
    fn new() -> Self {
        ShardedMapVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, V> Visitor<'de> for ShardedMapVisitor<V>
where
    V: Deserialize<'de>,
{
    type Value = ShardedMap<V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map with string keys")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let map = ShardedMap::new();

        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.set(key, value);
        }

        Ok(map)
    }
}

impl<'de, V> Deserialize<'de> for ShardedMap<V>
where
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ShardedMapVisitor::<V>::new())
    }
}

impl<V> Serialize for ShardedMap<V>
where
    V: Serialize + Clone,
{
    /// Serializes a [`ShardedMap::to_map`] snapshot.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let snapshot = self.to_map();
        let mut map = serializer.serialize_map(Some(snapshot.len()))?;
        for (key, value) in &snapshot {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
