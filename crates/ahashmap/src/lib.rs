//! A `hashbrown` map keyed with `ahash` by default, so callers get
//! `entry_ref` (and the other hashbrown-only APIs) without paying for std's
//! SipHash.

#[cfg(feature = "ahash")]
pub type AHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

#[cfg(not(feature = "ahash"))]
pub type AHashMap<K, V> = hashbrown::HashMap<K, V>;

#[cfg(feature = "ahash")]
pub type AHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

#[cfg(not(feature = "ahash"))]
pub type AHashSet<K> = hashbrown::HashSet<K>;
