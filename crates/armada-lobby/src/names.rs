//! Unique session name allocation.
//!
//! Names come from a fixed pool of fruit names. Once every base name is in
//! use, a numeric suffix (`2`, `3`, …) is appended until a free combination
//! is found, so allocation never fails.

use std::collections::HashSet;

use parking_lot::Mutex;
use rand::Rng;

/// The candidate base names.
pub const BASE_NAMES: [&str; 50] = [
    "Apple",
    "Apricot",
    "Avocado",
    "Banana",
    "Blackberry",
    "Blueberry",
    "Cantaloupe",
    "Cherry",
    "Clementine",
    "Coconut",
    "Cranberry",
    "Currant",
    "Date",
    "Dragonfruit",
    "Durian",
    "Elderberry",
    "Fig",
    "Gooseberry",
    "Grape",
    "Grapefruit",
    "Guava",
    "Honeydew",
    "Jackfruit",
    "Jujube",
    "Kiwi",
    "Kumquat",
    "Lemon",
    "Lime",
    "Lychee",
    "Mandarin",
    "Mango",
    "Mulberry",
    "Nectarine",
    "Olive",
    "Orange",
    "Papaya",
    "Passionfruit",
    "Peach",
    "Pear",
    "Persimmon",
    "Pineapple",
    "Plantain",
    "Plum",
    "Pomegranate",
    "Quince",
    "Raspberry",
    "Starfruit",
    "Strawberry",
    "Tamarind",
    "Tangerine",
];

/// Allocates session names that are unique among the live session set.
///
/// The pool itself is stateless; callers pass in the names currently in use.
/// Allocation is serialized by an internal lock so two concurrent creates
/// cannot pick the same name.
pub struct NamePool {
    lock: Mutex<()>,
}

impl NamePool {
    /// Create a new pool.
    #[must_use]
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }

    /// Pick a name not present in `used`.
    ///
    /// Prefers a random unused base name; once the pool is exhausted,
    /// appends a numeric suffix starting at 2 to a random base name and
    /// increments until the combination is free.
    pub fn allocate(&self, used: &HashSet<String>) -> String {
        let _guard = self.lock.lock();
        let mut rng = rand::rng();

        let free: Vec<&str> = BASE_NAMES
            .iter()
            .copied()
            .filter(|name| !used.contains(*name))
            .collect();
        if !free.is_empty() {
            return free[rng.random_range(0..free.len())].to_owned();
        }

        let base = BASE_NAMES[rng.random_range(0..BASE_NAMES.len())];
        let mut suffix: u32 = 2;
        loop {
            let candidate = format!("{base}{suffix}");
            if !used.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::new()
    }
}
