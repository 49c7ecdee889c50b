//! Fixed symbol catalogs, one per reel.

pub const REEL_COUNT: usize = 3;

const ANIMALS: &[&str] = &[
    "Cat", "Dog", "Shark", "Octopus", "Dragon", "Snake", "Elephant", "Lion", "Bear", "Horse",
    "Rabbit", "Wolf", "Tiger", "Fox", "Dolphin", "Eagle", "Owl", "Frog", "Penguin", "Giraffe",
    "Zebra", "Kangaroo", "Crocodile", "Parrot", "Bat", "Whale", "Ant", "Bee", "Crab", "Lizard",
];

const FRUITS: &[&str] = &[
    "Apple", "Banana", "Orange", "Watermelon", "Grapes", "Pineapple", "Mango", "Lemon",
    "Strawberry", "Blueberry", "Raspberry", "Peach", "Pear", "Kiwi", "Cherry", "Pomegranate",
    "Coconut", "Fig", "Plum", "Apricot", "Papaya", "Melon", "Lychee", "Passionfruit", "Guava",
    "Dragonfruit", "Blackcurrant", "Mulberry", "Cranberry", "Gooseberry",
];

const OBJECTS: &[&str] = &[
    "Sword", "Shield", "Lantern", "Chair", "Table", "Clock", "Mirror", "Crown", "Helmet", "Book",
    "Scroll", "Pen", "Cup", "Bottle", "Key", "Lock", "Dice", "Card", "Bell", "Violin",
    "Drum", "Brush", "Palette", "Hammer", "Anvil", "Telescope", "Compass", "Anchor", "Rope",
    "Backpack",
];

pub const CATALOGS: [&[&str]; REEL_COUNT] = [ANIMALS, FRUITS, OBJECTS];

/// Catalog for `reel`, `None` when the index is out of range.
pub fn catalog(reel: usize) -> Option<&'static [&'static str]> {
    CATALOGS.get(reel).copied()
}

/// Finds `name` in the reel's catalog and hands back the catalog's own copy.
pub fn lookup(reel: usize, name: &str) -> Option<&'static str> {
    catalog(reel)?.iter().copied().find(|s| *s == name)
}

/// Picks an entry from the reel's catalog by wrapping `seed` over its length.
pub fn pick(reel: usize, seed: u64) -> Option<&'static str> {
    let items = catalog(reel)?;
    items.get((seed % items.len() as u64) as usize).copied()
}
