//! Fixed name tables: entity categories, block synonyms and item keywords.
//!
//! Every table is an ordered list; order is significant wherever a lookup picks the first match.

use super::types::EquipSlot;

/// Entity type names treated as threats.
pub const HOSTILE: &[&str] = &[
    "zombie", "skeleton", "creeper", "spider", "enderman", "witch", "slime", "phantom",
];

const MONSTER_ALIAS: &[&str] = &[
    "zombie", "skeleton", "creeper", "spider", "enderman", "witch", "slime",
];

const ANIMAL_ALIAS: &[&str] = &["cow", "sheep", "pig", "chicken", "wolf", "horse"];

/// Who belongs to a category alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMembers {
    /// Entity type names.
    Fixed(&'static [&'static str]),
    /// Whoever is connected right now.
    Players,
}

pub const CATEGORY_ALIASES: &[(&str, CategoryMembers)] = &[
    ("monster", CategoryMembers::Fixed(MONSTER_ALIAS)),
    ("animal", CategoryMembers::Fixed(ANIMAL_ALIAS)),
    ("player", CategoryMembers::Players),
];

const LOGS: &[&str] = &[
    "oak_log",
    "birch_log",
    "spruce_log",
    "jungle_log",
    "acacia_log",
    "dark_oak_log",
];

/// Colloquial term -> canonical block names, tried in order.
pub const BLOCK_SYNONYMS: &[(&str, &[&str])] = &[
    ("wood", LOGS),
    ("tree", LOGS),
    ("log", LOGS),
    ("stone", &["stone", "cobblestone"]),
    ("coal", &["coal_ore", "deepslate_coal_ore"]),
    ("iron", &["iron_ore", "deepslate_iron_ore"]),
    ("gold", &["gold_ore", "deepslate_gold_ore"]),
    ("diamond", &["diamond_ore", "deepslate_diamond_ore"]),
];

pub const TOOL_KEYWORDS: &[&str] = &["pickaxe", "axe", "shovel", "hoe"];
pub const WEAPON_KEYWORDS: &[&str] = &["sword"];
pub const FOOD_KEYWORDS: &[&str] = &[
    "apple", "bread", "cooked", "carrot", "potato", "stew", "melon_slice",
];

/// Armor piece keyword -> slot, in equip order.
pub const ARMOR_SLOTS: &[(&str, EquipSlot)] = &[
    ("helmet", EquipSlot::Head),
    ("chestplate", EquipSlot::Torso),
    ("leggings", EquipSlot::Legs),
    ("boots", EquipSlot::Feet),
];

/// Material prefixes from weakest to strongest.
pub const MATERIAL_TIERS: &[&str] = &[
    "wooden",
    "leather",
    "stone",
    "golden",
    "chainmail",
    "iron",
    "diamond",
    "netherite",
];

pub fn category_members(alias: &str) -> Option<CategoryMembers> {
    CATEGORY_ALIASES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(alias.trim()))
        .map(|(_, members)| *members)
}

pub fn block_synonyms(term: &str) -> Option<&'static [&'static str]> {
    BLOCK_SYNONYMS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(term.trim()))
        .map(|(_, names)| *names)
}

pub fn contains_any(name: &str, keywords: &[&str]) -> bool {
    let name = name.to_lowercase();
    keywords.iter().any(|k| name.contains(k))
}

pub fn is_hostile(entity_name: &str) -> bool {
    contains_any(entity_name, HOSTILE)
}

pub fn armor_slot(item_name: &str) -> Option<EquipSlot> {
    let name = item_name.to_lowercase();
    ARMOR_SLOTS
        .iter()
        .find(|(keyword, _)| name.contains(keyword))
        .map(|(_, slot)| *slot)
}

/// Tier index of an item's material prefix; unknown materials rank below wood.
pub fn material_tier(item_name: &str) -> usize {
    let name = item_name.to_lowercase();
    MATERIAL_TIERS
        .iter()
        .position(|tier| name.starts_with(tier))
        .map(|i| i + 1)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_and_synonyms_are_case_insensitive() {
        assert_eq!(
            category_members("Monster"),
            Some(CategoryMembers::Fixed(MONSTER_ALIAS))
        );
        assert_eq!(category_members("player"), Some(CategoryMembers::Players));
        assert!(category_members("villain").is_none());
        assert_eq!(block_synonyms("WOOD").map(|s| s[1]), Some("birch_log"));
    }

    #[test]
    fn hostile_classification_uses_substrings() {
        assert!(is_hostile("zombie_villager"));
        assert!(is_hostile("cave_spider"));
        assert!(!is_hostile("cow"));
    }

    #[test]
    fn tiers_order_materials() {
        assert!(material_tier("diamond_sword") > material_tier("iron_sword"));
        assert!(material_tier("iron_helmet") > material_tier("golden_helmet"));
        assert_eq!(material_tier("turtle_helmet"), 0);
    }
}
