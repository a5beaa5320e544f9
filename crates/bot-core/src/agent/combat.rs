//! Gear selection and retreat geometry used by the combat and flee steps.

use std::cmp::Ordering;

use crate::world::catalog::{armor_slot, material_tier, ARMOR_SLOTS};
use crate::world::{EquipSlot, ItemStack, Vec3};

fn weapon_class(name: &str) -> u8 {
    let name = name.to_lowercase();
    if name.contains("sword") {
        2
    } else if name.contains("axe") && !name.contains("pickaxe") {
        1
    } else {
        0
    }
}

/// Strongest melee weapon held: any sword beats any axe, then material tier.
pub fn best_weapon(items: &[ItemStack]) -> Option<&ItemStack> {
    items
        .iter()
        .filter(|i| weapon_class(&i.name) > 0)
        .max_by(|a, b| {
            (weapon_class(&a.name), material_tier(&a.name))
                .cmp(&(weapon_class(&b.name), material_tier(&b.name)))
                .then_with(|| a.name.cmp(&b.name))
        })
}

fn armor_rank(a: &ItemStack, b: &ItemStack) -> Ordering {
    material_tier(&a.name)
        .cmp(&material_tier(&b.name))
        .then_with(|| a.name.cmp(&b.name))
}

/// Best piece per armor slot in helmet, chestplate, leggings, boots order.
///
/// Pieces rank by material tier; equal tiers fall back to the lexicographically greatest name.
pub fn best_armor(items: &[ItemStack]) -> Vec<(EquipSlot, &ItemStack)> {
    ARMOR_SLOTS
        .iter()
        .filter_map(|(_, slot)| {
            items
                .iter()
                .filter(|i| armor_slot(&i.name) == Some(*slot))
                .max_by(|a, b| armor_rank(a, b))
                .map(|piece| (*slot, piece))
        })
        .collect()
}

/// Point to retreat to when running from `danger`.
///
/// Mirrors `danger` through `me` on the horizontal plane and stretches the leg to at least
/// `min_distance`. A danger standing on top of the agent yields a +x retreat.
pub fn flee_point(me: Vec3, danger: Vec3, min_distance: f32) -> Vec3 {
    let dx = me.x - danger.x;
    let dz = me.z - danger.z;
    let len = (dx * dx + dz * dz).sqrt();
    if len < 1e-3 {
        return me.offset(min_distance, 0.0, 0.0);
    }
    let reach = len.max(min_distance);
    me.offset(dx / len * reach, 0.0, dz / len * reach)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::stack;

    #[test]
    fn sword_beats_axe_and_tier_breaks_ties() {
        let items = vec![
            stack("diamond_axe", 1),
            stack("stone_sword", 1),
            stack("iron_sword", 1),
            stack("diamond_pickaxe", 1),
        ];
        assert_eq!(best_weapon(&items).map(|i| i.name.as_str()), Some("iron_sword"));

        let items = vec![stack("iron_pickaxe", 1), stack("golden_axe", 1)];
        assert_eq!(best_weapon(&items).map(|i| i.name.as_str()), Some("golden_axe"));
        assert!(best_weapon(&[stack("iron_pickaxe", 1)]).is_none());
    }

    #[test]
    fn armor_picks_best_per_slot() {
        let items = vec![
            stack("leather_boots", 1),
            stack("iron_boots", 1),
            stack("turtle_helmet", 1),
            stack("chainmail_helmet", 1),
            stack("diamond_chestplate", 1),
        ];
        let picked: Vec<_> = best_armor(&items)
            .into_iter()
            .map(|(slot, i)| (slot, i.name.as_str()))
            .collect();
        assert_eq!(
            picked,
            vec![
                (EquipSlot::Head, "chainmail_helmet"),
                (EquipSlot::Torso, "diamond_chestplate"),
                (EquipSlot::Feet, "iron_boots"),
            ]
        );
    }

    #[test]
    fn unknown_materials_tie_break_by_name() {
        let items = vec![stack("turtle_helmet", 1), stack("copper_helmet", 1)];
        let picked = best_armor(&items);
        assert_eq!(picked[0].1.name, "turtle_helmet");
    }

    #[test]
    fn flee_point_mirrors_and_stretches() {
        let me = Vec3::new(0.0, 64.0, 0.0);
        let p = flee_point(me, Vec3::new(2.0, 64.0, 0.0), 16.0);
        assert_eq!(p, Vec3::new(-16.0, 64.0, 0.0));

        let p = flee_point(me, Vec3::new(0.0, 70.0, -30.0), 16.0);
        assert_eq!(p, Vec3::new(0.0, 64.0, 30.0));

        let p = flee_point(me, me, 16.0);
        assert_eq!(p, Vec3::new(16.0, 64.0, 0.0));
    }
}
