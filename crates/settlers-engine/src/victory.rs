use crate::inventory::Inventory;
use crate::management::MapManagement;
use crate::player::PlayerId;

const SPECIAL_CARD_POINTS: u32 = 2;

/// Victory points from the board and a player's inventory
pub struct VictoryCalculator;

impl VictoryCalculator {
    /// Settlements count 1, cities 2, every victory point card 1 (including
    /// ones bought this turn), longest road and largest army 2 each.
    pub fn calculate(player: PlayerId, board: &MapManagement, inventory: &Inventory) -> u32 {
        let buildings = board.settlements_of(player).len() as u32 + 2 * board.cities_of(player).len() as u32;
        let specials = [inventory.longest_road, inventory.largest_army]
            .into_iter()
            .filter(|&held| held)
            .count() as u32
            * SPECIAL_CARD_POINTS;
        buildings + inventory.victory_point_cards() + specials
    }
}
