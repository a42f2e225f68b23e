//! Placement legality and ownership changes.
//!
//! [`MapManagement`] wraps the [`MapModel`] and is the only way to build on
//! it. Every operation checks first and mutates second, so a rejected
//! placement leaves the board exactly as it was.

use crate::error::GameError;
use crate::hex::{EdgeCoord, HexCoord, IntersectionCoord, MapPoint};
use crate::map::{Building, HarborKind, MapModel};
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Whether the road-connectivity rule applies to a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementMode {
    /// Opening placements stand alone
    Setup,
    /// Must touch one of the player's roads
    Normal,
}

#[derive(Debug, Clone)]
pub struct MapManagement {
    map: MapModel,
}

impl MapManagement {
    pub fn new(map: MapModel) -> Self {
        Self { map }
    }

    pub fn map(&self) -> &MapModel {
        &self.map
    }

    // ==================== Settlements and Cities ====================

    fn check_settlement(
        &self,
        player: PlayerId,
        point: MapPoint,
        mode: PlacementMode,
    ) -> Result<IntersectionCoord, GameError> {
        let intersection = self
            .map
            .intersection_at(point)
            .ok_or_else(|| GameError::placement("not an intersection on the board"))?;
        let coord = intersection.coord;
        if !intersection.building.is_free() {
            return Err(GameError::placement("intersection is occupied"));
        }
        if self
            .map
            .neighbours_of_intersection(coord)
            .iter()
            .any(|n| !self.map.building(*n).is_free())
        {
            return Err(GameError::placement("too close to another building"));
        }
        if mode == PlacementMode::Normal
            && !self
                .map
                .edges_of_intersection(coord)
                .iter()
                .any(|e| self.map.road(*e) == Some(player))
        {
            return Err(GameError::placement("not connected to one of your roads"));
        }
        Ok(coord)
    }

    pub fn settlement_placeable(&self, player: PlayerId, point: MapPoint, mode: PlacementMode) -> bool {
        self.check_settlement(player, point, mode).is_ok()
    }

    pub fn place_settlement(
        &mut self,
        player: PlayerId,
        point: MapPoint,
        mode: PlacementMode,
    ) -> Result<IntersectionCoord, GameError> {
        let coord = self.check_settlement(player, point, mode).inspect_err(|e| {
            debug!(player, ?point, error = %e, "settlement rejected");
        })?;
        self.map.set_building(coord, Building::Settlement(player));
        debug!(player, %coord, "settlement placed");
        Ok(coord)
    }

    pub fn upgrade_settlement(&mut self, player: PlayerId, point: MapPoint) -> Result<IntersectionCoord, GameError> {
        let intersection = self
            .map
            .intersection_at(point)
            .ok_or_else(|| GameError::placement("not an intersection on the board"))?;
        if intersection.building != Building::Settlement(player) {
            return Err(GameError::placement("no settlement of yours to upgrade"));
        }
        let coord = intersection.coord;
        self.map.set_building(coord, Building::City(player));
        debug!(player, %coord, "settlement upgraded");
        Ok(coord)
    }

    // ==================== Roads ====================

    fn check_road(&self, player: PlayerId, point: MapPoint) -> Result<EdgeCoord, GameError> {
        let edge = self
            .map
            .edge_at(point)
            .ok_or_else(|| GameError::placement("not an edge on the board"))?;
        if edge.road.is_some() {
            return Err(GameError::placement("edge already has a road"));
        }
        let coord = edge.coord;
        let connected = coord.endpoints().iter().any(|&end| {
            match self.map.building(end).owner() {
                Some(owner) => owner == player,
                // an opponent's building cuts the network at this corner
                None => self
                    .map
                    .edges_of_intersection(end)
                    .iter()
                    .any(|e| *e != coord && self.map.road(*e) == Some(player)),
            }
        });
        if !connected {
            return Err(GameError::placement("not connected to your network"));
        }
        Ok(coord)
    }

    pub fn road_placeable(&self, player: PlayerId, point: MapPoint) -> bool {
        self.check_road(player, point).is_ok()
    }

    pub fn place_road(&mut self, player: PlayerId, point: MapPoint) -> Result<EdgeCoord, GameError> {
        let coord = self.check_road(player, point).inspect_err(|e| {
            debug!(player, ?point, error = %e, "road rejected");
        })?;
        self.map.set_road(coord, Some(player));
        debug!(player, %coord, "road placed");
        Ok(coord)
    }

    /// Undo a road placed earlier in the same action
    pub(crate) fn remove_road(&mut self, coord: EdgeCoord) {
        self.map.set_road(coord, None);
    }

    // ==================== Longest Road ====================

    fn blocked_for(&self, player: PlayerId, at: IntersectionCoord) -> bool {
        self.map.building(at).owner().is_some_and(|o| o != player)
    }

    /// Longest trail continuing from `at` over unused roads of `player`
    fn trail_from(&self, player: PlayerId, at: IntersectionCoord, used: &mut HashSet<EdgeCoord>) -> u32 {
        let mut best = 0;
        for edge in self.map.edges_of_intersection(at) {
            if self.map.road(edge) != Some(player) || used.contains(&edge) {
                continue;
            }
            let Some(next) = edge.other_end(at) else {
                continue;
            };
            used.insert(edge);
            let onward = if self.blocked_for(player, next) {
                0
            } else {
                self.trail_from(player, next, used)
            };
            used.remove(&edge);
            best = best.max(1 + onward);
        }
        best
    }

    /// Length of the longest trail (no edge twice) through `player`'s roads
    pub fn road_length(&self, player: PlayerId) -> u32 {
        let starts: BTreeSet<IntersectionCoord> = self
            .roads_of(player)
            .iter()
            .flat_map(|e| e.endpoints())
            .collect();
        starts
            .into_iter()
            .map(|start| self.trail_from(player, start, &mut HashSet::new()))
            .max()
            .unwrap_or(0)
    }

    /// The player with the longest road and its length.
    ///
    /// `incumbent` keeps the title on a tie. A tie among other players yields
    /// `None`, as does a board with no roads.
    pub fn longest_road(&self, incumbent: Option<PlayerId>) -> Option<(PlayerId, u32)> {
        let owners: BTreeSet<PlayerId> = self.map.edges().filter_map(|e| e.road).collect();
        let lengths: BTreeMap<PlayerId, u32> = owners
            .into_iter()
            .map(|p| (p, self.road_length(p)))
            .collect();
        let best = lengths.values().copied().max().filter(|&l| l > 0)?;
        let leaders: Vec<PlayerId> = lengths
            .iter()
            .filter(|(_, l)| **l == best)
            .map(|(p, _)| *p)
            .collect();
        match incumbent {
            Some(holder) if leaders.contains(&holder) => Some((holder, best)),
            _ if leaders.len() == 1 => Some((leaders[0], best)),
            _ => None,
        }
    }

    // ==================== Robber ====================

    /// Move the robber to a different land hex
    pub fn move_robber(&mut self, point: MapPoint) -> Result<HexCoord, GameError> {
        if point.as_hex() == Some(self.map.robber_position()) {
            return Err(GameError::placement("robber must move to a different hex"));
        }
        self.map.move_robber_to(point)?;
        Ok(self.map.robber_position())
    }

    /// Owners of buildings on `hex`, other than `acting`
    pub fn eligible_victims(&self, hex: HexCoord, acting: PlayerId) -> BTreeSet<PlayerId> {
        self.map
            .intersections_of_hex(hex)
            .into_iter()
            .filter_map(|i| self.map.building(i).owner())
            .filter(|&p| p != acting)
            .collect()
    }

    // ==================== Queries ====================

    /// Harbors reachable from `player`'s settlements and cities
    pub fn harbors_of(&self, player: PlayerId) -> Vec<HarborKind> {
        self.map
            .intersections()
            .filter(|i| i.building.owner() == Some(player))
            .filter_map(|i| i.harbor)
            .collect()
    }

    pub fn settlements_of(&self, player: PlayerId) -> Vec<IntersectionCoord> {
        self.buildings_matching(Building::Settlement(player))
    }

    pub fn cities_of(&self, player: PlayerId) -> Vec<IntersectionCoord> {
        self.buildings_matching(Building::City(player))
    }

    fn buildings_matching(&self, building: Building) -> Vec<IntersectionCoord> {
        let mut found: Vec<_> = self
            .map
            .intersections()
            .filter(|i| i.building == building)
            .map(|i| i.coord)
            .collect();
        found.sort();
        found
    }

    pub fn roads_of(&self, player: PlayerId) -> Vec<EdgeCoord> {
        let mut found: Vec<_> = self
            .map
            .edges()
            .filter(|e| e.road == Some(player))
            .map(|e| e.coord)
            .collect();
        found.sort();
        found
    }

    pub fn placeable_settlements(&self, player: PlayerId, mode: PlacementMode) -> Vec<IntersectionCoord> {
        let mut found: Vec<_> = self
            .map
            .intersections()
            .map(|i| i.coord)
            .filter(|&c| self.settlement_placeable(player, c.into(), mode))
            .collect();
        found.sort();
        found
    }

    pub fn placeable_roads(&self, player: PlayerId) -> Vec<EdgeCoord> {
        let mut found: Vec<_> = self
            .map
            .edges()
            .map(|e| e.coord)
            .filter(|&c| self.road_placeable(player, c.into()))
            .collect();
        found.sort();
        found
    }

    pub fn upgradeable_settlements(&self, player: PlayerId) -> Vec<IntersectionCoord> {
        self.settlements_of(player)
    }
}
