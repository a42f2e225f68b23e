//! The static board graph.
//!
//! [`MapModel`] holds every hex, intersection and edge built from a
//! [`Configuration`] and answers lookups and adjacency queries. It knows
//! nothing about the rules: legality lives in
//! [`crate::management::MapManagement`], which is the only code that changes
//! ownership.

use crate::configuration::{land_layout, Configuration, ConfigurationError, LAND_RADIUS};
use crate::error::GameError;
use crate::hex::{Direction, EdgeCoord, EdgeOrientation, HexCoord, IntersectionCoord, MapPoint};
use crate::inventory::Resource;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a harbor trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarborKind {
    /// 3:1 for any resource
    Generic,
    /// 2:1 for one resource
    Specific(Resource),
}

impl HarborKind {
    pub fn ratio(&self) -> u32 {
        match self {
            HarborKind::Generic => 3,
            HarborKind::Specific(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HexKind {
    Water,
    Desert,
    Resource { resource: Resource, token: u8 },
    /// A water hex with a harbor on the side facing `faces`
    Harbor {
        faces: HexCoord,
        side: Direction,
        kind: HarborKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hex {
    pub coord: HexCoord,
    pub kind: HexKind,
    /// Only ever set on land
    pub robber: bool,
}

impl Hex {
    pub fn is_land(&self) -> bool {
        matches!(self.kind, HexKind::Desert | HexKind::Resource { .. })
    }

    /// Resource and token, for producing hexes
    pub fn production(&self) -> Option<(Resource, u8)> {
        match self.kind {
            HexKind::Resource { resource, token } => Some((resource, token)),
            _ => None,
        }
    }
}

/// What stands on an intersection. The owner is part of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Building {
    #[default]
    Free,
    Settlement(PlayerId),
    City(PlayerId),
}

impl Building {
    pub fn owner(&self) -> Option<PlayerId> {
        match self {
            Building::Free => None,
            Building::Settlement(p) | Building::City(p) => Some(*p),
        }
    }

    /// Resources produced per matching roll
    pub fn yield_multiplier(&self) -> u32 {
        match self {
            Building::Free => 0,
            Building::Settlement(_) => 1,
            Building::City(_) => 2,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, Building::Free)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intersection {
    pub coord: IntersectionCoord,
    pub building: Building,
    /// Harbor a building here may trade through
    pub harbor: Option<HarborKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub coord: EdgeCoord,
    pub orientation: EdgeOrientation,
    pub road: Option<PlayerId>,
}

#[derive(Debug, Clone)]
pub struct MapModel {
    hexes: HashMap<HexCoord, Hex>,
    intersections: HashMap<IntersectionCoord, Intersection>,
    edges: HashMap<EdgeCoord, Edge>,
    robber: HexCoord,
}

/// Flat, sorted form of a map for snapshots (JSON cannot key on structs)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapView {
    pub hexes: Vec<Hex>,
    pub intersections: Vec<Intersection>,
    pub edges: Vec<Edge>,
    pub robber: HexCoord,
}

impl MapModel {
    /// Lay out the board described by `config`.
    ///
    /// Land fills the spiral of radius 2 in configuration order. The ring
    /// around it is water, and every other hex of that ring (starting with the
    /// first) becomes a harbor facing its first land neighbour.
    pub fn build_from(config: &Configuration) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut hexes = HashMap::new();
        let mut tokens = config.tokens.iter();
        for (coord, resource) in land_layout().into_iter().zip(&config.hexes) {
            let kind = match resource {
                None => HexKind::Desert,
                Some(resource) => {
                    // validate() guarantees one token per producing hex
                    let token = tokens.next().copied().ok_or(ConfigurationError::TokenCount {
                        expected: config.hexes.iter().flatten().count(),
                        actual: config.tokens.len(),
                    })?;
                    HexKind::Resource {
                        resource: *resource,
                        token,
                    }
                }
            };
            hexes.insert(
                coord,
                Hex {
                    coord,
                    kind,
                    robber: coord == config.robber,
                },
            );
        }

        let mut intersections = HashMap::new();
        let mut edges = HashMap::new();
        for coord in hexes.keys() {
            for corner in coord.intersections() {
                intersections.entry(corner).or_insert(Intersection {
                    coord: corner,
                    building: Building::Free,
                    harbor: None,
                });
            }
            for side in coord.edges() {
                edges.entry(side).or_insert(Edge {
                    coord: side,
                    orientation: side.orientation(),
                    road: None,
                });
            }
        }

        let mut harbors = config.harbors.iter();
        for (i, coord) in HexCoord::ORIGIN.ring(LAND_RADIUS + 1).into_iter().enumerate() {
            let facing = (i % 2 == 0)
                .then(|| {
                    Direction::ALL
                        .into_iter()
                        .find(|d| hexes.get(&coord.neighbor(*d)).is_some_and(Hex::is_land))
                })
                .flatten();
            let kind = match facing.and_then(|side| harbors.next().map(|k| (side, *k))) {
                Some((side, kind)) => {
                    let shared = coord.edge_towards(side);
                    for end in shared.endpoints() {
                        if let Some(intersection) = intersections.get_mut(&end) {
                            intersection.harbor = Some(kind);
                        }
                    }
                    HexKind::Harbor {
                        faces: coord.neighbor(side),
                        side,
                        kind,
                    }
                }
                None => HexKind::Water,
            };
            hexes.insert(
                coord,
                Hex {
                    coord,
                    kind,
                    robber: false,
                },
            );
        }

        tracing::debug!(
            hexes = hexes.len(),
            intersections = intersections.len(),
            edges = edges.len(),
            "map built"
        );

        Ok(Self {
            hexes,
            intersections,
            edges,
            robber: config.robber,
        })
    }

    // ==================== Lookups ====================

    pub fn hex_at(&self, point: MapPoint) -> Option<&Hex> {
        point.as_hex().and_then(|c| self.hexes.get(&c))
    }

    pub fn intersection_at(&self, point: MapPoint) -> Option<&Intersection> {
        point.as_intersection().and_then(|c| self.intersections.get(&c))
    }

    pub fn edge_at(&self, point: MapPoint) -> Option<&Edge> {
        point.as_edge().and_then(|c| self.edges.get(&c))
    }

    pub fn hex(&self, coord: HexCoord) -> Option<&Hex> {
        self.hexes.get(&coord)
    }

    pub fn intersection(&self, coord: IntersectionCoord) -> Option<&Intersection> {
        self.intersections.get(&coord)
    }

    pub fn edge(&self, coord: EdgeCoord) -> Option<&Edge> {
        self.edges.get(&coord)
    }

    pub fn building(&self, coord: IntersectionCoord) -> Building {
        self.intersections
            .get(&coord)
            .map_or(Building::Free, |i| i.building)
    }

    pub fn road(&self, coord: EdgeCoord) -> Option<PlayerId> {
        self.edges.get(&coord).and_then(|e| e.road)
    }

    pub fn hexes(&self) -> impl Iterator<Item = &Hex> {
        self.hexes.values()
    }

    pub fn land_hexes(&self) -> impl Iterator<Item = &Hex> {
        self.hexes.values().filter(|h| h.is_land())
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    // ==================== Adjacency ====================

    /// On-board intersections one edge away
    pub fn neighbours_of_intersection(&self, coord: IntersectionCoord) -> Vec<IntersectionCoord> {
        coord
            .neighbours()
            .into_iter()
            .filter(|n| self.intersections.contains_key(n))
            .collect()
    }

    /// On-board edges meeting at `coord`
    pub fn edges_of_intersection(&self, coord: IntersectionCoord) -> Vec<EdgeCoord> {
        coord
            .edges()
            .into_iter()
            .filter(|e| self.edges.contains_key(e))
            .collect()
    }

    /// On-board hexes (land or water) sharing the corner `coord`
    pub fn hexes_of_intersection(&self, coord: IntersectionCoord) -> Vec<HexCoord> {
        coord
            .touching_hexes()
            .into_iter()
            .filter(|h| self.hexes.contains_key(h))
            .collect()
    }

    pub fn intersections_of_hex(&self, coord: HexCoord) -> Vec<IntersectionCoord> {
        coord
            .intersections()
            .into_iter()
            .filter(|i| self.intersections.contains_key(i))
            .collect()
    }

    // ==================== Robber ====================

    pub fn robber_position(&self) -> HexCoord {
        self.robber
    }

    /// Move the robber onto the land hex at `point`
    pub fn move_robber_to(&mut self, point: MapPoint) -> Result<(), GameError> {
        let target = match self.hex_at(point) {
            Some(hex) if hex.is_land() => hex.coord,
            Some(_) => return Err(GameError::placement("robber must stay on land")),
            None => return Err(GameError::placement("robber target is not a board hex")),
        };
        if let Some(hex) = self.hexes.get_mut(&self.robber) {
            hex.robber = false;
        }
        if let Some(hex) = self.hexes.get_mut(&target) {
            hex.robber = true;
        }
        self.robber = target;
        Ok(())
    }

    /// Hexes flagged with the robber; 1 on every well-formed map
    pub fn robber_count(&self) -> usize {
        self.hexes.values().filter(|h| h.robber).count()
    }

    // ==================== Mutation (MapManagement only) ====================

    pub(crate) fn set_building(&mut self, coord: IntersectionCoord, building: Building) {
        if let Some(intersection) = self.intersections.get_mut(&coord) {
            intersection.building = building;
        }
    }

    pub(crate) fn set_road(&mut self, coord: EdgeCoord, road: Option<PlayerId>) {
        if let Some(edge) = self.edges.get_mut(&coord) {
            edge.road = road;
        }
    }

    pub fn view(&self) -> MapView {
        let mut hexes: Vec<Hex> = self.hexes.values().copied().collect();
        hexes.sort_by_key(|h| h.coord);
        let mut intersections: Vec<Intersection> = self.intersections.values().copied().collect();
        intersections.sort_by_key(|i| i.coord);
        let mut edges: Vec<Edge> = self.edges.values().copied().collect();
        edges.sort_by_key(|e| e.coord);
        MapView {
            hexes,
            intersections,
            edges,
            robber: self.robber,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::Pole;
    use std::collections::HashSet;

    fn beginner_map() -> MapModel {
        MapModel::build_from(&Configuration::beginner()).unwrap()
    }

    #[test]
    fn test_standard_board_size() {
        let map = beginner_map();
        assert_eq!(map.land_hexes().count(), 19);
        assert_eq!(map.hexes().count(), 19 + 18);
        assert_eq!(map.intersections().count(), 54);
        assert_eq!(map.edges().count(), 72);
    }

    #[test]
    fn test_nine_harbors_with_two_corners_each() {
        let map = beginner_map();
        let harbors: Vec<_> = map
            .hexes()
            .filter(|h| matches!(h.kind, HexKind::Harbor { .. }))
            .collect();
        assert_eq!(harbors.len(), 9);
        assert_eq!(map.intersections().filter(|i| i.harbor.is_some()).count(), 18);

        for hex in harbors {
            if let HexKind::Harbor { faces, side, kind } = hex.kind {
                assert!(map.hex(faces).is_some_and(Hex::is_land));
                for end in hex.coord.edge_towards(side).endpoints() {
                    assert_eq!(map.intersection(end).and_then(|i| i.harbor), Some(kind));
                }
            }
        }
    }

    #[test]
    fn test_every_harbor_faces_land() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        for seed in 0..20 {
            let config = Configuration::random(&mut StdRng::seed_from_u64(seed));
            let map = MapModel::build_from(&config).unwrap();
            let facing_water: Vec<_> = map
                .hexes()
                .filter_map(|h| match h.kind {
                    HexKind::Harbor { faces, .. } if !map.hex(faces).is_some_and(Hex::is_land) => {
                        Some((h.coord, faces))
                    }
                    _ => None,
                })
                .collect();
            assert!(facing_water.is_empty(), "seed {seed}: harbors facing water {facing_water:?}");
            assert_eq!(map.intersections().filter(|i| i.harbor.is_some()).count(), 18);
        }
    }

    #[test]
    fn test_tokens_follow_spiral_order() {
        let map = beginner_map();
        // second spiral hex: the grain 8
        let hex = map.hex(HexCoord::new(0, 1)).unwrap();
        assert_eq!(hex.production(), Some((Resource::Grain, 8)));
        assert_eq!(map.hex(HexCoord::ORIGIN).unwrap().kind, HexKind::Desert);
    }

    #[test]
    fn test_lookups_reject_other_variants() {
        let map = beginner_map();
        let corner = HexCoord::ORIGIN.corner(Pole::North);
        assert!(map.hex_at(MapPoint::Intersection(corner)).is_none());
        assert!(map.intersection_at(MapPoint::Hex(HexCoord::ORIGIN)).is_none());
        assert!(map.intersection_at(MapPoint::Intersection(corner)).is_some());
        assert!(map.edge_at(MapPoint::Invalid).is_none());
        assert!(map.hex_at(MapPoint::hex(9, 9)).is_none());
    }

    #[test]
    fn test_coastal_corner_has_fewer_neighbours() {
        let map = beginner_map();
        let inner = HexCoord::ORIGIN.corner(Pole::North);
        assert_eq!(map.neighbours_of_intersection(inner).len(), 3);
        assert_eq!(map.edges_of_intersection(inner).len(), 3);
        assert_eq!(map.hexes_of_intersection(inner).len(), 3);

        // top corner of a ring-2 hex on the rim
        let rim = HexCoord::new(2, -2).corner(Pole::North);
        assert_eq!(map.neighbours_of_intersection(rim).len(), 2);
        let land: HashSet<_> = map
            .hexes_of_intersection(rim)
            .into_iter()
            .filter(|h| map.hex(*h).is_some_and(Hex::is_land))
            .collect();
        assert_eq!(land.len(), 1);
    }

    #[test]
    fn test_robber_moves_only_on_land() {
        let mut map = beginner_map();
        assert_eq!(map.robber_position(), HexCoord::ORIGIN);
        assert!(map.move_robber_to(MapPoint::hex(3, 0)).is_err());
        assert!(map.move_robber_to(MapPoint::Invalid).is_err());
        assert_eq!(map.robber_position(), HexCoord::ORIGIN);

        map.move_robber_to(MapPoint::hex(1, 0)).unwrap();
        assert_eq!(map.robber_position(), HexCoord::new(1, 0));
        assert_eq!(map.robber_count(), 1);
        assert!(!map.hex(HexCoord::ORIGIN).unwrap().robber);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = Configuration::beginner();
        config.tokens.clear();
        assert!(MapModel::build_from(&config).is_err());
    }

    #[test]
    fn test_view_is_sorted_and_complete() {
        let view = beginner_map().view();
        assert_eq!(view.intersections.len(), 54);
        assert!(view.edges.windows(2).all(|w| w[0].coord < w[1].coord));
    }
}
