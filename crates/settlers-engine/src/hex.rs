//! Board addressing for hexes, intersections and edges.
//!
//! Hexes use axial coordinates `(q, r)` in a pointy-top layout. Intersections
//! (hex corners) live on an integer lattice derived from the hex they are the
//! north or south corner of:
//!
//! - north corner of `(q, r)`: `x = 2q + r`, `y = 3r - 2`
//! - south corner of `(q, r)`: `x = 2q + r`, `y = 3r + 2`
//!
//! Every corner of the grid is the north corner of exactly one hex or the south
//! corner of exactly one hex, so each intersection has a single address and no
//! canonicalisation step is needed. Edges are stored as their two endpoints in
//! sorted order, which makes `(a, b)` and `(b, a)` the same key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six neighbour directions of a pointy-top hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    East,
    NorthEast,
    NorthWest,
    West,
    SouthWest,
    SouthEast,
}

impl Direction {
    /// All directions, counter-clockwise starting from East.
    pub const ALL: [Direction; 6] = [
        Direction::East,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::SouthEast,
    ];

    /// Axial offset `(dq, dr)` of the neighbour in this direction
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (0, -1),
            Direction::West => (-1, 0),
            Direction::SouthWest => (-1, 1),
            Direction::SouthEast => (0, 1),
        }
    }

    pub const fn opposite(self) -> Direction {
        match self {
            Direction::East => Direction::West,
            Direction::NorthEast => Direction::SouthWest,
            Direction::NorthWest => Direction::SouthEast,
            Direction::West => Direction::East,
            Direction::SouthWest => Direction::NorthEast,
            Direction::SouthEast => Direction::NorthWest,
        }
    }
}

/// Which of the two "owned" corners of a hex an intersection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pole {
    North,
    South,
}

/// Axial hex coordinate. `q` grows east, `r` grows south-east.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const ORIGIN: HexCoord = HexCoord { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit cube coordinate `s = -q - r`
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    pub fn neighbor(&self, direction: Direction) -> HexCoord {
        let (dq, dr) = direction.offset();
        HexCoord::new(self.q + dq, self.r + dr)
    }

    pub fn neighbors(&self) -> [HexCoord; 6] {
        Direction::ALL.map(|d| self.neighbor(d))
    }

    /// Distance in hex steps
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Hexes exactly `radius` steps away, in a fixed walking order.
    ///
    /// The walk starts at the south-west corner of the ring and follows
    /// [`Direction::ALL`], taking `radius` steps per side.
    pub fn ring(&self, radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return vec![*self];
        }
        let radius = radius as i32;
        let (dq, dr) = Direction::SouthWest.offset();
        let mut cursor = HexCoord::new(self.q + dq * radius, self.r + dr * radius);
        let mut ring = Vec::with_capacity(6 * radius as usize);
        for direction in Direction::ALL {
            for _ in 0..radius {
                ring.push(cursor);
                cursor = cursor.neighbor(direction);
            }
        }
        ring
    }

    /// This hex followed by every ring up to `radius`, innermost first
    pub fn spiral(&self, radius: u32) -> Vec<HexCoord> {
        (0..=radius).flat_map(|k| self.ring(k)).collect()
    }

    /// Lattice column shared by the north and south corners
    fn column(&self) -> i32 {
        2 * self.q + self.r
    }

    /// The six corners, clockwise from the top: N, NE, SE, S, SW, NW
    pub fn intersections(&self) -> [IntersectionCoord; 6] {
        let x = self.column();
        let y = 3 * self.r;
        [
            IntersectionCoord::at(x, y - 2),
            IntersectionCoord::at(x + 1, y - 1),
            IntersectionCoord::at(x + 1, y + 1),
            IntersectionCoord::at(x, y + 2),
            IntersectionCoord::at(x - 1, y + 1),
            IntersectionCoord::at(x - 1, y - 1),
        ]
    }

    pub fn corner(&self, pole: Pole) -> IntersectionCoord {
        match pole {
            Pole::North => IntersectionCoord::at(self.column(), 3 * self.r - 2),
            Pole::South => IntersectionCoord::at(self.column(), 3 * self.r + 2),
        }
    }

    /// The six sides, clockwise from the north-east side
    pub fn edges(&self) -> [EdgeCoord; 6] {
        let c = self.intersections();
        [
            EdgeCoord::new(c[0], c[1]),
            EdgeCoord::new(c[1], c[2]),
            EdgeCoord::new(c[2], c[3]),
            EdgeCoord::new(c[3], c[4]),
            EdgeCoord::new(c[4], c[5]),
            EdgeCoord::new(c[5], c[0]),
        ]
    }

    /// The side shared with the neighbour in `direction`
    pub fn edge_towards(&self, direction: Direction) -> EdgeCoord {
        let [n, ne, se, s, sw, nw] = self.intersections();
        match direction {
            Direction::NorthEast => EdgeCoord::new(n, ne),
            Direction::East => EdgeCoord::new(ne, se),
            Direction::SouthEast => EdgeCoord::new(se, s),
            Direction::SouthWest => EdgeCoord::new(s, sw),
            Direction::West => EdgeCoord::new(sw, nw),
            Direction::NorthWest => EdgeCoord::new(nw, n),
        }
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hex({}, {})", self.q, self.r)
    }
}

/// A corner of the hex grid, addressed on the intersection lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionCoord {
    pub x: i32,
    pub y: i32,
}

impl IntersectionCoord {
    const fn at(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Checked constructor: `None` if `(x, y)` is not a corner of any hex
    pub fn new(x: i32, y: i32) -> Option<Self> {
        let point = Self::at(x, y);
        point.hex_and_pole().map(|_| point)
    }

    /// The hex this point is the north or south corner of
    pub fn hex_and_pole(&self) -> Option<(HexCoord, Pole)> {
        let (r, pole) = match self.y.rem_euclid(3) {
            1 => ((self.y + 2) / 3, Pole::North),
            2 => ((self.y - 2) / 3, Pole::South),
            _ => return None,
        };
        let twice_q = self.x - r;
        if twice_q.rem_euclid(2) != 0 {
            return None;
        }
        Some((HexCoord::new(twice_q.div_euclid(2), r), pole))
    }

    fn is_north(&self) -> bool {
        self.y.rem_euclid(3) == 1
    }

    /// The three corners one edge away
    pub fn neighbours(&self) -> [IntersectionCoord; 3] {
        let (x, y) = (self.x, self.y);
        if self.is_north() {
            [Self::at(x - 1, y + 1), Self::at(x + 1, y + 1), Self::at(x, y - 2)]
        } else {
            [Self::at(x - 1, y - 1), Self::at(x + 1, y - 1), Self::at(x, y + 2)]
        }
    }

    /// The three edges meeting here
    pub fn edges(&self) -> [EdgeCoord; 3] {
        self.neighbours().map(|n| EdgeCoord::new(*self, n))
    }

    /// The three hexes sharing this corner
    pub fn touching_hexes(&self) -> [HexCoord; 3] {
        let r = if self.is_north() {
            (self.y + 2).div_euclid(3)
        } else {
            (self.y - 2).div_euclid(3)
        };
        let q = (self.x - r).div_euclid(2);
        if self.is_north() {
            [
                HexCoord::new(q, r),
                HexCoord::new(q, r - 1),
                HexCoord::new(q + 1, r - 1),
            ]
        } else {
            [
                HexCoord::new(q, r),
                HexCoord::new(q - 1, r + 1),
                HexCoord::new(q, r + 1),
            ]
        }
    }
}

impl fmt::Display for IntersectionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intersection({}, {})", self.x, self.y)
    }
}

/// Orientation of an edge on screen (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeOrientation {
    Vertical,
    /// Goes up when walked left to right
    Rising,
    /// Goes down when walked left to right
    Falling,
}

/// A side between two intersections. Endpoints are kept sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeCoord {
    pub left: IntersectionCoord,
    pub right: IntersectionCoord,
}

impl EdgeCoord {
    /// Normalising constructor; does not check that the endpoints touch
    pub fn new(a: IntersectionCoord, b: IntersectionCoord) -> Self {
        if a <= b {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }

    /// Checked constructor: `None` unless `a` and `b` are adjacent corners
    pub fn between(a: IntersectionCoord, b: IntersectionCoord) -> Option<Self> {
        if a.hex_and_pole().is_some() && a.neighbours().contains(&b) {
            Some(Self::new(a, b))
        } else {
            None
        }
    }

    pub fn endpoints(&self) -> [IntersectionCoord; 2] {
        [self.left, self.right]
    }

    /// The endpoint opposite `from`, if `from` is an endpoint
    pub fn other_end(&self, from: IntersectionCoord) -> Option<IntersectionCoord> {
        if from == self.left {
            Some(self.right)
        } else if from == self.right {
            Some(self.left)
        } else {
            None
        }
    }

    pub fn orientation(&self) -> EdgeOrientation {
        let dx = self.right.x - self.left.x;
        let dy = self.right.y - self.left.y;
        if dx == 0 {
            EdgeOrientation::Vertical
        } else if dx * dy > 0 {
            EdgeOrientation::Falling
        } else {
            EdgeOrientation::Rising
        }
    }

    /// Edges sharing an endpoint with this one
    pub fn adjacent_edges(&self) -> Vec<EdgeCoord> {
        self.endpoints()
            .iter()
            .flat_map(|p| p.edges())
            .filter(|e| e != self)
            .collect()
    }

    /// The two hexes on either side
    pub fn touching_hexes(&self) -> Vec<HexCoord> {
        let right = self.right.touching_hexes();
        self.left
            .touching_hexes()
            .into_iter()
            .filter(|h| right.contains(h))
            .collect()
    }
}

impl fmt::Display for EdgeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edge(({}, {}) - ({}, {}))",
            self.left.x, self.left.y, self.right.x, self.right.y
        )
    }
}

/// A tagged board coordinate, the key type used across the engine's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapPoint {
    Hex(HexCoord),
    Intersection(IntersectionCoord),
    Edge(EdgeCoord),
    Invalid,
}

impl MapPoint {
    pub fn hex(q: i32, r: i32) -> Self {
        MapPoint::Hex(HexCoord::new(q, r))
    }

    /// `Invalid` if `(x, y)` is not a hex corner
    pub fn intersection(x: i32, y: i32) -> Self {
        IntersectionCoord::new(x, y).map_or(MapPoint::Invalid, MapPoint::Intersection)
    }

    /// `Invalid` unless both endpoints are valid and adjacent
    pub fn edge(a: IntersectionCoord, b: IntersectionCoord) -> Self {
        EdgeCoord::between(a, b).map_or(MapPoint::Invalid, MapPoint::Edge)
    }

    pub fn as_hex(&self) -> Option<HexCoord> {
        match self {
            MapPoint::Hex(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_intersection(&self) -> Option<IntersectionCoord> {
        match self {
            MapPoint::Intersection(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeCoord> {
        match self {
            MapPoint::Edge(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, MapPoint::Invalid)
    }
}

impl From<HexCoord> for MapPoint {
    fn from(value: HexCoord) -> Self {
        MapPoint::Hex(value)
    }
}

impl From<IntersectionCoord> for MapPoint {
    fn from(value: IntersectionCoord) -> Self {
        MapPoint::Intersection(value)
    }
}

impl From<EdgeCoord> for MapPoint {
    fn from(value: EdgeCoord) -> Self {
        MapPoint::Edge(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hex_neighbors() {
        let center = HexCoord::ORIGIN;
        let unique: HashSet<_> = center.neighbors().into_iter().collect();
        assert_eq!(unique.len(), 6);
        for neighbor in &unique {
            assert_eq!(center.distance_to(neighbor), 1);
        }
    }

    #[test]
    fn test_hex_distance() {
        let a = HexCoord::ORIGIN;
        assert_eq!(a.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(a.distance_to(&HexCoord::new(-3, 3)), 3);
    }

    #[test]
    fn test_ring_sizes_and_distances() {
        for radius in 1..=3 {
            let ring = HexCoord::ORIGIN.ring(radius);
            assert_eq!(ring.len(), 6 * radius as usize);
            let unique: HashSet<_> = ring.iter().collect();
            assert_eq!(unique.len(), ring.len());
            assert!(ring.iter().all(|h| h.distance_to(&HexCoord::ORIGIN) == radius));
        }
        assert_eq!(HexCoord::ORIGIN.spiral(2).len(), 19);
    }

    #[test]
    fn test_corners_decode_back_to_their_hex() {
        let hex = HexCoord::new(1, -2);
        assert_eq!(
            hex.corner(Pole::North).hex_and_pole(),
            Some((hex, Pole::North))
        );
        assert_eq!(
            hex.corner(Pole::South).hex_and_pole(),
            Some((hex, Pole::South))
        );
    }

    #[test]
    fn test_every_corner_is_a_valid_intersection() {
        for hex in HexCoord::ORIGIN.spiral(3) {
            for corner in hex.intersections() {
                assert!(IntersectionCoord::new(corner.x, corner.y).is_some());
                assert!(corner.touching_hexes().contains(&hex));
            }
        }
    }

    #[test]
    fn test_lattice_points_between_corners_are_invalid() {
        // y divisible by 3 is a hex-centre row, never a corner
        assert_eq!(IntersectionCoord::new(0, 0), None);
        // wrong parity for the decoded row
        assert_eq!(IntersectionCoord::new(1, -2), None);
        assert_eq!(MapPoint::intersection(0, 3), MapPoint::Invalid);
    }

    #[test]
    fn test_intersection_neighbours_are_mutual() {
        let v = HexCoord::ORIGIN.corner(Pole::North);
        for n in v.neighbours() {
            assert!(n.neighbours().contains(&v));
            assert_ne!(n, v);
        }
    }

    #[test]
    fn test_touching_hexes_are_distinct() {
        let v = HexCoord::new(2, -1).corner(Pole::South);
        let unique: HashSet<_> = v.touching_hexes().into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_edge_is_symmetric() {
        let [n, ne, ..] = HexCoord::ORIGIN.intersections();
        assert_eq!(EdgeCoord::new(n, ne), EdgeCoord::new(ne, n));
        assert_eq!(MapPoint::edge(n, ne), MapPoint::edge(ne, n));
    }

    #[test]
    fn test_edge_between_requires_adjacency() {
        let [n, _, se, ..] = HexCoord::ORIGIN.intersections();
        assert!(EdgeCoord::between(n, se).is_none());
        assert_eq!(MapPoint::edge(n, se), MapPoint::Invalid);
    }

    #[test]
    fn test_shared_side_matches_from_both_hexes() {
        let hex = HexCoord::new(0, 1);
        for direction in Direction::ALL {
            let other = hex.neighbor(direction);
            assert_eq!(
                hex.edge_towards(direction),
                other.edge_towards(direction.opposite())
            );
        }
    }

    #[test]
    fn test_edge_touches_two_hexes() {
        let hex = HexCoord::ORIGIN;
        for direction in Direction::ALL {
            let mut touching = hex.edge_towards(direction).touching_hexes();
            touching.sort();
            let mut expected = vec![hex, hex.neighbor(direction)];
            expected.sort();
            assert_eq!(touching, expected);
        }
    }

    #[test]
    fn test_edge_adjacent_edges() {
        let e = HexCoord::ORIGIN.edge_towards(Direction::East);
        let adjacent = e.adjacent_edges();
        assert_eq!(adjacent.len(), 4);
        assert!(!adjacent.contains(&e));
    }

    #[test]
    fn test_hex_edges_are_unique() {
        let unique: HashSet<_> = HexCoord::ORIGIN.edges().into_iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_edge_orientations() {
        let [n, ne, se, ..] = HexCoord::ORIGIN.intersections();
        assert_eq!(EdgeCoord::new(ne, se).orientation(), EdgeOrientation::Vertical);
        assert_eq!(EdgeCoord::new(n, ne).orientation(), EdgeOrientation::Falling);
        let nw = HexCoord::ORIGIN.intersections()[5];
        assert_eq!(EdgeCoord::new(nw, n).orientation(), EdgeOrientation::Rising);
    }
}
