//! World Components
//!
//! The tile grid, pathfinding, the location catalog, and the town clock.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

/// An integer grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell.
    pub fn distance(&self, other: Coordinate) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// The four orthogonal step offsets (up, down, left, right).
pub const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Component: an agent's current grid cell.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position(pub Coordinate);

/// Terrain type of a single cell. Stored as one byte per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    Grass = 0,
    Road = 1,
    Wall = 2,
    Floor = 3,
}

/// Resource: the town's tile grid.
///
/// Row-major storage, one byte per cell. Walls block movement; everything
/// else is traversable.
#[derive(Resource, Debug, Clone)]
pub struct TownMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TownMap {
    /// Create a map filled with grass.
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "map dimensions must be positive");
        Self {
            width,
            height,
            tiles: vec![Tile::Grass; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    /// Tile at (x, y). Out-of-bounds cells read as walls.
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        if !self.in_bounds(x, y) {
            return Tile::Wall;
        }
        self.tiles[self.index(x, y)]
    }

    /// Set the tile at (x, y). Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if self.in_bounds(x, y) {
            let i = self.index(x, y);
            self.tiles[i] = tile;
        }
    }

    /// A cell is walkable iff it is in bounds and not a wall.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.tile(x, y) != Tile::Wall
    }

    /// Shortest path from `start` to `goal` using A* with a Manhattan
    /// heuristic over uniform step costs.
    ///
    /// Returns an empty path when `start == goal`, `None` when no walkable
    /// route exists. The returned sequence excludes the start cell, includes
    /// the goal, and every consecutive pair differs by one orthogonal step.
    pub fn find_path(&self, start: Coordinate, goal: Coordinate) -> Option<Vec<Coordinate>> {
        if start == goal {
            return Some(Vec::new());
        }
        if !self.is_walkable(start.x, start.y) || !self.is_walkable(goal.x, goal.y) {
            return None;
        }

        let cells = (self.width * self.height) as usize;
        let start_idx = self.index(start.x, start.y);
        let goal_idx = self.index(goal.x, goal.y);

        let heuristic = |idx: usize| -> u32 {
            let x = (idx as i32) % self.width;
            let y = (idx as i32) / self.width;
            ((x - goal.x).abs() + (y - goal.y).abs()) as u32
        };

        let mut g_score = vec![u32::MAX; cells];
        let mut parent: Vec<Option<usize>> = vec![None; cells];
        let mut closed = vec![false; cells];

        // (f, insertion order, cell index); insertion order keeps ties
        // deterministic.
        let mut open: BinaryHeap<Reverse<(u32, u64, usize)>> = BinaryHeap::new();
        let mut pushes: u64 = 0;

        g_score[start_idx] = 0;
        open.push(Reverse((heuristic(start_idx), pushes, start_idx)));

        while let Some(Reverse((_, _, current))) = open.pop() {
            if closed[current] {
                continue;
            }
            closed[current] = true;

            if current == goal_idx {
                let mut path = Vec::new();
                let mut cell = current;
                while cell != start_idx {
                    let x = (cell as i32) % self.width;
                    let y = (cell as i32) / self.width;
                    path.push(Coordinate::new(x, y));
                    cell = parent[cell].expect("path node without parent");
                }
                path.reverse();
                return Some(path);
            }

            let cx = (current as i32) % self.width;
            let cy = (current as i32) / self.width;
            for (dx, dy) in ORTHOGONAL {
                let nx = cx + dx;
                let ny = cy + dy;
                if !self.is_walkable(nx, ny) {
                    continue;
                }
                let neighbor = self.index(nx, ny);
                if closed[neighbor] {
                    continue;
                }
                let tentative = g_score[current] + 1;
                if tentative < g_score[neighbor] {
                    g_score[neighbor] = tentative;
                    parent[neighbor] = Some(current);
                    pushes += 1;
                    open.push(Reverse((tentative + heuristic(neighbor), pushes, neighbor)));
                }
            }
        }

        None
    }
}

/// Category of a location. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Residential,
    Commercial,
    Public,
}

/// A building footprint: origin plus dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Footprint {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Footprint {
    pub fn contains(&self, c: Coordinate) -> bool {
        c.x >= self.x && c.x < self.x + self.width && c.y >= self.y && c.y < self.y + self.height
    }
}

/// A single entry in a location's transaction log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationTransaction {
    pub amount: f64,
    pub description: String,
    pub tick: u64,
}

/// Category-specific counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LocationExtra {
    Bank {
        deposits: f64,
        withdrawals: f64,
        loans: f64,
    },
    Police {
        arrests: u64,
    },
}

impl LocationExtra {
    pub fn bank() -> Self {
        LocationExtra::Bank {
            deposits: 0.0,
            withdrawals: 0.0,
            loans: 0.0,
        }
    }

    pub fn police() -> Self {
        LocationExtra::Police { arrests: 0 }
    }
}

/// How many transactions a location keeps. Oldest entries are evicted.
pub const LOCATION_TRANSACTION_CAP: usize = 100;

/// Accumulated statistics for a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationStats {
    pub visits: u64,
    pub revenue: f64,
    /// Most-recent-first, capped at [`LOCATION_TRANSACTION_CAP`].
    pub transactions: VecDeque<LocationTransaction>,
    /// agent id -> in-progress session amount, cleared when finalized.
    pub session_revenue: HashMap<String, f64>,
    pub extra: Option<LocationExtra>,
}

impl LocationStats {
    /// Append to the transaction log, most recent first.
    pub fn log_transaction(&mut self, amount: f64, description: impl Into<String>, tick: u64) {
        self.transactions.push_front(LocationTransaction {
            amount,
            description: description.into(),
            tick,
        });
        self.transactions.truncate(LOCATION_TRANSACTION_CAP);
    }

    /// Record a paid amount both in total revenue and the payer's open
    /// session.
    pub fn record_session_payment(&mut self, agent_id: &str, amount: f64) {
        self.revenue += amount;
        *self.session_revenue.entry(agent_id.to_string()).or_default() += amount;
    }

    /// Close the payer's session, posting its total to the transaction log.
    pub fn finalize_session(&mut self, agent_id: &str, description: impl Into<String>, tick: u64) {
        if let Some(total) = self.session_revenue.remove(agent_id) {
            self.log_transaction(total, description, tick);
        }
    }
}

/// A named venue: a building with a walled footprint and a door, or a
/// point-like area with just an entry cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub kind: LocationKind,
    pub footprint: Option<Footprint>,
    /// The door tile agents path to.
    pub entry: Coordinate,
    /// Representative inner cell used when distributing visitors.
    pub interior: Option<Coordinate>,
    pub stats: LocationStats,
}

impl Location {
    /// A building with a footprint, a door, and an interior anchor.
    pub fn building(
        name: impl Into<String>,
        kind: LocationKind,
        footprint: Footprint,
        entry: Coordinate,
        interior: Coordinate,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            footprint: Some(footprint),
            entry,
            interior: Some(interior),
            stats: LocationStats::default(),
        }
    }

    /// A point-like area with only an entry cell (e.g. the park).
    pub fn point(name: impl Into<String>, kind: LocationKind, entry: Coordinate) -> Self {
        Self {
            name: name.into(),
            kind,
            footprint: None,
            entry,
            interior: None,
            stats: LocationStats::default(),
        }
    }

    pub fn with_extra(mut self, extra: LocationExtra) -> Self {
        self.stats.extra = Some(extra);
        self
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        self.footprint.map_or(false, |f| f.contains(c))
    }
}

/// Resource: catalog of every location in the town.
#[derive(Resource, Debug, Default)]
pub struct LocationRegistry {
    locations: Vec<Location>,
    by_name: HashMap<String, usize>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, location: Location) {
        self.by_name
            .insert(location.name.clone(), self.locations.len());
        self.locations.push(location);
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.by_name.get(name).map(|&i| &self.locations[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Location> {
        let i = *self.by_name.get(name)?;
        Some(&mut self.locations[i])
    }

    /// The location whose footprint contains `c`, if any. Point-like
    /// locations never contain a cell.
    pub fn location_at(&self, c: Coordinate) -> Option<&Location> {
        self.locations.iter().find(|l| l.contains(c))
    }

    pub fn name_at(&self, c: Coordinate) -> Option<&str> {
        self.location_at(c).map(|l| l.name.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Location by registration order; used for wandering.
    pub fn by_index(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }
}

/// Resource: the simulation clock. One tick is one simulated minute.
#[derive(Resource, Debug, Clone, Copy)]
pub struct WorldClock {
    pub tick: u64,
}

impl WorldClock {
    /// Clock positioned at an arbitrary starting tick.
    pub fn starting_at(tick: u64) -> Self {
        Self { tick }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
    }

    pub fn hour(&self) -> u64 {
        (self.tick / 60) % 24
    }

    pub fn minute(&self) -> u64 {
        self.tick % 60
    }

    pub fn day(&self) -> u64 {
        self.tick / (24 * 60) + 1
    }

    pub fn formatted(&self) -> String {
        format!("day {} {:02}:{:02}", self.day(), self.hour(), self.minute())
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self { tick: 0 }
    }
}

/// Resource: the three global economic multipliers. Applied multiplicatively
/// wherever costs, wages, or hazard probabilities are computed.
#[derive(Resource, Debug, Clone, Copy)]
pub struct EconomicLevers {
    pub price: f64,
    pub wage: f64,
    pub risk: f64,
}

impl Default for EconomicLevers {
    fn default() -> Self {
        Self {
            price: 1.0,
            wage: 1.0,
            risk: 1.0,
        }
    }
}

impl EconomicLevers {
    pub fn set(&mut self, price: f64, wage: f64, risk: f64) {
        self.price = price;
        self.wage = wage;
        self.risk = risk;
    }
}

/// Resource: spawn-ordered list of agent entities. The index of an agent in
/// this list drives staggered schedules and deterministic interior offsets.
#[derive(Resource, Debug, Default)]
pub struct Roster {
    pub entities: Vec<Entity>,
}

impl Roster {
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.entities.iter().position(|&e| e == entity)
    }
}
