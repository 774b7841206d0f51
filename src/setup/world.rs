//! Town Map Setup
//!
//! Builds the default town: two crossing roads, eight walled buildings with
//! south-facing doors, and the park.

use crate::components::world::{
    Coordinate, Footprint, Location, LocationExtra, LocationKind, LocationRegistry, Tile, TownMap,
};

/// Default town dimensions. Wide enough that the whole declared layout,
/// park included, actually fits on the grid.
pub const TOWN_WIDTH: i32 = 44;
pub const TOWN_HEIGHT: i32 = 20;

/// Carve a walled building into the map: wall perimeter, floor interior,
/// and a single door gap in the middle of the south wall.
fn carve_building(map: &mut TownMap, x: i32, y: i32, width: i32, height: i32) -> (Coordinate, Coordinate) {
    for row in 0..height {
        for col in 0..width {
            let tile = if row == 0 || row == height - 1 || col == 0 || col == width - 1 {
                Tile::Wall
            } else {
                Tile::Floor
            };
            map.set_tile(x + col, y + row, tile);
        }
    }
    let door = Coordinate::new(x + width / 2, y + height - 1);
    map.set_tile(door.x, door.y, Tile::Floor);
    let interior = Coordinate::new(x + width / 2, y + height / 2);
    (door, interior)
}

fn add_building(
    map: &mut TownMap,
    registry: &mut LocationRegistry,
    name: &str,
    kind: LocationKind,
    x: i32,
    y: i32,
) {
    const SIZE: i32 = 5;
    let (entry, interior) = carve_building(map, x, y, SIZE, SIZE);
    let mut location = Location::building(
        name,
        kind,
        Footprint {
            x,
            y,
            width: SIZE,
            height: SIZE,
        },
        entry,
        interior,
    );
    location = match name {
        "Bank" => location.with_extra(LocationExtra::bank()),
        "Police Station" => location.with_extra(LocationExtra::police()),
        _ => location,
    };
    registry.register(location);
}

/// The default town map and its location catalog.
pub fn default_town() -> (TownMap, LocationRegistry) {
    let mut map = TownMap::new(TOWN_WIDTH, TOWN_HEIGHT);
    let mut registry = LocationRegistry::new();

    // Roads: one horizontal main street, one vertical cross street.
    for x in 0..TOWN_WIDTH {
        map.set_tile(x, 10, Tile::Road);
    }
    for y in 0..TOWN_HEIGHT {
        map.set_tile(15, y, Tile::Road);
    }

    // North row of buildings.
    add_building(&mut map, &mut registry, "My House", LocationKind::Residential, 2, 2);
    add_building(&mut map, &mut registry, "Restaurant", LocationKind::Commercial, 8, 2);
    add_building(&mut map, &mut registry, "Library", LocationKind::Public, 20, 2);
    add_building(&mut map, &mut registry, "Bank", LocationKind::Commercial, 26, 2);

    // South row of buildings.
    add_building(&mut map, &mut registry, "Bakery", LocationKind::Commercial, 2, 12);
    add_building(&mut map, &mut registry, "Police Station", LocationKind::Public, 8, 12);
    add_building(&mut map, &mut registry, "Hospital", LocationKind::Public, 20, 12);
    add_building(&mut map, &mut registry, "Mall", LocationKind::Commercial, 26, 12);

    // The park is an open area: just a gathering point, no walls.
    registry.register(Location::point(
        "Park",
        LocationKind::Public,
        Coordinate::new(37, 7),
    ));

    (map, registry)
}
