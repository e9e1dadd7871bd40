//! Integer grid coordinates and the four canonical facing directions.

use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Location of a single grid cell. The `y` axis grows upward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coord {
    x: i32,
    y: i32,
}

impl Coord {
    /// Origin of the grid.
    pub const ZERO: Self = Self::new(0, 0);

    /// Offsets toward the four diagonal neighbours, clockwise from up-right.
    pub const DIAGONALS: [Self; 4] = [
        Self::new(1, 1),
        Self::new(1, -1),
        Self::new(-1, -1),
        Self::new(-1, 1),
    ];

    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the neighbouring cell in the provided direction.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let delta = direction.delta();
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Resolves the direction leading from `self` to an adjacent `other`.
    ///
    /// Returns `None` when the cells are not orthogonal neighbours.
    #[must_use]
    pub fn direction_to(self, other: Coord) -> Option<Direction> {
        let delta = other - self;
        Direction::ALL
            .into_iter()
            .find(|direction| direction.delta() == delta)
    }
}

impl Add for Coord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Coord {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Coord {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Coord {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Cardinal directions used for movement, gravity and facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Toward increasing `y`.
    Up,
    /// Toward decreasing `y`.
    Down,
    /// Toward decreasing `x`.
    Left,
    /// Toward increasing `x`.
    Right,
}

impl Direction {
    /// Canonical iteration order shared by every neighbourhood scan.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Unit offset of a single step in this direction.
    #[must_use]
    pub const fn delta(self) -> Coord {
        match self {
            Self::Up => Coord::new(0, 1),
            Self::Down => Coord::new(0, -1),
            Self::Left => Coord::new(-1, 0),
            Self::Right => Coord::new(1, 0),
        }
    }

    /// Facing index in clockwise order starting at up (0..=3).
    #[must_use]
    pub const fn facing(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Right => 1,
            Self::Down => 2,
            Self::Left => 3,
        }
    }

    /// Converts a facing index back into a direction.
    #[must_use]
    pub const fn from_facing(facing: u8) -> Option<Self> {
        match facing {
            0 => Some(Self::Up),
            1 => Some(Self::Right),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            _ => None,
        }
    }

    /// Direction pointing the opposite way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Reports whether the direction runs along the `x` axis.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_round_trips_for_every_direction() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_facing(direction.facing()), Some(direction));
        }
        assert_eq!(Direction::from_facing(4), None);
    }

    #[test]
    fn direction_to_resolves_neighbours_only() {
        let origin = Coord::new(3, 3);
        assert_eq!(origin.direction_to(Coord::new(3, 4)), Some(Direction::Up));
        assert_eq!(origin.direction_to(Coord::new(2, 3)), Some(Direction::Left));
        assert_eq!(origin.direction_to(Coord::new(4, 4)), None);
        assert_eq!(origin.direction_to(origin), None);
    }

    #[test]
    fn opposite_steps_cancel_out() {
        let origin = Coord::new(-2, 5);
        for direction in Direction::ALL {
            assert_eq!(origin.step(direction).step(direction.opposite()), origin);
            assert_eq!(direction.delta() + direction.opposite().delta(), Coord::ZERO);
        }
    }

    #[test]
    fn diagonals_are_two_steps_away() {
        for diagonal in Coord::DIAGONALS {
            assert_eq!(Coord::ZERO.manhattan_distance(diagonal), 2);
        }
    }
}
