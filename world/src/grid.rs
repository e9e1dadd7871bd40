//! Sparse multi-layer grid index.

use std::collections::HashMap;

use cellshift_core::{Coord, EntityId, Layer};

use crate::WorldError;

/// Maps (position, layer) pairs to the single entity occupying them.
///
/// Lookups never fail for a missing occupant and do not check bounds;
/// callers validate positions through [`Grid::within_bounds`] or use
/// [`Grid::checked_get`] when an explicit error is wanted.
#[derive(Clone, Debug, Default)]
pub(crate) struct Grid {
    width: i32,
    height: i32,
    cells: HashMap<(Coord, Layer), EntityId>,
}

impl Grid {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: i32::try_from(height).unwrap_or(i32::MAX),
            cells: HashMap::new(),
        }
    }

    pub(crate) const fn dimensions(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub(crate) fn within_bounds(&self, position: Coord) -> bool {
        (0..self.width).contains(&position.x()) && (0..self.height).contains(&position.y())
    }

    pub(crate) fn get(&self, position: Coord, layer: Layer) -> Option<EntityId> {
        self.cells.get(&(position, layer)).copied()
    }

    /// Looks up several layers at once, preserving the order of `layers`.
    pub(crate) fn get_any(&self, position: Coord, layers: &[Layer]) -> Vec<Option<EntityId>> {
        layers
            .iter()
            .map(|layer| self.get(position, *layer))
            .collect()
    }

    pub(crate) fn checked_get(
        &self,
        position: Coord,
        layer: Layer,
    ) -> Result<Option<EntityId>, WorldError> {
        if !self.within_bounds(position) {
            return Err(WorldError::OutOfBounds { coord: position });
        }
        Ok(self.get(position, layer))
    }

    /// Places an entity, refusing when the slot already holds another one.
    pub(crate) fn insert(
        &mut self,
        position: Coord,
        layer: Layer,
        entity: EntityId,
    ) -> Result<(), EntityId> {
        match self.cells.get(&(position, layer)) {
            Some(existing) if *existing != entity => Err(*existing),
            _ => {
                let _ = self.cells.insert((position, layer), entity);
                Ok(())
            }
        }
    }

    /// Removes an entity from its slot. Slots held by another entity are left
    /// untouched.
    pub(crate) fn remove(&mut self, position: Coord, layer: Layer, entity: EntityId) -> bool {
        if self.get(position, layer) == Some(entity) {
            let _ = self.cells.remove(&(position, layer));
            true
        } else {
            false
        }
    }

    /// Moves a batch of entities as one operation: every source slot is
    /// vacated before any destination is claimed, so chains shifting into each
    /// other's cells never collide mid-update. A batch that runs into a foreign
    /// occupant is undone and leaves the grid as it was.
    pub(crate) fn relocate_all(&mut self, moves: &[Relocation]) -> Result<(), Relocation> {
        let vacated: Vec<bool> = moves
            .iter()
            .map(|relocation| self.remove(relocation.from, relocation.layer, relocation.entity))
            .collect();
        for (placed, relocation) in moves.iter().enumerate() {
            if self
                .insert(relocation.to, relocation.layer, relocation.entity)
                .is_err()
            {
                for undo in &moves[..placed] {
                    let _ = self.remove(undo.to, undo.layer, undo.entity);
                }
                for (undo, was_placed) in moves.iter().zip(&vacated) {
                    if *was_placed {
                        let _ = self.insert(undo.from, undo.layer, undo.entity);
                    }
                }
                return Err(*relocation);
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.cells.clear();
    }
}

/// A single entity's move between two cells of one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Relocation {
    pub(crate) entity: EntityId,
    pub(crate) layer: Layer,
    pub(crate) from: Coord,
    pub(crate) to: Coord,
}
