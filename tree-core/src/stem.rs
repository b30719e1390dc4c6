use crate::types::StemId;

/// Stems whose attachment forces a radius below this are not grown.
pub const MIN_VISIBLE_RADIUS: f32 = 0.0001;

/// Sizing record for one stem.
///
/// The stem's curve points are owned by the builder frame that grows it and
/// are flushed to the curve sink once the stem is finished; this record is
/// what children read back through their `parent` index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stem {
    pub depth: usize,
    pub parent: Option<StemId>,
    /// Distance along the parent at which this stem is attached.
    pub offset: f32,
    pub length: f32,
    pub radius: f32,
    pub length_child_max: f32,
    /// Radius cap from the parent at the attachment point, or
    /// [`Stem::UNCONSTRAINED`].
    pub radius_limit: f32,
}

impl Stem {
    pub const UNCONSTRAINED: f32 = -1.0;

    pub fn trunk() -> Self {
        Self::child(0, None, 0.0, Self::UNCONSTRAINED)
    }

    pub fn child(depth: usize, parent: Option<StemId>, offset: f32, radius_limit: f32) -> Self {
        Self {
            depth,
            parent,
            offset,
            length: 0.0,
            radius: 0.0,
            length_child_max: 0.0,
            radius_limit,
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.radius_limit >= 0.0
    }

    /// True if the radius cap makes the stem too thin to be worth growing.
    pub fn is_invisible(&self) -> bool {
        self.is_constrained() && self.radius_limit < MIN_VISIBLE_RADIUS
    }
}

/// Append-only storage for every stem of a tree.
///
/// Parents are referenced by index, so a child can read its parent's sizing
/// while the parent's own builder frame is still running.
#[derive(Debug, Default)]
pub struct StemArena {
    pub stems: Vec<Stem>,
}

impl StemArena {
    pub fn add(&mut self, stem: Stem) -> StemId {
        let id = self.stems.len();
        self.stems.push(stem);
        id
    }

    pub fn get(&self, id: StemId) -> &Stem {
        &self.stems[id]
    }

    pub fn set(&mut self, id: StemId, stem: Stem) {
        self.stems[id] = stem;
    }

    pub fn parent_of(&self, stem: &Stem) -> Option<&Stem> {
        stem.parent.map(|p| &self.stems[p])
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}
