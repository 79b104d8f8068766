//! # Commits
//!
//! A commit records one executed batch:
//!
//! ```text
//! [1: has parent][32: parent id]?[8: height][32: world digest][ops]
//! ```
//!
//! `ops` holds the committed operations in submission order (the normalized
//! batch; rejected operations are dropped). The commit id is the object id of
//! this payload, so identical input World + identical committed operations
//! give an identical id on any machine and any worker count.

use megalith_core::{Decode, DecodeError, Decoder, Digest, Encode, Encoder, World};
use megalith_ops::Operation;

use crate::object::{object_id, ObjectKind};

/// One node in the history tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    parent: Option<Digest>,
    height: u64,
    world: Digest,
    ops: Vec<Operation>,
}

impl Commit {
    /// The root every history starts from: no operations, empty World.
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            parent: None,
            height: 0,
            world: World::new().digest(),
            ops: Vec::new(),
        }
    }

    /// A child of `parent` whose batch produced `world`.
    #[must_use]
    pub fn child(parent: Digest, parent_height: u64, world: Digest, ops: Vec<Operation>) -> Self {
        Self {
            parent: Some(parent),
            height: parent_height + 1,
            world,
            ops,
        }
    }

    /// The parent id; `None` only for genesis.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<Digest> {
        self.parent
    }

    /// Distance from genesis.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Digest of the World after this commit.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> Digest {
        self.world
    }

    /// The committed operations, in submission order.
    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Content address.
    #[must_use]
    pub fn id(&self) -> Digest {
        object_id(ObjectKind::Commit, &self.to_canonical_bytes())
    }

    /// Applies the batch to `world`, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the index and reason of the first operation that does not
    /// apply.
    pub fn replay(&self, world: &mut World) -> Result<(), (usize, String)> {
        for (index, op) in self.ops.iter().enumerate() {
            op.apply(world).map_err(|err| (index, err.to_string()))?;
        }
        Ok(())
    }

    /// Applies the inverse batch to `world`, last operation first.
    ///
    /// # Errors
    ///
    /// Returns the index and reason of the first operation whose inverse does
    /// not apply.
    pub fn unwind(&self, world: &mut World) -> Result<(), (usize, String)> {
        for (index, op) in self.ops.iter().enumerate().rev() {
            op.inverse()
                .apply(world)
                .map_err(|err| (index, err.to_string()))?;
        }
        Ok(())
    }
}

impl Encode for Commit {
    fn encode(&self, enc: &mut Encoder) {
        enc.put_bool(self.parent.is_some());
        if let Some(parent) = &self.parent {
            parent.encode(enc);
        }
        enc.put_u64(self.height);
        self.world.encode(enc);
        enc.put_seq(&self.ops);
    }
}

impl Decode for Commit {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let parent = if dec.bool()? {
            Some(Digest::decode(dec)?)
        } else {
            None
        };
        Ok(Self {
            parent,
            height: dec.u64()?,
            world: Digest::decode(dec)?,
            ops: dec.seq()?,
        })
    }
}
