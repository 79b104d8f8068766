//! # Access Footprints
//!
//! Every operation declares what it reads and writes. Two operations are
//! independent when neither writes anything the other touches; the
//! Dependency Analyzer only ever looks at these footprints.
//!
//! ## Resources
//!
//! ```text
//! World              whole-World wildcard, conflicts with everything
//! Allocator          the entity slot table's growth and reuse
//! Slot(i)            liveness of entity slot i
//! Component(i, k)    the k component of slot i
//! Kind(k)            membership of kind k (who has one, how many)
//! ```
//!
//! Writes to `Kind(k)` commute with each other: adding or removing members
//! in any order leaves the same set. They still conflict with reads of
//! `Kind(k)`.
//!
//! Rule definitions are ordinary components. The only effect that evaluates
//! rules, `Refresh`, reads the whole World, so it is ordered against every
//! Feature and RuleSet write without a dedicated resource.

use std::collections::BTreeSet;

use megalith_core::{ComponentKind, EntityId};

/// Something an operation can read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Wildcard for whole-World readers.
    World,
    /// Entity allocation state.
    Allocator,
    /// Liveness of one entity slot.
    Slot(u32),
    /// One component slot.
    Component(u32, ComponentKind),
    /// Membership of one kind.
    Kind(ComponentKind),
}

impl Resource {
    /// Liveness resource of an entity.
    #[inline]
    #[must_use]
    pub const fn slot(entity: EntityId) -> Self {
        Self::Slot(entity.index())
    }

    /// Component resource of an entity.
    #[inline]
    #[must_use]
    pub const fn component(entity: EntityId, kind: ComponentKind) -> Self {
        Self::Component(entity.index(), kind)
    }

    /// Whether two writes of this resource commute.
    #[inline]
    #[must_use]
    pub const fn commutes(self) -> bool {
        matches!(self, Self::Kind(_))
    }
}

/// Read and write sets of one operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Access {
    reads: BTreeSet<Resource>,
    writes: BTreeSet<Resource>,
}

impl Access {
    /// Empty footprint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Footprint of a whole-World reader.
    #[must_use]
    pub fn whole_world() -> Self {
        let mut access = Self::new();
        access.read(Resource::World);
        access
    }

    /// Adds a read.
    pub fn read(&mut self, resource: Resource) -> &mut Self {
        self.reads.insert(resource);
        self
    }

    /// Adds a write.
    pub fn write(&mut self, resource: Resource) -> &mut Self {
        self.writes.insert(resource);
        self
    }

    /// Unions `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        self.reads.extend(other.reads.iter().copied());
        self.writes.extend(other.writes.iter().copied());
    }

    /// The read set.
    #[must_use]
    pub const fn reads(&self) -> &BTreeSet<Resource> {
        &self.reads
    }

    /// The write set.
    #[must_use]
    pub const fn writes(&self) -> &BTreeSet<Resource> {
        &self.writes
    }

    /// Whether this footprint includes the whole-World wildcard.
    #[must_use]
    pub fn is_whole_world(&self) -> bool {
        self.reads.contains(&Resource::World) || self.writes.contains(&Resource::World)
    }

    /// Whether two operations must not run in the same group.
    ///
    /// Symmetric: `a.conflicts_with(b) == b.conflicts_with(a)`.
    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        if self.is_whole_world() || other.is_whole_world() {
            return true;
        }
        let write_hits = |writer: &Self, other: &Self| {
            writer.writes.iter().any(|resource| {
                other.reads.contains(resource)
                    || (!resource.commutes() && other.writes.contains(resource))
            })
        };
        write_hits(self, other) || write_hits(other, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writes(resources: &[Resource]) -> Access {
        let mut access = Access::new();
        for &r in resources {
            access.write(r);
        }
        access
    }

    #[test]
    fn test_disjoint_is_independent() {
        let a = writes(&[Resource::Slot(0)]);
        let b = writes(&[Resource::Slot(1)]);
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_read_write_conflict_is_symmetric() {
        let mut reader = Access::new();
        reader.read(Resource::Slot(3));
        let writer = writes(&[Resource::Slot(3)]);
        assert!(reader.conflicts_with(&writer));
        assert!(writer.conflicts_with(&reader));
        assert!(!reader.conflicts_with(&reader.clone()));
    }

    #[test]
    fn test_kind_writes_commute() {
        let a = writes(&[Resource::Kind(ComponentKind::Tool)]);
        let b = writes(&[Resource::Kind(ComponentKind::Tool)]);
        assert!(!a.conflicts_with(&b));

        let mut counter = Access::new();
        counter.read(Resource::Kind(ComponentKind::Tool));
        assert!(a.conflicts_with(&counter));
    }

    #[test]
    fn test_whole_world_conflicts_with_empty() {
        assert!(Access::whole_world().conflicts_with(&Access::new()));
        assert!(Access::new().conflicts_with(&Access::whole_world()));
    }

    #[test]
    fn test_rule_components_on_different_entities_are_independent() {
        let mut rule = Access::new();
        rule.write(Resource::component(EntityId::new(0, 0), ComponentKind::RuleSet))
            .write(Resource::Kind(ComponentKind::RuleSet));
        let mut feature = Access::new();
        feature
            .write(Resource::component(EntityId::new(1, 0), ComponentKind::Feature))
            .write(Resource::Kind(ComponentKind::Feature));
        assert!(!rule.conflicts_with(&feature));
        assert!(Access::whole_world().conflicts_with(&rule));
    }
}
