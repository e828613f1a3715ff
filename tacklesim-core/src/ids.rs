use serde::{Deserialize, Serialize};

/// Cross-simulation key. Stable between a simulation and its mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Uid(pub i32);

/// In-process identity, unique per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Iid(pub i32);

impl Iid {
    /// Identity used by a mirror copy of an entity.
    pub fn mirrored(self) -> Iid {
        Iid(-self.0)
    }
}

/// Monotonically decreasing identity counter. The first draw is -1.
#[derive(Debug, Clone, Default)]
pub struct IidGenerator {
    last: i32,
}

impl IidGenerator {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    pub fn next_iid(&mut self) -> Iid {
        self.last -= 1;
        Iid(self.last)
    }
}

/// Independent identity counters for masses, connections and objects.
///
/// A simulation owns one of these; tests and parallel simulations can
/// inject their own so identities never leak between them.
#[derive(Debug, Clone, Default)]
pub struct IdSource {
    pub masses: IidGenerator,
    pub connections: IidGenerator,
    pub objects: IidGenerator,
}

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-simulation UID counter starting at 0
#[derive(Debug, Clone, Default)]
pub struct UidGenerator {
    next: i32,
}

impl UidGenerator {
    pub fn next_uid(&mut self) -> Uid {
        let uid = Uid(self.next);
        self.next += 1;
        uid
    }

    /// Make sure later draws never collide with `uid`.
    pub fn reserve(&mut self, uid: Uid) {
        if uid.0 >= self.next {
            self.next = uid.0 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iid_generators_are_independent() {
        let mut ids = IdSource::new();
        assert_eq!(ids.masses.next_iid(), Iid(-1));
        assert_eq!(ids.masses.next_iid(), Iid(-2));
        assert_eq!(ids.connections.next_iid(), Iid(-1));
        assert_eq!(ids.objects.next_iid(), Iid(-1));
    }

    #[test]
    fn test_uid_reserve_skips_taken_values() {
        let mut uids = UidGenerator::default();
        assert_eq!(uids.next_uid(), Uid(0));
        uids.reserve(Uid(10));
        assert_eq!(uids.next_uid(), Uid(11));
    }
}
