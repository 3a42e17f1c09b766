use std::{
    fmt::{self, Display},
    ops::{BitOr, BitOrAssign},
};

/// Provenance of a value: which environment inputs it was derived from.
///
/// Taint is a bitset that flows through every arithmetic, memory and storage
/// operation, so a value computed from `msg.sender` and `calldata` carries both.
///
/// ```
/// use argus_vm::core::taint::Taint;
///
/// let t = Taint::CALLDATA | Taint::CALLER;
/// assert!(t.contains(Taint::CALLER));
/// assert!(!t.contains(Taint::ORIGIN));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Taint(u16);

impl Taint {
    /// Derived from nothing but constants.
    pub const NONE: Taint = Taint(0);
    /// Derived from transaction input.
    pub const CALLDATA: Taint = Taint(1 << 0);
    /// Derived from `msg.sender`.
    pub const CALLER: Taint = Taint(1 << 1);
    /// Derived from `tx.origin`.
    pub const ORIGIN: Taint = Taint(1 << 2);
    /// Derived from `msg.value`.
    pub const CALLVALUE: Taint = Taint(1 << 3);
    /// Read from persistent storage.
    pub const STORAGE: Taint = Taint(1 << 4);
    /// Returned by an external call.
    pub const RETURNDATA: Taint = Taint(1 << 5);
    /// Derived from `block.timestamp`.
    pub const TIMESTAMP: Taint = Taint(1 << 6);
    /// Derived from `block.number`.
    pub const NUMBER: Taint = Taint(1 << 7);
    /// Derived from other block metadata (coinbase, prevrandao, blockhash, ...).
    pub const BLOCK: Taint = Taint(1 << 8);

    const NAMES: [(Taint, &'static str); 9] = [
        (Taint::CALLDATA, "calldata"),
        (Taint::CALLER, "caller"),
        (Taint::ORIGIN, "origin"),
        (Taint::CALLVALUE, "callvalue"),
        (Taint::STORAGE, "storage"),
        (Taint::RETURNDATA, "returndata"),
        (Taint::TIMESTAMP, "timestamp"),
        (Taint::NUMBER, "number"),
        (Taint::BLOCK, "block"),
    ];

    /// Whether every source in `other` is present.
    pub const fn contains(self, other: Taint) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any source in `other` is present.
    pub const fn intersects(self, other: Taint) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the value is untainted.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `self | other`, usable in constants.
    pub const fn with(self, other: Taint) -> Taint {
        Taint(self.0 | other.0)
    }

    /// Combine the provenance of several values.
    pub fn union<I: IntoIterator<Item = Taint>>(taints: I) -> Taint {
        taints.into_iter().fold(Taint::NONE, |acc, t| acc | t)
    }
}

impl BitOr for Taint {
    type Output = Taint;

    fn bitor(self, rhs: Self) -> Self::Output {
        Taint(self.0 | rhs.0)
    }
}

impl BitOrAssign for Taint {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }

        let names = Taint::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(f, "{}", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Taint::NONE.to_string(), "none");
        assert_eq!((Taint::ORIGIN | Taint::CALLDATA).to_string(), "calldata|origin");
    }

    #[test]
    fn test_union() {
        let t = Taint::union([Taint::TIMESTAMP, Taint::NONE, Taint::NUMBER]);
        assert!(t.contains(Taint::TIMESTAMP | Taint::NUMBER));
        assert!(t.intersects(Taint::NUMBER | Taint::CALLER));
        assert!(!t.intersects(Taint::CALLER));
    }
}
