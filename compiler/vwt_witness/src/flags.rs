//! Witness table flags.
//!
//! Computed once when a table is built. Callers use them to skip witness
//! calls entirely (a POD value is copied and dropped as plain bytes).

use bitflags::bitflags;

bitflags! {
    /// Summary properties of a value witness table.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct WitnessFlags: u32 {
        /// Copy or destroy touches reference counts.
        const NON_POD = 1 << 0;
        /// Contains weak references, which cannot be moved as plain bytes
        /// by a runtime that tracks their addresses.
        const NON_BITWISE_TAKABLE = 1 << 1;
        /// Enum witnesses (`get_enum_tag` and friends) are available.
        const HAS_ENUM_WITNESSES = 1 << 2;
        /// The layout has spare bits an enclosing enum can use.
        const HAS_SPARE_BITS = 1 << 3;
    }
}

impl WitnessFlags {
    pub fn is_pod(self) -> bool {
        !self.contains(Self::NON_POD)
    }

    pub fn is_bitwise_takable(self) -> bool {
        !self.contains(Self::NON_BITWISE_TAKABLE)
    }
}
