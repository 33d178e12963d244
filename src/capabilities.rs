// SPDX-License-Identifier: MIT OR Apache-2.0
//! The capability bitset contributed by interfaces and unioned onto boards.

use bitmask_enum::bitmask;

#[bitmask(u8)]
pub enum Capability
{
    /// The board can run user firmware (i.e. this interface talks to the application, not the
    /// bootloader).
    Run,
    /// Pass-through serial I/O is available (native CDC-ACM or SEREMU emulation).
    Serial,
    /// Firmware can be uploaded through this interface (HalfKay bootloader).
    Upload,
    /// The bootloader can be told to reset into the just-uploaded application.
    Reset,
    /// The board can be commanded to reboot into the bootloader from its current mode.
    Reboot,
    /// The interface can identify the board's model on its own (HalfKay usage id lookup).
    Identify,
    /// The board's serial number is non-zero and not one of the known non-identifying sentinels.
    Unique,
}

/// Number of distinct capability bits, i.e. the length of [`ALL`] and a board's `cap2iface` table.
pub const COUNT: usize = 7;

/// Every capability bit, in a fixed order used to index `cap2iface`.
pub const ALL: [Capability; COUNT] = [
    Capability::Run,
    Capability::Serial,
    Capability::Upload,
    Capability::Reset,
    Capability::Reboot,
    Capability::Identify,
    Capability::Unique,
];

/// Index of a single-bit capability within [`ALL`] / a board's `cap2iface` table.
pub fn index_of(cap: Capability) -> usize
{
    ALL.iter().position(|&c| c == cap).expect("cap is a single known capability bit")
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn union_combines_bits()
    {
        let combined = Capability::Run | Capability::Serial;
        assert!(combined.contains(Capability::Run));
        assert!(combined.contains(Capability::Serial));
        assert!(!combined.contains(Capability::Upload));
    }

    #[test]
    fn index_of_is_stable_and_distinct()
    {
        let indices: Vec<usize> = ALL.iter().map(|&c| index_of(c)).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 6]);
    }
}
