//! Per-packet flag bits carried in the header.

use bitflags::bitflags;

bitflags! {
    /// Flags stored in the `flags` field of every [`PacketHeader`].
    ///
    /// Unknown bits are retained so a newer peer can add flags without
    /// breaking older receivers.
    ///
    /// [`PacketHeader`]: crate::header::PacketHeader
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// The packet was fanned out to every connected display.
        const BROADCAST = 0x1;
        /// A display reply that carries the zero sentinel instead of a hit.
        const NO_HIT = 0x2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bits_are_retained() {
        let flags = PacketFlags::from_bits_retain(0x8000_0001);
        assert!(flags.contains(PacketFlags::BROADCAST));
        assert_eq!(flags.bits(), 0x8000_0001);
    }
}
