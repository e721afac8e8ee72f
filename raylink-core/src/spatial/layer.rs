use bitflags::bitflags;

use crate::error::RelayError;

bitflags! {
    /// Collider layers a query may be restricted to.
    ///
    /// Bit positions follow the usual engine layer numbering, with the
    /// reconstructed room mesh on layer 31.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerMask: u32 {
        const DEFAULT = 1 << 0;
        const IGNORE_RAYCAST = 1 << 2;
        const UI = 1 << 5;
        const SPATIAL_MESH = 1 << 31;
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::DEFAULT
    }
}

impl LayerMask {
    /// Parse a layer name such as `"spatial_mesh"` or `"SPATIAL_MESH"`.
    pub fn parse_name(name: &str) -> Result<Self, RelayError> {
        LayerMask::from_name(&name.trim().to_ascii_uppercase())
            .ok_or_else(|| RelayError::Config(format!("unknown layer {name:?}")))
    }

    /// Union of several named layers.
    pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RelayError> {
        names
            .iter()
            .try_fold(LayerMask::empty(), |mask, name| {
                Ok(mask | LayerMask::parse_name(name.as_ref())?)
            })
    }
}
