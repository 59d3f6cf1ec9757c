//! # Move Flags
//!
//! Every point carries one packed `u32`:
//!
//! ```text
//! bits  0..8   extrusion role
//! bits  8..16  move type
//! bits 16..32  reserved (zero)
//! ```

use bytemuck::{Pod, Zeroable};

/// Kind of machine move that ends at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveType {
    /// No movement.
    Noop = 0,
    /// Filament retraction.
    Retract = 1,
    /// Filament unretraction.
    Unretract = 2,
    /// Seam marker.
    Seam = 3,
    /// Tool change.
    ToolChange = 4,
    /// Color change.
    ColorChange = 5,
    /// Pause.
    PausePrint = 6,
    /// Custom G-code block.
    CustomGCode = 7,
    /// Non-extruding move.
    Travel = 8,
    /// Wipe move.
    Wipe = 9,
    /// Extruding move.
    Extrude = 10,
}

impl MoveType {
    /// Number of move types.
    pub const COUNT: usize = 11;

    /// All move types in flag order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Noop,
        Self::Retract,
        Self::Unretract,
        Self::Seam,
        Self::ToolChange,
        Self::ColorChange,
        Self::PausePrint,
        Self::CustomGCode,
        Self::Travel,
        Self::Wipe,
        Self::Extrude,
    ];

    /// Decodes the type bits of a flag word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if (bits as usize) < Self::COUNT {
            Some(Self::ALL[bits as usize])
        } else {
            None
        }
    }

    /// Marker types that never connect to the following point.
    #[inline]
    #[must_use]
    pub const fn is_marker(self) -> bool {
        (self as u8) < Self::Travel as u8
    }
}

/// Feature an extruding move belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ExtrusionRole {
    None = 0,
    Perimeter = 1,
    ExternalPerimeter = 2,
    OverhangPerimeter = 3,
    InternalInfill = 4,
    SolidInfill = 5,
    TopSolidInfill = 6,
    Ironing = 7,
    BridgeInfill = 8,
    GapFill = 9,
    Skirt = 10,
    SupportMaterial = 11,
    SupportMaterialInterface = 12,
    WipeTower = 13,
    Custom = 14,
}

impl ExtrusionRole {
    /// Number of roles.
    pub const COUNT: usize = 15;

    /// All roles in flag order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::None,
        Self::Perimeter,
        Self::ExternalPerimeter,
        Self::OverhangPerimeter,
        Self::InternalInfill,
        Self::SolidInfill,
        Self::TopSolidInfill,
        Self::Ironing,
        Self::BridgeInfill,
        Self::GapFill,
        Self::Skirt,
        Self::SupportMaterial,
        Self::SupportMaterialInterface,
        Self::WipeTower,
        Self::Custom,
    ];

    /// Decodes the role bits of a flag word.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if (bits as usize) < Self::COUNT {
            Some(Self::ALL[bits as usize])
        } else {
            None
        }
    }
}

/// Packed `(role, move type)` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[repr(transparent)]
pub struct MoveFlags(pub u32);

impl MoveFlags {
    /// Packs raw role and type bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(role: u8, move_type: u8) -> Self {
        Self(role as u32 | ((move_type as u32) << 8))
    }

    /// Packs a typed role and move type.
    #[inline]
    #[must_use]
    pub const fn new(role: ExtrusionRole, move_type: MoveType) -> Self {
        Self::from_bits(role as u8, move_type as u8)
    }

    /// Raw role bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn role_bits(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Raw move type bits.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn type_bits(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// Decoded role, if the bits name one.
    #[inline]
    #[must_use]
    pub const fn role(self) -> Option<ExtrusionRole> {
        ExtrusionRole::from_bits(self.role_bits())
    }

    /// Decoded move type, if the bits name one.
    #[inline]
    #[must_use]
    pub const fn move_type(self) -> Option<MoveType> {
        MoveType::from_bits(self.type_bits())
    }

    /// `true` for travel moves.
    #[inline]
    #[must_use]
    pub const fn is_travel(self) -> bool {
        self.type_bits() == MoveType::Travel as u8
    }

    /// `true` for extruding moves.
    #[inline]
    #[must_use]
    pub const fn is_extrude(self) -> bool {
        self.type_bits() == MoveType::Extrude as u8
    }
}
