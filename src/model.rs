// SPDX-License-Identifier: MIT OR Apache-2.0
//! Static registry of Teensy board models.
//!
//! This is a process-wide, read-only table: every field is known at compile time, so it is a
//! plain `const` slice rather than a lazily-initialized singleton.

/// HalfKay wire-format variant, selected per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadVariant
{
    /// AVR 8-bit, small flash (Teensy++ 1.0, Teensy 2.0).
    V1,
    /// AVR 8-bit, large flash (Teensy++ 2.0).
    V2,
    /// ARM (Teensy 3.x / LC).
    V3,
}

/// Immutable descriptor for one board model, or the `unknown` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model
{
    pub name: &'static str,
    pub mcu: Option<&'static str>,

    /// HID usage value that identifies this model while in bootloader mode.
    pub usage_id: Option<u8>,
    pub experimental: bool,

    pub code_size: usize,
    pub upload_variant: Option<UploadVariant>,
    pub block_size: usize,
}

impl Model
{
    /// A model is "real" (as opposed to the `unknown` sentinel) once it carries flash geometry.
    pub fn is_real(&self) -> bool
    {
        self.code_size != 0
    }
}

pub const UNKNOWN: Model = Model {
    name: "Teensy",
    mcu: None,
    usage_id: None,
    experimental: false,
    code_size: 0,
    upload_variant: None,
    block_size: 0,
};

pub const TEENSY_PP10: Model = Model {
    name: "Teensy++ 1.0",
    mcu: Some("at90usb646"),
    usage_id: Some(0x1A),
    experimental: true,
    code_size: 64512,
    upload_variant: Some(UploadVariant::V1),
    block_size: 256,
};

pub const TEENSY_20: Model = Model {
    name: "Teensy 2.0",
    mcu: Some("atmega32u4"),
    usage_id: Some(0x1B),
    experimental: true,
    code_size: 32256,
    upload_variant: Some(UploadVariant::V1),
    block_size: 128,
};

pub const TEENSY_PP20: Model = Model {
    name: "Teensy++ 2.0",
    mcu: Some("at90usb1286"),
    usage_id: Some(0x1C),
    experimental: false,
    code_size: 130048,
    upload_variant: Some(UploadVariant::V2),
    block_size: 256,
};

pub const TEENSY_30: Model = Model {
    name: "Teensy 3.0",
    mcu: Some("mk20dx128"),
    usage_id: Some(0x1D),
    experimental: false,
    code_size: 131072,
    upload_variant: Some(UploadVariant::V3),
    block_size: 1024,
};

pub const TEENSY_31: Model = Model {
    name: "Teensy 3.1",
    mcu: Some("mk20dx256"),
    usage_id: Some(0x1E),
    experimental: false,
    code_size: 262144,
    upload_variant: Some(UploadVariant::V3),
    block_size: 1024,
};

pub const TEENSY_LC: Model = Model {
    name: "Teensy LC",
    mcu: Some("mkl26z64"),
    usage_id: Some(0x20),
    experimental: false,
    code_size: 63488,
    upload_variant: Some(UploadVariant::V3),
    block_size: 512,
};

pub const TEENSY_32: Model = Model {
    name: "Teensy 3.2",
    mcu: Some("mk20dx256"),
    usage_id: Some(0x21),
    experimental: false,
    code_size: 262144,
    upload_variant: Some(UploadVariant::V3),
    block_size: 1024,
};

pub const TEENSY_K64: Model = Model {
    name: "Teensy 3.4",
    mcu: Some("mk64fx512"),
    usage_id: Some(0x23),
    experimental: false,
    code_size: 524288,
    upload_variant: Some(UploadVariant::V3),
    block_size: 1024,
};

pub const TEENSY_K66: Model = Model {
    name: "Teensy 3.5",
    mcu: Some("mk66fx1m0"),
    usage_id: Some(0x22),
    experimental: false,
    code_size: 1048576,
    upload_variant: Some(UploadVariant::V3),
    block_size: 1024,
};

/// All real (non-`unknown`) models, in registry order.
pub const MODELS: &[&Model] = &[
    &TEENSY_PP10,
    &TEENSY_20,
    &TEENSY_PP20,
    &TEENSY_30,
    &TEENSY_31,
    &TEENSY_LC,
    &TEENSY_32,
    &TEENSY_K64,
    &TEENSY_K66,
];

/// Looks up a model by its bootloader-mode HID usage value.
pub fn identify_by_usage(usage: u8) -> Option<&'static Model>
{
    MODELS.iter().copied().find(|model| model.usage_id == Some(usage))
}

/// One firmware signature: an 8-byte big-endian magic embedded near the reset vector.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareSignature
{
    pub magic: u64,
    pub model: &'static Model,
    pub priority: u32,
}

/// Firmware signatures, in the order the original device-support table lists them.
///
/// Teensy 3.1 and 3.2 share an identical magic and priority: they use the same MCU family and
/// linker layout, so a scan genuinely cannot distinguish them from the reset vector alone.
pub const SIGNATURES: &[FirmwareSignature] = &[
    FirmwareSignature { magic: 0x0C94_007E_FFCF_F894, model: &TEENSY_PP10, priority: 0 },
    FirmwareSignature { magic: 0x0C94_003F_FFCF_F894, model: &TEENSY_20, priority: 0 },
    FirmwareSignature { magic: 0x0C94_00FE_FFCF_F894, model: &TEENSY_PP20, priority: 0 },
    FirmwareSignature { magic: 0x3880_0440_823F_0400, model: &TEENSY_30, priority: 0 },
    FirmwareSignature { magic: 0x3080_0440_823F_0400, model: &TEENSY_31, priority: 0 },
    FirmwareSignature { magic: 0x3480_0440_823F_0000, model: &TEENSY_LC, priority: 0 },
    FirmwareSignature { magic: 0x3080_0440_823F_0400, model: &TEENSY_32, priority: 0 },
    FirmwareSignature { magic: 0x0100_002B_88ED_00E0, model: &TEENSY_K64, priority: 1 },
    FirmwareSignature { magic: 0x0020_08E0_0300_0085, model: &TEENSY_K66, priority: 2 },
];

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn identifies_known_usage_values()
    {
        assert_eq!(identify_by_usage(0x1D).unwrap().name, "Teensy 3.0");
        assert_eq!(identify_by_usage(0x23).unwrap().name, "Teensy 3.4");
    }

    #[test]
    fn unknown_usage_value_is_not_identified()
    {
        assert!(identify_by_usage(0xFF).is_none());
    }

    #[test]
    fn unknown_sentinel_is_not_real()
    {
        assert!(!UNKNOWN.is_real());
        assert!(TEENSY_30.is_real());
    }
}
