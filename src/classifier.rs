// SPDX-License-Identifier: MIT OR Apache-2.0
//! Maps a raw device descriptor to a classified interface: model, mode, capability set, serial.

use std::sync::Arc;

use crate::capabilities::Capability;
use crate::hotplug::{DeviceDescriptor, DeviceType};
use crate::model::{self, Model, UNKNOWN};

const TEENSY_VID: u16 = 0x16C0;

const TEENSY_PIDS: &[u16] = &[0x478, 0x482, 0x483, 0x484, 0x485, 0x486, 0x487, 0x488];

const USAGE_PAGE_BOOTLOADER: u16 = 0xFF9C;
const USAGE_PAGE_RAWHID: u16 = 0xFFAB;
const USAGE_PAGE_SEREMU: u16 = 0xFFC9;

/// Serial numbers that never grant [`Capability::Unique`], even when non-zero.
const NON_IDENTIFYING_SERIALS: [u64; 2] = [12345, u32::MAX as u64];

/// Result of successfully classifying a device as belonging to this family.
#[derive(Debug, Clone)]
pub struct ClassifiedInterface
{
    pub descriptor: Arc<dyn DeviceDescriptor>,
    pub name: &'static str,
    pub model: &'static Model,
    pub capabilities: Capability,
    pub serial: u64,
}

/// Classifies a device descriptor, returning `None` if it is not a Teensy device this family
/// recognizes.
pub fn classify(descriptor: Arc<dyn DeviceDescriptor>) -> Option<ClassifiedInterface>
{
    if descriptor.vid() != TEENSY_VID {
        return None;
    }
    if !TEENSY_PIDS.contains(&descriptor.pid()) {
        return None;
    }

    let (name, model, mut capabilities): (&'static str, &'static Model, Capability) = match descriptor.device_type()
    {
        DeviceType::Serial => ("Serial", &UNKNOWN, Capability::Run | Capability::Serial | Capability::Reboot),
        DeviceType::Hid => {
            let usage_page = descriptor.hid_usage_page()?;
            match usage_page {
                USAGE_PAGE_BOOTLOADER => {
                    let usage = descriptor.hid_usage()?;
                    let model = model::identify_by_usage(usage as u8)?;
                    ("HalfKay", model, Capability::Upload | Capability::Reset)
                },
                USAGE_PAGE_RAWHID => ("RawHID", &UNKNOWN, Capability::Run),
                USAGE_PAGE_SEREMU => ("Seremu", &UNKNOWN, Capability::Run | Capability::Serial | Capability::Reboot),
                _ => return None,
            }
        },
    };

    let serial = parse_serial(descriptor.serial_number_string(), model.is_real());
    if is_identifying(serial) {
        capabilities |= Capability::Unique;
    }

    // Capability::Identify is part of the general capability set (other board families can
    // self-identify their model), but this family always resolves its model directly from the
    // bootloader usage id at classification time, so it never grants this bit.

    Some(ClassifiedInterface { descriptor, name, model, capabilities, serial })
}

fn is_identifying(serial: u64) -> bool
{
    serial != 0 && !NON_IDENTIFYING_SERIALS.contains(&serial)
}

/// Parses a device serial-number string, using the bootloader's hex scheme when `bootloader_mode`
/// is set (the interface's model is a real, identified bootloader model) or the plain decimal
/// scheme otherwise.
fn parse_serial(serial_string: Option<&str>, bootloader_mode: bool) -> u64
{
    if bootloader_mode {
        parse_bootloader_serial(serial_string)
    } else {
        parse_running_serial(serial_string)
    }
}

/// Bootloader-mode serial parsing. The bootloader reports the serial number as hexadecimal with
/// leading zeros.
fn parse_bootloader_serial(serial_string: Option<&str>) -> u64
{
    // AVR Teensy boards (1.0 and 2.0) report no serial number at all in bootloader mode.
    let Some(s) = serial_string else { return 12345 };

    let mut serial = u64::from_str_radix(s, 16).unwrap_or(0);

    // Teensyduino 1.19 added a workaround for a Mac OS X CDC-ACM driver bug: if the running-mode
    // value is below 10,000,000 it gets a trailing 0 appended before being reported. Undo that
    // here so bootloader- and running-mode serials compare equal.
    //
    // Beta K66 boards without a programmed S/N report 00000064 (100); treat that as unknown.
    if serial == 100 {
        serial = 0;
    } else if serial < 10_000_000 {
        serial *= 10;
    }

    serial
}

/// Running-mode serial parsing: plain decimal.
fn parse_running_serial(serial_string: Option<&str>) -> u64
{
    match serial_string {
        Some(s) => s.parse().unwrap_or(0),
        None => 0,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn hex_parse_is_not_octal()
    {
        // 0x12345 = 74565, which octal parsing of the same leading-zero string would not
        // produce (invalid/ambiguous under base-8); see DESIGN.md for the base-16-vs-octal note.
        assert_eq!(parse_bootloader_serial(Some("0012345")), 745650);
    }

    #[test]
    fn beta_sentinel_serial_is_unknown()
    {
        assert_eq!(parse_bootloader_serial(Some("00000064")), 0);
    }

    #[test]
    fn small_hex_serial_gets_teensyduino_padding()
    {
        assert_eq!(parse_bootloader_serial(Some("00000ABC")), 27480);
    }

    #[test]
    fn absent_bootloader_serial_is_avr_sentinel()
    {
        assert_eq!(parse_bootloader_serial(None), 12345);
    }

    #[test]
    fn absent_running_serial_is_zero()
    {
        assert_eq!(parse_running_serial(None), 0);
    }

    #[test]
    fn identifying_excludes_known_sentinels()
    {
        assert!(!is_identifying(0));
        assert!(!is_identifying(12345));
        assert!(!is_identifying(u32::MAX as u64));
        assert!(is_identifying(42));
    }
}
