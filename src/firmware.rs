// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifies which model a firmware image targets by scanning for its reset-vector signature.

use crate::error::{Error, ErrorKind};
use crate::model::{self, Model};

/// How many candidate models [`identify_models`] keeps at the lowest priority tier it has seen.
/// Teensy 3.1 and 3.2 deliberately collide, so this needs to be at least 2; a little headroom
/// above that absorbs any other incidental collisions without silently dropping one.
const MAX_CANDIDATES: usize = 4;

/// Scans `image` for any of [`model::SIGNATURES`], returning every model whose signature was
/// found at the highest priority tier seen.
///
/// Priority expresses specificity, not order of preference: a higher-priority hit discards any
/// lower-priority candidates accumulated so far and raises the bar, so a generic match earlier in
/// the image never survives next to a more specific one found later. Within one priority tier,
/// scanning keeps going even once `max_out` candidates have been collected, since a later, higher
/// priority signature can still evict them all.
pub fn identify_models(image: &[u8], max_out: usize) -> Vec<&'static Model>
{
    let mut matches: Vec<&'static Model> = Vec::new();
    let mut best_priority = 0u32;

    if image.len() < 8 {
        return matches;
    }

    for window in image.windows(8) {
        let magic = u64::from_be_bytes(window.try_into().expect("window is exactly 8 bytes"));

        for sig in model::SIGNATURES {
            if sig.magic != magic {
                continue;
            }

            if sig.priority > best_priority {
                matches.clear();
                best_priority = sig.priority;
            } else if sig.priority < best_priority {
                continue;
            }

            if matches.len() < max_out && !matches.iter().any(|&m| *m == *sig.model) {
                matches.push(sig.model);
            }
        }
    }

    matches
}

/// Checks that `image` fits `model`'s flash and, if the image carries a recognizable signature,
/// that the signature names `model` among its candidates.
///
/// An image with no recognizable signature at all is not rejected: plenty of non-Teensyduino
/// toolchains produce firmware with no embedded signature, and the original trusts the caller in
/// that case rather than refusing every unsigned build.
pub fn check_upload_compatibility(model: &'static Model, image: &[u8]) -> Result<(), Error>
{
    if image.len() > model.code_size {
        return Err(ErrorKind::Range.error().with_ctx(&format!("firmware is too big for {}", model.name)));
    }

    let candidates = identify_models(image, MAX_CANDIDATES);
    if candidates.is_empty() || candidates.iter().any(|&m| *m == *model) {
        return Ok(());
    }

    Err(ErrorKind::Firmware
        .error()
        .with_ctx(&format!("firmware appears to target {}, not {}", candidates[0].name, model.name)))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::model::{TEENSY_30, TEENSY_31, TEENSY_32, TEENSY_LC};

    fn image_with_magic(magic: u64) -> Vec<u8>
    {
        let mut image = vec![0xFFu8; 32];
        image[12..20].copy_from_slice(&magic.to_be_bytes());
        image
    }

    #[test]
    fn identifies_unambiguous_signature()
    {
        let image = image_with_magic(0x3880_0440_823F_0400);
        let models = identify_models(&image, MAX_CANDIDATES);
        assert_eq!(models.len(), 1);
        assert_eq!(*models[0], TEENSY_30);
    }

    #[test]
    fn teensy_31_and_32_remain_ambiguous()
    {
        let image = image_with_magic(0x3080_0440_823F_0400);
        let models = identify_models(&image, MAX_CANDIDATES);
        assert_eq!(models.len(), 2);
        assert!(models.iter().any(|&m| *m == TEENSY_31));
        assert!(models.iter().any(|&m| *m == TEENSY_32));
    }

    #[test]
    fn no_signature_present_is_not_rejected()
    {
        let image = vec![0u8; 64];
        assert!(check_upload_compatibility(&TEENSY_30, &image).is_ok());
    }

    #[test]
    fn oversized_image_is_range_error()
    {
        let image = vec![0u8; TEENSY_LC.code_size + 1];
        let err = check_upload_compatibility(&TEENSY_LC, &image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn mismatched_signature_is_firmware_error()
    {
        let image = image_with_magic(0x3880_0440_823F_0400); // Teensy 3.0's signature
        let err = check_upload_compatibility(&TEENSY_LC, &image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Firmware);
    }
}
