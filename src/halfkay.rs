// SPDX-License-Identifier: MIT OR Apache-2.0
//! The HalfKay bootloader's block-upload wire protocol.
//!
//! HalfKay speaks three frame layouts depending on the target MCU's flash size and address width;
//! see [`model::UploadVariant`]. Every frame is a fixed-size HID output report: a one-byte report
//! id (always 0), an address field, then the payload padded out to the model's block size.

use std::thread;
use std::time::{Duration, Instant};

use crate::board::ProgressCallback;
use crate::error::{Error, ErrorKind};
use crate::model::{Model, UploadVariant};
use crate::transport::{HidPort, SerialConfig, SerialPort};

/// Special block address that tells a running application (via HalfKay) to jump to it, i.e. reset.
const RESET_ADDRESS: u32 = 0xFF_FFFF;

/// Deadline for a single block write, and the reset command: the bootloader is busy erasing or
/// writing flash and simply won't accept another report until it's done.
const BLOCK_WRITE_DEADLINE: Duration = Duration::from_millis(3000);
const RESET_DEADLINE: Duration = Duration::from_millis(250);
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Pacing delay before the first block: erasing a fresh sector takes longer than writing to one
/// already erased by a previous block.
const FIRST_BLOCK_DELAY: Duration = Duration::from_millis(200);
const SUBSEQUENT_BLOCK_DELAY: Duration = Duration::from_millis(20);

/// HID feature report that tells a running Teensyduino sketch (via the SEREMU/RawHID interface) to
/// reboot into HalfKay.
const REBOOT_MAGIC: [u8; 5] = [0x00, 0xA9, 0x45, 0xC2, 0x6B];

/// Serial baud rate that, set transiently, signals a running sketch to reboot into HalfKay.
const REBOOT_BAUD_TRIGGER: u32 = 134;
const REBOOT_BAUD_NORMAL: u32 = 115_200;

fn require_supported(model: &'static Model) -> Result<(), Error>
{
    if model.experimental && std::env::var_os("TY_EXPERIMENTAL_BOARDS").is_none() {
        return Err(ErrorKind::Unsupported
            .error()
            .with_ctx(&format!("{} support is experimental; set TY_EXPERIMENTAL_BOARDS=1 to enable it", model.name)));
    }
    Ok(())
}

/// Builds one HalfKay output report for `address`, carrying up to `model.block_size` bytes of
/// `payload` (short blocks, e.g. the final one, are zero-padded).
fn build_frame(model: &'static Model, address: u32, payload: &[u8]) -> Vec<u8>
{
    let variant = model.upload_variant.expect("build_frame is only called for real models");
    let header_len = match variant {
        UploadVariant::V1 | UploadVariant::V2 => 3,
        UploadVariant::V3 => 65,
    };

    let mut frame = vec![0u8; header_len + model.block_size];
    match variant {
        UploadVariant::V1 => {
            frame[1] = (address & 0xFF) as u8;
            frame[2] = ((address >> 8) & 0xFF) as u8;
        },
        UploadVariant::V2 => {
            frame[1] = ((address >> 8) & 0xFF) as u8;
            frame[2] = ((address >> 16) & 0xFF) as u8;
        },
        UploadVariant::V3 => {
            frame[1] = (address & 0xFF) as u8;
            frame[2] = ((address >> 8) & 0xFF) as u8;
            frame[3] = ((address >> 16) & 0xFF) as u8;
        },
    }

    frame[header_len..header_len + payload.len()].copy_from_slice(payload);
    frame
}

/// Writes `frame` to `hid`, retrying on transient failure (the bootloader busy erasing or writing
/// the previous block) until `deadline` elapses.
fn send_with_retry(hid: &dyn HidPort, frame: &[u8], deadline: Duration) -> Result<(), Error>
{
    let start = Instant::now();
    loop {
        match hid.write(frame) {
            Ok(_) => return Ok(()),
            Err(err) => {
                if start.elapsed() >= deadline {
                    return Err(ErrorKind::Io.error_from(err).with_ctx("bootloader did not accept block in time"));
                }
                thread::sleep(RETRY_BACKOFF);
            },
        }
    }
}

/// Uploads `firmware_image` to a board's HalfKay bootloader, block by block.
///
/// `progress`, if given, is called with the number of bytes written so far, both before and after
/// each block; returning `Err` from it aborts the upload immediately and that error is returned.
pub fn upload(
    hid: &dyn HidPort,
    model: &'static Model,
    firmware_image: &[u8],
    mut progress: Option<&mut ProgressCallback<'_>>,
) -> Result<(), Error>
{
    require_supported(model)?;

    let block_size = model.block_size;
    let mut address: u32 = 0;

    for block in firmware_image.chunks(block_size) {
        if let Some(cb) = progress.as_mut() {
            cb(address as u64)?;
        }

        let frame = build_frame(model, address, block);
        send_with_retry(hid, &frame, BLOCK_WRITE_DEADLINE)?;

        // The first block triggers a full-chip erase; later blocks land on already-erased sectors.
        thread::sleep(if address == 0 { FIRST_BLOCK_DELAY } else { SUBSEQUENT_BLOCK_DELAY });

        address += block_size as u32;
        if let Some(cb) = progress.as_mut() {
            cb(address.min(firmware_image.len() as u32) as u64)?;
        }
    }

    Ok(())
}

/// Tells a board's HalfKay bootloader to jump to the just-uploaded application.
pub fn reset(hid: &dyn HidPort, model: &'static Model) -> Result<(), Error>
{
    require_supported(model)?;
    let frame = build_frame(model, RESET_ADDRESS, &[]);
    send_with_retry(hid, &frame, RESET_DEADLINE)
}

/// Reboots a running board into HalfKay via the serial baud-rate trigger.
pub fn reboot_serial(serial: &dyn SerialPort) -> Result<(), Error>
{
    serial
        .set_config(SerialConfig { baudrate: REBOOT_BAUD_TRIGGER })
        .map_err(|e| ErrorKind::Io.error_from(e))?;
    serial
        .set_config(SerialConfig { baudrate: REBOOT_BAUD_NORMAL })
        .map_err(|e| ErrorKind::Io.error_from(e))
}

/// Reboots a running board into HalfKay via the RawHID/SEREMU feature-report trigger.
pub fn reboot_hid(hid: &dyn HidPort) -> Result<(), Error>
{
    hid.send_feature_report(&REBOOT_MAGIC).map_err(|e| ErrorKind::Io.error_from(e))?;
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::model::{TEENSY_30, TEENSY_PP10, TEENSY_PP20};
    use std::sync::Mutex;

    #[test]
    fn v1_frame_places_low_address_bytes_at_1_and_2()
    {
        let frame = build_frame(&TEENSY_PP10, 0x01_23, &[0xAA; 4]);
        assert_eq!(frame[1], 0x23);
        assert_eq!(frame[2], 0x01);
        assert_eq!(frame.len(), TEENSY_PP10.block_size + 3);
        assert_eq!(&frame[3..7], &[0xAA; 4]);
    }

    #[test]
    fn v2_frame_omits_the_low_address_byte()
    {
        let frame = build_frame(&TEENSY_PP20, 0x01_23_00, &[0xBB; 4]);
        assert_eq!(frame[1], 0x23);
        assert_eq!(frame[2], 0x01);
        assert_eq!(frame.len(), TEENSY_PP20.block_size + 3);
    }

    #[test]
    fn v3_frame_has_a_64_byte_header_and_three_address_bytes()
    {
        let frame = build_frame(&TEENSY_30, 0x02_01_23, &[0xCC; 4]);
        assert_eq!(frame[1], 0x23);
        assert_eq!(frame[2], 0x01);
        assert_eq!(frame[3], 0x02);
        assert_eq!(frame.len(), TEENSY_30.block_size + 65);
        assert_eq!(&frame[65..69], &[0xCC; 4]);
    }

    struct FlakyHid
    {
        failures_left: Mutex<u32>,
        writes: Mutex<Vec<Vec<u8>>>,
    }

    impl HidPort for FlakyHid
    {
        fn write(&self, report: &[u8]) -> Result<usize, crate::transport::TransportError>
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                return Err(crate::transport::TransportError::Disconnected);
            }
            self.writes.lock().unwrap().push(report.to_vec());
            Ok(report.len())
        }

        fn read(&self, _buf: &mut [u8], _timeout_ms: i64) -> Result<usize, crate::transport::TransportError>
        {
            Ok(0)
        }

        fn send_feature_report(&self, _report: &[u8]) -> Result<usize, crate::transport::TransportError>
        {
            Ok(0)
        }
    }

    #[test]
    fn send_with_retry_recovers_from_transient_busy()
    {
        let hid = FlakyHid { failures_left: Mutex::new(2), writes: Mutex::new(Vec::new()) };
        let frame = build_frame(&TEENSY_30, 0, &[0u8; 4]);
        send_with_retry(&hid, &frame, Duration::from_millis(500)).unwrap();
        assert_eq!(hid.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn upload_rejects_experimental_model_without_env_override()
    {
        let hid = FlakyHid { failures_left: Mutex::new(0), writes: Mutex::new(Vec::new()) };
        // SAFETY: test runs single-threaded with respect to this var; no other test reads it.
        unsafe { std::env::remove_var("TY_EXPERIMENTAL_BOARDS") };
        let err = upload(&hid, &TEENSY_PP10, &[0u8; 8], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
