//! PN532 normal information frames.
//!
//! ```text
//! 00 00 FF LEN LCS TFI CMD PARAMS.. DCS 00
//! ```
//!
//! `LEN` counts `TFI`, `CMD` and the parameters. `LCS` makes `LEN + LCS`
//! zero modulo 256 and `DCS` does the same for `TFI + CMD + PARAMS`.
//! Responses carry `TFI = 0xD5` and `CMD + 1`.

use crate::error::{HardwareError, Result};

pub const PREAMBLE: u8 = 0x00;
pub const START_CODE: [u8; 2] = [0x00, 0xFF];
pub const POSTAMBLE: u8 = 0x00;

/// Frame identifier for host-to-PN532 frames.
pub const TFI_HOST_TO_PN532: u8 = 0xD4;

/// Frame identifier for PN532-to-host frames.
pub const TFI_PN532_TO_HOST: u8 = 0xD5;

/// Acknowledge frame sent by the PN532 after every command.
pub const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// Bytes preceding the frame body: preamble, start code, LEN, LCS.
pub const FRAME_HEADER_LEN: usize = 5;

/// Largest `LEN` of a normal information frame.
pub const MAX_FRAME_DATA_LEN: usize = 255;

/// Largest parameter block a command can carry (`LEN` minus TFI and CMD).
pub const MAX_PARAMS_LEN: usize = MAX_FRAME_DATA_LEN - 2;

pub mod command {
    pub const GET_FIRMWARE_VERSION: u8 = 0x02;
    pub const SAM_CONFIGURATION: u8 = 0x14;
    pub const RF_CONFIGURATION: u8 = 0x32;
    pub const IN_DATA_EXCHANGE: u8 = 0x40;
    pub const IN_LIST_PASSIVE_TARGET: u8 = 0x4A;
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        .wrapping_neg()
}

/// Build the frame for `cmd` with `params`.
pub fn encode_command(cmd: u8, params: &[u8]) -> Result<Vec<u8>> {
    if params.len() > MAX_PARAMS_LEN {
        return Err(HardwareError::invalid_data(format!(
            "PN532 command parameters too long: {} bytes (max {MAX_PARAMS_LEN})",
            params.len()
        )));
    }

    let len = (params.len() + 2) as u8;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + params.len() + 4);
    frame.push(PREAMBLE);
    frame.extend_from_slice(&START_CODE);
    frame.push(len);
    frame.push(len.wrapping_neg());

    let body_start = frame.len();
    frame.push(TFI_HOST_TO_PN532);
    frame.push(cmd);
    frame.extend_from_slice(params);
    let dcs = checksum(&frame[body_start..]);
    frame.push(dcs);
    frame.push(POSTAMBLE);

    Ok(frame)
}

pub fn is_ack(bytes: &[u8]) -> bool {
    bytes == ACK_FRAME
}

/// Validate a frame header and return the number of bytes still to read
/// (body, DCS and postamble).
pub fn body_len_from_header(header: &[u8; FRAME_HEADER_LEN]) -> Result<usize> {
    if header[0] != PREAMBLE || header[1..3] != START_CODE {
        return Err(HardwareError::invalid_data(format!(
            "PN532 frame start not found: {header:02X?}"
        )));
    }

    let len = header[3];
    let lcs = header[4];
    if len.wrapping_add(lcs) != 0 {
        return Err(HardwareError::invalid_data(format!(
            "PN532 length checksum mismatch: LEN=0x{len:02X} LCS=0x{lcs:02X}"
        )));
    }
    if len < 2 {
        return Err(HardwareError::invalid_data(format!(
            "PN532 frame too short: LEN={len}"
        )));
    }

    Ok(len as usize + 2)
}

/// Validate a complete response frame to `cmd` and return its parameters.
pub fn parse_response(frame: &[u8], cmd: u8) -> Result<&[u8]> {
    let header: &[u8; FRAME_HEADER_LEN] = frame
        .get(..FRAME_HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| HardwareError::invalid_data("PN532 response shorter than header"))?;
    let rest = body_len_from_header(header)?;
    if frame.len() < FRAME_HEADER_LEN + rest {
        return Err(HardwareError::invalid_data(format!(
            "PN532 response truncated: {} of {} bytes",
            frame.len(),
            FRAME_HEADER_LEN + rest
        )));
    }

    let len = rest - 2;
    let body = &frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];
    let dcs = frame[FRAME_HEADER_LEN + len];
    if checksum(body) != dcs {
        return Err(HardwareError::invalid_data("PN532 data checksum mismatch"));
    }

    if body[0] != TFI_PN532_TO_HOST {
        return Err(HardwareError::invalid_data(format!(
            "PN532 unexpected frame identifier 0x{:02X}",
            body[0]
        )));
    }
    let expected = cmd.wrapping_add(1);
    if body[1] != expected {
        return Err(HardwareError::invalid_data(format!(
            "PN532 response code 0x{:02X}, expected 0x{expected:02X}",
            body[1]
        )));
    }

    Ok(&body[2..])
}

/// Response frame as the PN532 would send it.
#[cfg(test)]
pub(crate) fn response_frame(cmd: u8, params: &[u8]) -> Vec<u8> {
    let mut frame = encode_command(cmd.wrapping_add(1), params).unwrap();
    frame[FRAME_HEADER_LEN] = TFI_PN532_TO_HOST;
    let dcs_pos = frame.len() - 2;
    frame[dcs_pos] = checksum(&frame[FRAME_HEADER_LEN..dcs_pos]);
    frame
}
