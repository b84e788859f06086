//! Decoding uplinks on the receiving backend.
//!
//! The backend gets the payload as a hex string. In the obfuscated encoding
//! it turns the bytes back into characters and shifts each one down by 47,
//! wrapping by 94 when the result falls below 32. That is not quite the
//! inverse of the device transform: `'O'` comes out as a space instead of
//! `'~'`. Hex digits never hit that case, so battery levels decode correctly.

use crate::calibration::BatteryPercentage;
use crate::error::DecodeError;
use crate::uplink::WireEncoding;

const KEY: i16 = 47;

/// Undo the device's ROT47 pass the way the backend does it
pub fn decrypt_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b == b' ' {
                return ' ';
            }
            let mut shifted = i16::from(b) - KEY;
            if shifted < 32 {
                shifted += 94;
            }
            // bytes span 0..=255, so the result stays within 47..=208
            char::from(shifted as u8)
        })
        .collect()
}

/// Decode a hex payload and decrypt its bytes
pub fn decrypt_hex(payload: &str) -> Result<String, DecodeError> {
    let bytes = hex::decode(payload)?;
    Ok(decrypt_bytes(&bytes))
}

/// Recover the battery level from the hex digits after `AT$SF=`
pub fn decode_level(payload: &str, encoding: WireEncoding) -> Result<BatteryPercentage, DecodeError> {
    let value = match encoding {
        WireEncoding::Plain => {
            let bytes = hex::decode(payload)?;
            if bytes.len() != 1 {
                return Err(DecodeError::Length(bytes.len()));
            }
            bytes[0]
        }
        WireEncoding::Rot47Ascii => {
            let bytes = hex::decode(payload)?;
            if bytes.len() != 2 {
                return Err(DecodeError::Length(bytes.len()));
            }
            let digits = decrypt_bytes(&bytes);
            match hex::decode(&digits).as_deref() {
                Ok([value]) => *value,
                _ => return Err(DecodeError::NotHexDigits(digits)),
            }
        }
    };
    BatteryPercentage::new(value).map_err(|_| DecodeError::LevelOutOfRange(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uplink::{rot47, HexCase, UplinkPayload};

    #[test]
    fn test_decrypt_reference_message() {
        assert_eq!(decrypt_hex("363733326133635f6264").unwrap(), "efba2b4035");
    }

    #[test]
    fn test_decrypt_keeps_spaces() {
        assert_eq!(decrypt_bytes(b"w6==@ "), "Hello ");
    }

    #[test]
    fn test_every_level_decodes() {
        for value in 0..=100u8 {
            let level = BatteryPercentage::new(value).unwrap();
            for case in [HexCase::Upper, HexCase::Lower] {
                for encoding in [WireEncoding::Plain, WireEncoding::Rot47Ascii] {
                    let payload = UplinkPayload::encode(level, case, encoding);
                    assert_eq!(decode_level(payload.wire(), encoding).unwrap(), level);
                }
            }
        }
    }

    /// The device maps `'~'` to `'O'`, but the backend's wrap check is `< 32`
    /// rather than `<= 32`, so `'O'` decrypts to a space.
    #[test]
    fn test_backend_disagrees_on_tilde() {
        let obfuscated = rot47("~");
        assert_eq!(obfuscated, "O");
        assert_eq!(decrypt_bytes(obfuscated.as_bytes()), " ");

        let printable: String = (b'!'..=b'}').map(char::from).collect();
        assert_eq!(decrypt_bytes(rot47(&printable).as_bytes()), printable);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_level("zz", WireEncoding::Plain), Err(DecodeError::Hex(_))));
        assert_eq!(decode_level("0102", WireEncoding::Plain), Err(DecodeError::Length(2)));
        assert_eq!(decode_level("65", WireEncoding::Plain), Err(DecodeError::LevelOutOfRange(101)));
        assert_eq!(decode_level("63", WireEncoding::Rot47Ascii), Err(DecodeError::Length(1)));
        // "5a35" decrypts to "+d"; a sign is not a hex digit
        assert_eq!(
            decode_level("5a35", WireEncoding::Rot47Ascii),
            Err(DecodeError::NotHexDigits("+d".to_string()))
        );
        // "zz" decrypts to "KK", which is not hex
        assert_eq!(
            decode_level("7a7a", WireEncoding::Rot47Ascii),
            Err(DecodeError::NotHexDigits("KK".to_string()))
        );
    }
}
