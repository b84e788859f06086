use crate::calibration::BatteryPercentage;

/// Resets the modem and readies it for the next command
pub const RESET_COMMAND: &str = "AT$RC";

/// Prefix of the send-frame command; the payload hex digits follow directly
pub const SEND_FRAME_PREFIX: &str = "AT$SF=";

/// Letter case of the hex digits in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HexCase {
    #[default]
    Upper,
    Lower,
}

/// What goes on the wire after `AT$SF=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireEncoding {
    /// The level as one byte, two hex digits
    #[default]
    Plain,
    /// The ROT47 form of the two hex digits, sent as the hex of their ASCII
    /// codes (two bytes, four hex digits)
    Rot47Ascii,
}

/// The payload for one uplink, built fresh for every transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkPayload {
    level: BatteryPercentage,
    digits: String,
    obfuscated: String,
    wire: String,
}

impl UplinkPayload {
    pub fn encode(level: BatteryPercentage, case: HexCase, encoding: WireEncoding) -> Self {
        let digits = encode_hex(&[level.value()], case);
        let obfuscated = rot47(&digits);
        let wire = match encoding {
            WireEncoding::Plain => digits.clone(),
            WireEncoding::Rot47Ascii => encode_hex(obfuscated.as_bytes(), case),
        };
        Self {
            level,
            digits,
            obfuscated,
            wire,
        }
    }

    pub fn level(&self) -> BatteryPercentage {
        self.level
    }

    /// The level as two zero-padded hex digits
    pub fn digits(&self) -> &str {
        &self.digits
    }

    /// The ROT47 form of [`digits`](Self::digits), logged for diagnostics
    pub fn obfuscated(&self) -> &str {
        &self.obfuscated
    }

    /// The hex digits that are actually transmitted
    pub fn wire(&self) -> &str {
        &self.wire
    }

    /// The complete send-frame command line
    pub fn send_command(&self) -> String {
        format!("{SEND_FRAME_PREFIX}{}", self.wire)
    }
}

fn encode_hex(bytes: &[u8], case: HexCase) -> String {
    match case {
        HexCase::Upper => hex::encode_upper(bytes),
        HexCase::Lower => hex::encode(bytes),
    }
}

/// ROT47 substitution as the device firmware does it.
///
/// `!`..=`O` move up by 47 and `P`..=`~` move down by 47, so the two halves
/// of the printable range swap places. Everything else passes through.
pub fn rot47(text: &str) -> String {
    text.chars()
        .map(|c| match u8::try_from(c) {
            Ok(b) => char::from(rot47_byte(b)),
            Err(_) => c,
        })
        .collect()
}

pub fn rot47_byte(b: u8) -> u8 {
    match b {
        b'!'..=b'O' => (b + 47) % 127,
        b'P'..=b'~' => (b - 47) % 127,
        _ => b,
    }
}

#[cfg(test)]
fn level(value: u8) -> BatteryPercentage {
    BatteryPercentage::new(value).unwrap()
}

#[test]
fn test_plain_payload_is_zero_padded() {
    let payload = UplinkPayload::encode(level(5), HexCase::Upper, WireEncoding::Plain);
    assert_eq!(payload.wire(), "05");
    assert_eq!(payload.send_command(), "AT$SF=05");

    let payload = UplinkPayload::encode(level(100), HexCase::Upper, WireEncoding::Plain);
    assert_eq!(payload.send_command(), "AT$SF=64");
}

#[test]
fn test_hex_case() {
    let upper = UplinkPayload::encode(level(75), HexCase::Upper, WireEncoding::Plain);
    let lower = UplinkPayload::encode(level(75), HexCase::Lower, WireEncoding::Plain);
    assert_eq!(upper.wire(), "4B");
    assert_eq!(lower.wire(), "4b");
}

#[test]
fn test_plain_payload_decodes_to_level() {
    for value in 0..=100u8 {
        for case in [HexCase::Upper, HexCase::Lower] {
            let payload = UplinkPayload::encode(level(value), case, WireEncoding::Plain);
            assert_eq!(payload.wire().len(), 2);
            assert_eq!(hex::decode(payload.wire()).unwrap(), [value]);
        }
    }
}

#[test]
fn test_obfuscation_is_not_on_plain_wire() {
    let payload = UplinkPayload::encode(level(75), HexCase::Lower, WireEncoding::Plain);
    assert_eq!(payload.digits(), "4b");
    assert_eq!(payload.obfuscated(), "c3");
    assert_eq!(payload.wire(), "4b");
}

#[test]
fn test_rot47_ascii_wire() {
    let payload = UplinkPayload::encode(level(75), HexCase::Lower, WireEncoding::Rot47Ascii);
    assert_eq!(payload.wire(), "6333");
    assert_eq!(payload.send_command(), "AT$SF=6333");

    let payload = UplinkPayload::encode(level(75), HexCase::Upper, WireEncoding::Rot47Ascii);
    assert_eq!(payload.obfuscated(), "cq");
    assert_eq!(payload.wire(), "6371");
}

#[test]
fn test_rot47_half_ranges() {
    assert_eq!(rot47_byte(b'!'), b'P');
    assert_eq!(rot47_byte(b'O'), b'~');
    assert_eq!(rot47_byte(b'P'), b'!');
    assert_eq!(rot47_byte(b'~'), b'O');
    assert_eq!(rot47_byte(b' '), b' ');
    assert_eq!(rot47_byte(0x7f), 0x7f);
    assert_eq!(rot47("Hello, ñ"), "w6==@[ ñ");
}

/// The two half ranges are each 47 wide, so within printable ASCII the device
/// transform undoes itself and the modulo never wraps. The mismatch lives on
/// the backend side, see `backend::tests::test_backend_disagrees_on_tilde`.
#[test]
fn test_rot47_twice_restores_printable_ascii() {
    let printable: String = (b'!'..=b'~').map(char::from).collect();
    assert_eq!(rot47(&rot47(&printable)), printable);
}
