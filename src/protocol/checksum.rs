//! Frame checksum.
//!
//! The device checks every command frame against a CRC-8 over the payload
//! bytes with polynomial `0x85`, zero init, no reflection and no final xor.
//! This is not one of the catalogued CRC-8 variants, so the parameter set is
//! spelled out here.

use crc::{Algorithm, Crc};

/// CRC-8 parameters used by the watt checker.
pub const CRC_8_WATTCHECKER: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x85,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0x2a,
    residue: 0x00,
};

const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_WATTCHECKER);

/// Computes the frame checksum over `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    CRC.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitwise(bytes: &[u8]) -> u8 {
        let mut crc = 0u8;
        for &b in bytes {
            crc ^= b;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ 0x85
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_check_value() {
        assert_eq!(checksum(b"123456789"), 0x2a);
    }

    #[test]
    fn test_known_command_payloads() {
        assert_eq!(checksum(&[0x08]), 0xb3);
        assert_eq!(checksum(&[0x02, 0x00]), 0xab);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn test_matches_bitwise_reference() {
        let payloads: [&[u8]; 4] = [
            &[0x01, 30, 15, 10, 5, 6, 23, 1],
            &[0x02, 0xff],
            &[0xff; 32],
            b"watt checker",
        ];
        for payload in payloads {
            assert_eq!(checksum(payload), bitwise(payload), "{payload:02x?}");
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let payload = [0x01, 30, 15, 10, 5, 6, 23, 1];
        let original = checksum(&payload);
        assert_eq!(checksum(&payload), original);

        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut flipped = payload;
                flipped[byte] ^= 1 << bit;
                assert_ne!(checksum(&flipped), original, "byte {byte} bit {bit}");
            }
        }
    }
}
