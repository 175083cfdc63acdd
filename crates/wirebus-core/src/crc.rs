//! Dallas/Maxim CRC8 (polynomial x^8 + x^5 + x^4 + 1, reflected, seed 0).

/// Feeds one byte into a running CRC.
pub fn crc8_update(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    for _ in 0..8 {
        crc = if crc & 0x01 != 0 { (crc >> 1) ^ 0x8C } else { crc >> 1 };
    }
    crc
}

/// CRC8 over `bytes`, continuing from `seed`.
pub fn crc8_with_seed(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |crc, &b| crc8_update(crc, b))
}

/// CRC8 over `bytes` with a zero seed, as used by every frame on the wire.
pub fn crc8(bytes: &[u8]) -> u8 {
    crc8_with_seed(0, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc8(b"123456789"), 0xA1);
    }

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(crc8(&[]), 0);
        assert_eq!(crc8_with_seed(0x5C, &[]), 0x5C);
    }

    #[test]
    fn rom_code_example() {
        assert_eq!(crc8(&[0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00]), 0xA2);
    }

    #[test]
    fn appending_crc_yields_zero() {
        let data = [0x11, 0x22, 0x33, 0x44];
        let crc = crc8(&data);
        assert_eq!(crc8_with_seed(crc8(&data), &[crc]), 0);
    }

    #[test]
    fn seeded_is_incremental() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let head = crc8(&data[..2]);
        assert_eq!(crc8_with_seed(head, &data[2..]), crc8(&data));
    }
}
