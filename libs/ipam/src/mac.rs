//! Locally-administered MAC address generation for pod container interfaces.

/// Generate a random MAC address with the locally-administered bit set and
/// the multicast bit cleared on the first octet: `(b & 0xFE) | 0x02`.
///
/// The source entropy is supplied by the caller so tests can assert exact
/// sequences; production callers pass bytes from a CSPRNG-backed source.
pub fn generate_locally_administered(mut buf: [u8; 6]) -> [u8; 6] {
    buf[0] = (buf[0] & 0xFE) | 0x02;
    buf
}

/// Format a raw MAC byte array as colon-separated lowercase hex, the form
/// the SDN and CNI agent expect on the wire.
pub fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sets_local_bit_and_clears_multicast_bit() {
        for seed in [[0u8; 6], [0xFF; 6], [0x01, 2, 3, 4, 5, 6], [0xFE, 0, 0, 0, 0, 0]] {
            let mac = generate_locally_administered(seed);
            assert_eq!(mac[0] & 0x03, 0x02, "seed {seed:?} -> {mac:?}");
        }
    }

    #[test]
    fn preserves_remaining_octets() {
        let mac = generate_locally_administered([0x00, 1, 2, 3, 4, 5]);
        assert_eq!(&mac[1..], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn formats_as_colon_hex() {
        assert_eq!(format_mac([0x02, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e]), "02:0a:0b:0c:0d:0e");
    }
}
