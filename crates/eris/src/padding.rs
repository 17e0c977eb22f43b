//! ISO/IEC 7816-4 padding for the final leaf block, as used by libsodium.

use crate::types::Error;

/// Pad `buf[..n]` in place out to the full buffer length: a mandatory 0x80
/// marker at position `n`, zeroes after it. The buffer is one block; `n` is
/// how much of it holds content and must leave room for the marker.
pub(crate) fn pad_in_place(buf: &mut [u8], n: usize) {
    debug_assert!(n < buf.len(), "no room for the padding marker");
    buf[n] = 0x80;
    for b in &mut buf[n + 1..] {
        *b = 0;
    }
}

/// Remove the padding from the final block: scan from the end of `buf` for
/// at most `block_size` bytes, expecting zeroes up to a 0x80 marker, and
/// return the content before the marker.
pub(crate) fn unpad(buf: &[u8], block_size: usize) -> Result<&[u8], Error> {
    if buf.len() < block_size {
        return Err(Error::InvalidPadding);
    }

    let n = buf.len();
    for i in 0..block_size {
        match buf[n - i - 1] {
            0x80 => return Ok(&buf[..n - i - 1]),
            0x00 => continue,
            _ => return Err(Error::InvalidPadding),
        }
    }

    // No 0x80 within block_size bytes of the end.
    Err(Error::InvalidPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_to_block(content: &[u8], block_size: usize) -> Vec<u8> {
        let mut block = vec![0u8; block_size];
        block[..content.len()].copy_from_slice(content);
        pad_in_place(&mut block, content.len());
        block
    }

    #[test]
    fn pad_writes_marker_and_zeroes() {
        let block = pad_to_block(b"abc", 16);
        assert_eq!(&block[..3], b"abc");
        assert_eq!(block[3], 0x80);
        assert!(block[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn pad_empty_content_is_all_padding() {
        let block = pad_to_block(b"", 16);
        assert_eq!(block[0], 0x80);
        assert!(block[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unpad_inverts_pad() {
        for len in [0usize, 1, 7, 14, 15] {
            let content: Vec<u8> = (0..len as u8).map(|b| b + 1).collect();
            let block = pad_to_block(&content, 16);
            assert_eq!(unpad(&block, 16).unwrap(), &content[..]);
        }
    }

    #[test]
    fn unpad_single_byte_of_slack() {
        // Content one byte short of the block: marker is the last byte.
        let block = pad_to_block(&[7u8; 15], 16);
        assert_eq!(block[15], 0x80);
        assert_eq!(unpad(&block, 16).unwrap(), &[7u8; 15]);
    }

    #[test]
    fn unpad_rejects_missing_marker() {
        assert!(matches!(
            unpad(&[0u8; 16], 16),
            Err(Error::InvalidPadding)
        ));
    }

    #[test]
    fn unpad_rejects_stray_byte() {
        let mut block = pad_to_block(b"abc", 16);
        block[10] = 0x01;
        assert!(matches!(unpad(&block, 16), Err(Error::InvalidPadding)));
    }

    #[test]
    fn unpad_rejects_short_input() {
        assert!(matches!(
            unpad(&[0x80; 8], 16),
            Err(Error::InvalidPadding)
        ));
    }

    #[test]
    fn unpad_scans_only_the_last_block() {
        // A marker one block from the end must not be found.
        let mut buf = vec![0u8; 32];
        buf[15] = 0x80;
        assert!(matches!(unpad(&buf, 16), Err(Error::InvalidPadding)));

        // But a marker inside the final block is.
        buf[16] = 0x80;
        assert_eq!(unpad(&buf, 16).unwrap(), &buf[..16]);
    }
}
