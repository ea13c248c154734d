//! SLIP framing (RFC 1055), as used by OSC 1.1 over stream connections.

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// Frames a packet, with an END byte on both sides.
pub fn encode(packet: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(packet.len() + 2);
    framed.push(END);
    for &byte in packet {
        match byte {
            END => framed.extend_from_slice(&[ESC, ESC_END]),
            ESC => framed.extend_from_slice(&[ESC, ESC_ESC]),
            other => framed.push(other),
        }
    }
    framed.push(END);
    framed
}

/// Reassembles packets from a byte stream that may split them at any point.
#[derive(Debug, Default)]
pub struct SlipDecoder {
    frame: Vec<u8>,
    escaped: bool,
}

impl SlipDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds received bytes and returns every packet they complete. Empty frames are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        for &byte in bytes {
            if self.escaped {
                self.escaped = false;
                self.frame.push(match byte {
                    ESC_END => END,
                    ESC_ESC => ESC,
                    // Protocol violation; keep the byte as sent.
                    other => other,
                });
                continue;
            }
            match byte {
                END => {
                    if !self.frame.is_empty() {
                        packets.push(std::mem::take(&mut self.frame));
                    }
                }
                ESC => self.escaped = true,
                other => self.frame.push(other),
            }
        }
        packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_special_bytes() {
        assert_eq!(
            encode(&[1, END, 2, ESC, 3]),
            vec![END, 1, ESC, ESC_END, 2, ESC, ESC_ESC, 3, END]
        );
    }

    #[test]
    fn test_decoder_handles_split_frames() {
        let framed = encode(&[9, END, ESC, 7]);
        let mut decoder = SlipDecoder::new();

        assert!(decoder.push(&framed[..3]).is_empty());
        assert_eq!(decoder.push(&framed[3..]), vec![vec![9, END, ESC, 7]]);
    }

    #[test]
    fn test_decoder_returns_back_to_back_frames() {
        let mut bytes = encode(b"one");
        bytes.extend(encode(b"two"));

        let packets = SlipDecoder::new().push(&bytes);

        assert_eq!(packets, vec![b"one".to_vec(), b"two".to_vec()]);
    }
}
