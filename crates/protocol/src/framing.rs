//! Partial-message buffering for inbound byte streams
//!
//! TCP delivers bytes, not packets. Each connection owns a
//! [`FrameReader`] that accumulates received bytes and yields one
//! complete frame at a time, using the opcode table's expected-length
//! rules to find frame boundaries. A short read is backpressure, not an
//! error: parsing is simply deferred until more bytes arrive.

use crate::codecs;
use crate::dispatch::OpcodeTable;
use crate::layout::{WireSize, MAX_PACKET_LENGTH};
use bytes::BytesMut;

/// Outcome of one framing step.
#[derive(Debug)]
pub enum Progress {
    /// Not enough buffered bytes to complete the next frame; feed more.
    NeedMore,

    /// One complete frame, opcode included.
    Frame { opcode: u16, frame: BytesMut },

    /// The next two bytes were an opcode the table does not know. There
    /// is no trustworthy frame boundary after an unknown opcode, so the
    /// buffered read is discarded to resynchronize; the connection
    /// stays open.
    SkippedUnknown { opcode: u16, discarded: usize },

    /// A variable-length frame declared an impossible total length.
    /// The buffered read is discarded; disconnect policy is the session
    /// layer's call.
    Malformed {
        opcode: u16,
        declared: usize,
        discarded: usize,
    },
}

/// Per-connection inbound reassembly buffer.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered, not-yet-framed bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to cut the next complete frame off the buffer.
    ///
    /// Call in a loop after every `extend` until it returns
    /// [`Progress::NeedMore`]; a single read may complete several frames.
    pub fn next(&mut self, table: &OpcodeTable) -> Progress {
        if self.buf.len() < 2 {
            return Progress::NeedMore;
        }
        let opcode = codecs::get_u16(&self.buf, 0);

        let entry = match table.lookup(opcode) {
            Some(entry) => entry,
            None => {
                let discarded = self.buf.len();
                self.buf.clear();
                tracing::warn!(
                    opcode = %format_args!("0x{:04x}", opcode),
                    discarded,
                    "unknown opcode in stream, discarding buffered read"
                );
                return Progress::SkippedUnknown { opcode, discarded };
            }
        };

        let total = match entry.bound() {
            WireSize::Fixed(n) => n,
            WireSize::Variable { header, len_offset } => {
                if self.buf.len() < header {
                    return Progress::NeedMore;
                }
                let declared = codecs::get_u16(&self.buf, len_offset) as usize;
                if declared < header || declared > MAX_PACKET_LENGTH {
                    let discarded = self.buf.len();
                    self.buf.clear();
                    tracing::warn!(
                        opcode = %format_args!("0x{:04x}", opcode),
                        declared,
                        "malformed declared length, discarding buffered read"
                    );
                    return Progress::Malformed {
                        opcode,
                        declared,
                        discarded,
                    };
                }
                declared
            }
        };

        if self.buf.len() < total {
            return Progress::NeedMore;
        }
        Progress::Frame {
            opcode,
            frame: self.buf.split_to(total),
        }
    }
}
