//! Record reassembly for the VT byte stream
//!
//! The stream is a sequence of records, each prefixed by a big-endian length
//! word that counts itself. The assembler accepts arbitrarily fragmented
//! input. It first collects the two length bytes, validates the length, then
//! collects the rest of the record at the right offset. It never consumes a
//! byte belonging to the next record, so a caller reading from a socket can
//! ask [`RecordAssembler::wanted`] how much to read and never needs to push
//! anything back.

use crate::error::{FramingError, FramingResult};

use super::codes::VT_MAX_BUFFER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Collecting the length word; holds how many of its bytes we have
    Length(usize),
    /// Collecting the body; holds how many bytes are still missing
    Body(usize),
}

/// Outcome of feeding bytes to the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Bytes taken from the input
    pub consumed: usize,
    /// A full record is waiting in [`RecordAssembler::record`]
    pub complete: bool,
}

/// Reassembles length-prefixed records
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    buffer: Vec<u8>,
    stage: Stage,
    limit: usize,
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new(VT_MAX_BUFFER)
    }
}

impl RecordAssembler {
    /// `limit` is the receive buffer size; records longer than that are refused
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(VT_MAX_BUFFER);
        Self {
            buffer: Vec::with_capacity(limit),
            stage: Stage::Length(0),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes needed to finish the current stage
    pub fn wanted(&self) -> usize {
        match self.stage {
            Stage::Length(have) => 2 - have,
            Stage::Body(missing) => missing,
        }
    }

    /// True when no partial record is buffered
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Length(0)
    }

    /// Take bytes from `input` up to the end of the current record.
    ///
    /// After a step with `complete` set, the record is available from
    /// [`record`](Self::record) until [`reset`](Self::reset) is called.
    pub fn push(&mut self, input: &[u8]) -> FramingResult<Step> {
        if self.stage == Stage::Body(0) {
            // previous record was never taken
            self.reset();
        }
        let mut consumed = 0;
        while consumed < input.len() {
            let take = self.wanted().min(input.len() - consumed);
            self.buffer.extend_from_slice(&input[consumed..consumed + take]);
            consumed += take;

            match self.stage {
                Stage::Length(have) => {
                    let have = have + take;
                    if have < 2 {
                        self.stage = Stage::Length(have);
                        continue;
                    }
                    let length = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
                    let body = length.wrapping_sub(2);
                    if length < 4 || body > self.limit - 2 {
                        self.reset();
                        return Err(FramingError::BadLength { length, max: self.limit });
                    }
                    self.stage = Stage::Body(body);
                }
                Stage::Body(missing) => {
                    let missing = missing - take;
                    self.stage = Stage::Body(missing);
                    if missing == 0 {
                        return Ok(Step { consumed, complete: true });
                    }
                }
            }
        }
        Ok(Step { consumed, complete: false })
    }

    /// The record just completed, length word included
    pub fn record(&self) -> &[u8] {
        &self.buffer
    }

    /// Move the completed record out; hand the buffer back with [`recycle`](Self::recycle)
    pub fn take_record(&mut self) -> Vec<u8> {
        self.stage = Stage::Length(0);
        std::mem::take(&mut self.buffer)
    }

    pub fn recycle(&mut self, mut buffer: Vec<u8>) {
        buffer.clear();
        self.buffer = buffer;
        self.stage = Stage::Length(0);
    }

    /// Drop any partial record and wait for a new length word
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.stage = Stage::Length(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &[u8]) -> Vec<u8> {
        let mut rec = ((body.len() + 2) as u16).to_be_bytes().to_vec();
        rec.extend_from_slice(body);
        rec
    }

    #[test]
    fn test_single_record_in_one_push() {
        let rec = record(&[1, 2, 0, 0, 9, 9]);
        let mut asm = RecordAssembler::default();
        let step = asm.push(&rec).unwrap();
        assert_eq!(step, Step { consumed: rec.len(), complete: true });
        assert_eq!(asm.record(), rec.as_slice());
    }

    #[test]
    fn test_stops_at_record_boundary() {
        let first = record(&[1, 2, 0, 0]);
        let second = record(&[1, 3, 0, 0]);
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut asm = RecordAssembler::default();
        let step = asm.push(&stream).unwrap();
        assert_eq!(step.consumed, first.len());
        assert!(step.complete);
        let taken = asm.take_record();
        assert_eq!(taken, first);
        asm.recycle(taken);

        let step = asm.push(&stream[first.len()..]).unwrap();
        assert!(step.complete);
        assert_eq!(asm.record(), second.as_slice());
    }

    #[test]
    fn test_length_split_across_pushes() {
        let rec = record(&[1, 2, 0, 0]);
        let mut asm = RecordAssembler::default();
        assert_eq!(asm.wanted(), 2);
        assert!(!asm.push(&rec[..1]).unwrap().complete);
        assert_eq!(asm.wanted(), 1);
        assert!(!asm.push(&rec[1..3]).unwrap().complete);
        assert_eq!(asm.wanted(), 3);
        assert!(asm.push(&rec[3..]).unwrap().complete);
    }

    #[test]
    fn test_rejects_oversized_length() {
        let mut asm = RecordAssembler::new(512);
        let err = asm.push(&[0x04, 0x00, 1, 2]).unwrap_err();
        assert_eq!(err, FramingError::BadLength { length: 1024, max: 512 });
        assert!(asm.is_idle());
    }

    #[test]
    fn test_rejects_tiny_length() {
        let mut asm = RecordAssembler::default();
        assert!(asm.push(&[0x00, 0x01]).is_err());
        assert!(asm.push(&[0x00, 0x00]).is_err());
    }

    #[test]
    fn test_accepts_length_at_limit() {
        let limit = 64;
        let rec = record(&vec![7u8; limit - 2]);
        let mut asm = RecordAssembler::new(limit);
        assert!(asm.push(&rec).unwrap().complete);
    }
}
