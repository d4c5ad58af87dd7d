//! Canonical binary codec (§4.1): injective encode, strict decode.
//!
//! Two independent implementations of this module MUST produce byte-identical
//! output for the same typed value, and MUST reject the same malformed input.
//! Numbers are little-endian fixed-width; variable-length fields are `u32`
//! length-prefixed; sequences are `u32` count-prefixed. There is no float in
//! any consensus type, so the NaN/non-canonical-signed-zero rejection rules
//! are vacuously satisfied by construction - no field can ever carry one.
//!
//! This is the ONLY wire format consensus code relies on. A legacy msgpack
//! path is kept in `parity.rs` purely as the "observed" side of the C11
//! shadow harness; it never backs an accept/reject decision on its own.

use crate::errors::{ConsensusError, Result};
use crate::types::*;

/// Hard cap on any length-prefixed field (§4.1).
const FRAME_CAP: usize = FRAME_CAP_BYTES;

// ==================== WRITER ====================

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `u32` length-prefixed variable bytes.
    fn var_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > FRAME_CAP {
            return Err(ConsensusError::FrameCapExceeded {
                len: bytes.len(),
                cap: FRAME_CAP,
            });
        }
        self.u32(bytes.len() as u32);
        self.fixed(bytes);
        Ok(())
    }

    /// `u32` count-prefixed sequence header; caller encodes elements after.
    fn seq_len(&mut self, len: usize) -> Result<()> {
        if len > FRAME_CAP {
            return Err(ConsensusError::FrameCapExceeded {
                len,
                cap: FRAME_CAP,
            });
        }
        self.u32(len as u32);
        Ok(())
    }

    fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

// ==================== READER ====================

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ConsensusError::CodecError(format!(
                "unexpected end of input: need {} bytes, have {}",
                n,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let b = self.take(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(b);
        Ok(arr)
    }

    fn var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        if len > FRAME_CAP {
            return Err(ConsensusError::FrameCapExceeded {
                len,
                cap: FRAME_CAP,
            });
        }
        Ok(self.take(len)?.to_vec())
    }

    fn seq_len(&mut self) -> Result<usize> {
        let len = self.u32()? as usize;
        if len > FRAME_CAP {
            return Err(ConsensusError::FrameCapExceeded {
                len,
                cap: FRAME_CAP,
            });
        }
        Ok(len)
    }

    /// Strict decode: every byte must be consumed, no trailing data.
    fn finish(self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(ConsensusError::TrailingBytes {
                consumed: self.pos,
                total: self.buf.len(),
            });
        }
        Ok(())
    }
}

// ==================== BLOCK HEADER ====================

pub fn encode_block_header(header: &BlockHeader) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.u32(header.codec_version);
    w.u32(header.block_index);
    w.i64(header.timestamp);
    w.fixed(&header.parent_hash);
    w.fixed(&header.merkle_root);
    w.fixed(&header.miner_address);
    w.fixed(&header.commitment);
    w.u32(header.difficulty_target);
    w.u64(header.nonce);
    w.var_bytes(&header.extra_data)?;
    Ok(w.into_vec())
}

pub fn decode_block_header(bytes: &[u8]) -> Result<BlockHeader> {
    let mut r = Reader::new(bytes);
    let header = BlockHeader {
        codec_version: r.u32()?,
        block_index: r.u32()?,
        timestamp: r.i64()?,
        parent_hash: r.fixed()?,
        merkle_root: r.fixed()?,
        miner_address: r.fixed()?,
        commitment: r.fixed()?,
        difficulty_target: r.u32()?,
        nonce: r.u64()?,
        extra_data: r.var_bytes()?,
    };
    r.finish()?;
    Ok(header)
}

/// The header's identity: `SHA256(canonical_encode(header))` (§3).
pub fn compute_header_hash(header: &BlockHeader) -> Result<Hash> {
    Ok(crate::hash::sha256(&encode_block_header(header)?))
}

// ==================== TRANSACTION ====================

fn write_transaction_body(w: &mut Writer, tx: &Transaction) -> Result<()> {
    w.fixed(&tx.from);
    w.fixed(&tx.to);
    w.u64(tx.amount);
    w.u64(tx.fee);
    w.u64(tx.nonce);
    w.u64(tx.gas_limit);
    w.u64(tx.gas_price);
    w.u8(tx.tx_type as u8);
    w.var_bytes(&tx.data)?;
    w.i64(tx.timestamp);
    Ok(())
}

/// Full encoding, including the signature - this is the wire format.
pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    write_transaction_body(&mut w, tx)?;
    w.fixed(&tx.signature);
    Ok(w.into_vec())
}

/// Signing payload: every field except `signature` (§3 invariant 3).
pub fn encode_transaction_signing_bytes(tx: &Transaction) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    write_transaction_body(&mut w, tx)?;
    Ok(w.into_vec())
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction> {
    let mut r = Reader::new(bytes);
    let from = r.fixed()?;
    let to = r.fixed()?;
    let amount = r.u64()?;
    let fee = r.u64()?;
    let nonce = r.u64()?;
    let gas_limit = r.u64()?;
    let gas_price = r.u64()?;
    let tx_type_raw = r.u8()?;
    let tx_type = TxType::from_u8(tx_type_raw).ok_or_else(|| ConsensusError::InvalidFieldType {
        expected: "TxType in {1,2,3}".into(),
        actual: tx_type_raw.to_string(),
    })?;
    let data = r.var_bytes()?;
    let timestamp = r.i64()?;
    let signature = r.fixed()?;
    r.finish()?;
    Ok(Transaction {
        from,
        to,
        amount,
        fee,
        nonce,
        gas_limit,
        gas_price,
        tx_type,
        data,
        signature,
        timestamp,
    })
}

/// Transaction identity: `hash = SHA256(canonical_encode(tx))` (§3) - the
/// full wire encoding, signature included, since the hash is an identifier,
/// not the signed message.
pub fn compute_transaction_hash(tx: &Transaction) -> Result<Hash> {
    Ok(crate::hash::sha256(&encode_transaction(tx)?))
}

// ==================== PROBLEM / SOLUTION ====================

pub fn encode_problem(problem: &Problem) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.u8(problem.problem_type as u8);
    w.u8(problem.tier as u8);
    w.seq_len(problem.elements.len())?;
    for e in &problem.elements {
        w.i64(*e);
    }
    w.i64(problem.target);
    w.i64(problem.timestamp);
    Ok(w.into_vec())
}

pub fn decode_problem(bytes: &[u8]) -> Result<Problem> {
    let mut r = Reader::new(bytes);
    let type_raw = r.u8()?;
    let problem_type =
        ProblemType::from_u8(type_raw).ok_or_else(|| ConsensusError::InvalidFieldType {
            expected: "ProblemType in {1,2,3}".into(),
            actual: type_raw.to_string(),
        })?;
    let tier_raw = r.u8()?;
    let tier = HardwareTier::from_u8(tier_raw).ok_or(ConsensusError::InvalidTier { tier: tier_raw })?;
    let count = r.seq_len()?;
    let mut elements = Vec::with_capacity(count.min(MAX_PROOF_ELEMENTS));
    for _ in 0..count {
        elements.push(r.i64()?);
    }
    let target = r.i64()?;
    let timestamp = r.i64()?;
    r.finish()?;
    Ok(Problem {
        problem_type,
        tier,
        elements,
        target,
        timestamp,
    })
}

pub fn compute_problem_hash(problem: &Problem) -> Result<Hash> {
    Ok(crate::hash::sha256(&encode_problem(problem)?))
}

pub fn encode_solution(solution: &Solution) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.seq_len(solution.indices.len())?;
    for idx in &solution.indices {
        w.u32(*idx);
    }
    w.i64(solution.timestamp);
    Ok(w.into_vec())
}

pub fn decode_solution(bytes: &[u8]) -> Result<Solution> {
    let mut r = Reader::new(bytes);
    let count = r.seq_len()?;
    let mut indices = Vec::with_capacity(count.min(MAX_PROOF_ELEMENTS));
    for _ in 0..count {
        indices.push(r.u32()?);
    }
    let timestamp = r.i64()?;
    r.finish()?;
    Ok(Solution { indices, timestamp })
}

pub fn compute_solution_hash(solution: &Solution) -> Result<Hash> {
    Ok(crate::hash::sha256(&encode_solution(solution)?))
}

// ==================== COMMITMENT / REVEAL ====================

pub fn encode_commitment(commitment: &Commitment) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.fixed(&commitment.epoch_salt);
    w.fixed(&commitment.problem_hash);
    w.fixed(&commitment.miner_salt);
    Ok(w.into_vec())
}

pub fn decode_commitment(bytes: &[u8]) -> Result<Commitment> {
    let mut r = Reader::new(bytes);
    let commitment = Commitment {
        epoch_salt: r.fixed()?,
        problem_hash: r.fixed()?,
        miner_salt: r.fixed()?,
    };
    r.finish()?;
    Ok(commitment)
}

pub fn encode_reveal(reveal: &Reveal) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    let problem_bytes = encode_problem(&reveal.problem)?;
    w.var_bytes(&problem_bytes)?;
    let solution_bytes = encode_solution(&reveal.solution)?;
    w.var_bytes(&solution_bytes)?;
    w.fixed(&reveal.miner_salt);
    w.u64(reveal.nonce);
    Ok(w.into_vec())
}

pub fn decode_reveal(bytes: &[u8]) -> Result<Reveal> {
    let mut r = Reader::new(bytes);
    let problem = decode_problem(&r.var_bytes()?)?;
    let solution = decode_solution(&r.var_bytes()?)?;
    let miner_salt = r.fixed()?;
    let nonce = r.u64()?;
    r.finish()?;
    Ok(Reveal {
        problem,
        solution,
        miner_salt,
        nonce,
    })
}

// ==================== BLOCK ====================

pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    let header_bytes = encode_block_header(&block.header)?;
    w.var_bytes(&header_bytes)?;
    w.seq_len(block.transactions.len())?;
    for tx in &block.transactions {
        let tx_bytes = encode_transaction(tx)?;
        w.var_bytes(&tx_bytes)?;
    }
    match &block.reveal {
        Some(reveal) => {
            w.u8(1);
            let reveal_bytes = encode_reveal(reveal)?;
            w.var_bytes(&reveal_bytes)?;
        }
        None => w.u8(0),
    }
    match &block.cid {
        Some(cid) => {
            w.u8(1);
            w.var_bytes(cid.as_bytes())?;
        }
        None => w.u8(0),
    }
    let out = w.into_vec();
    if out.len() > MAX_BLOCK_SIZE {
        return Err(ConsensusError::FrameCapExceeded {
            len: out.len(),
            cap: MAX_BLOCK_SIZE,
        });
    }
    Ok(out)
}

pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    if bytes.len() > MAX_BLOCK_SIZE {
        return Err(ConsensusError::FrameCapExceeded {
            len: bytes.len(),
            cap: MAX_BLOCK_SIZE,
        });
    }
    let mut r = Reader::new(bytes);
    let header = decode_block_header(&r.var_bytes()?)?;
    let tx_count = r.seq_len()?;
    if tx_count > MAX_TX_PER_BLOCK {
        return Err(ConsensusError::InvalidInput(format!(
            "too many transactions: {} > {}",
            tx_count, MAX_TX_PER_BLOCK
        )));
    }
    let mut transactions = Vec::with_capacity(tx_count);
    for _ in 0..tx_count {
        transactions.push(decode_transaction(&r.var_bytes()?)?);
    }
    let has_reveal = r.u8()?;
    let reveal = match has_reveal {
        0 => None,
        1 => Some(decode_reveal(&r.var_bytes()?)?),
        other => {
            return Err(ConsensusError::InvalidFieldType {
                expected: "bool tag in {0,1}".into(),
                actual: other.to_string(),
            })
        }
    };
    let has_cid = r.u8()?;
    let cid = match has_cid {
        0 => None,
        1 => Some(
            String::from_utf8(r.var_bytes()?)
                .map_err(|e| ConsensusError::CodecError(e.to_string()))?,
        ),
        other => {
            return Err(ConsensusError::InvalidFieldType {
                expected: "bool tag in {0,1}".into(),
                actual: other.to_string(),
            })
        }
    };
    r.finish()?;
    Ok(Block {
        header,
        transactions,
        reveal,
        cid,
    })
}

pub fn validate_codec_version(version: u32) -> Result<()> {
    if version != CODEC_VERSION {
        return Err(ConsensusError::CodecVersionMismatch {
            expected: CODEC_VERSION,
            actual: version,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            codec_version: CODEC_VERSION,
            block_index: 42,
            timestamp: 1_700_000_000,
            parent_hash: [1u8; 32],
            merkle_root: [2u8; 32],
            miner_address: [3u8; 32],
            commitment: [4u8; 32],
            difficulty_target: 1000,
            nonce: 999,
            extra_data: vec![9, 9, 9],
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        let bytes = encode_block_header(&header).unwrap();
        let decoded = decode_block_header(&bytes).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn header_rejects_trailing_bytes() {
        let mut bytes = encode_block_header(&sample_header()).unwrap();
        bytes.push(0xFF);
        assert!(matches!(
            decode_block_header(&bytes),
            Err(ConsensusError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn header_deterministic_hash() {
        let header = sample_header();
        let h1 = compute_header_hash(&header).unwrap();
        let h2 = compute_header_hash(&header).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn transaction_roundtrip_excludes_signature_from_signing_bytes() {
        let tx = Transaction {
            from: [1u8; 32],
            to: [2u8; 32],
            amount: 500,
            fee: 10,
            nonce: 3,
            gas_limit: 21_000,
            gas_price: 1,
            tx_type: TxType::Transfer,
            data: vec![1, 2, 3],
            signature: [7u8; 64],
            timestamp: 123,
        };
        let full = encode_transaction(&tx).unwrap();
        let decoded = decode_transaction(&full).unwrap();
        assert_eq!(tx, decoded);

        let signing = encode_transaction_signing_bytes(&tx).unwrap();
        assert_eq!(signing.len(), full.len() - 64);
    }

    #[test]
    fn problem_roundtrip() {
        let problem = Problem {
            problem_type: ProblemType::SubsetSum,
            tier: HardwareTier::Desktop,
            elements: vec![1, 2, 3, 4, 5],
            target: 9,
            timestamp: 1000,
        };
        let bytes = encode_problem(&problem).unwrap();
        let decoded = decode_problem(&bytes).unwrap();
        assert_eq!(problem, decoded);
    }

    #[test]
    fn problem_rejects_unknown_tag() {
        let mut bytes = encode_problem(&Problem {
            problem_type: ProblemType::SubsetSum,
            tier: HardwareTier::Desktop,
            elements: vec![1],
            target: 1,
            timestamp: 0,
        })
        .unwrap();
        bytes[0] = 0xFF;
        assert!(decode_problem(&bytes).is_err());
    }

    #[test]
    fn solution_roundtrip() {
        let solution = Solution {
            indices: vec![0, 2, 4],
            timestamp: 1001,
        };
        let bytes = encode_solution(&solution).unwrap();
        let decoded = decode_solution(&bytes).unwrap();
        assert_eq!(solution, decoded);
    }

    #[test]
    fn frame_cap_rejects_oversized_length_prefix() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(FRAME_CAP_BYTES as u32 + 1).to_le_bytes());
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            r.var_bytes(),
            Err(ConsensusError::FrameCapExceeded { .. })
        ));
    }

    #[test]
    fn block_roundtrip() {
        let block = Block {
            header: sample_header(),
            transactions: vec![],
            reveal: Some(Reveal {
                problem: Problem {
                    problem_type: ProblemType::SubsetSum,
                    tier: HardwareTier::Desktop,
                    elements: vec![1, 2, 3],
                    target: 3,
                    timestamp: 1,
                },
                solution: Solution {
                    indices: vec![2],
                    timestamp: 2,
                },
                miner_salt: [5u8; 32],
                nonce: 0,
            }),
            cid: Some("Qm1111111111111111111111111111111111111111".to_string()),
        };
        let bytes = encode_block(&block).unwrap();
        let decoded = decode_block(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn block_roundtrip_without_reveal() {
        let block = Block {
            header: sample_header(),
            transactions: vec![],
            reveal: None,
            cid: None,
        };
        let bytes = encode_block(&block).unwrap();
        let decoded = decode_block(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn codec_version_validation() {
        assert!(validate_codec_version(CODEC_VERSION).is_ok());
        assert!(validate_codec_version(CODEC_VERSION + 1).is_err());
    }
}
