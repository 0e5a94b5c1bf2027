//! RLP helpers shared by the bit-exact wire formats (DAG block, PBFT
//! block, vote) defined in the consensus and vote crates.

use alloy_rlp::{BufMut, Decodable, Encodable, Header};

/// Encode a `[u8; 32]` as an RLP byte string.
pub fn encode_hash32(hash: &[u8; 32], out: &mut dyn BufMut) {
    hash.as_slice().encode(out);
}

/// Decode a `[u8; 32]` from an RLP byte string.
pub fn decode_hash32(buf: &mut &[u8]) -> alloy_rlp::Result<[u8; 32]> {
    let bytes = alloy_rlp::Bytes::decode(buf)?;
    if bytes.len() != 32 {
        return Err(alloy_rlp::Error::UnexpectedLength);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Encode a list of `[u8; 32]` hashes as an RLP list.
pub fn encode_hash32_list(hashes: &[[u8; 32]], out: &mut dyn BufMut) {
    let total_len: usize = hashes.iter().map(|h| h.as_slice().length()).sum();
    Header { list: true, payload_length: total_len }.encode(out);
    for h in hashes {
        h.as_slice().encode(out);
    }
}

/// Decode a list of `[u8; 32]` hashes from an RLP list.
pub fn decode_hash32_list(buf: &mut &[u8]) -> alloy_rlp::Result<Vec<[u8; 32]>> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    let mut remaining = &buf[..header.payload_length];
    let mut out = Vec::new();
    while !remaining.is_empty() {
        out.push(decode_hash32(&mut remaining)?);
    }
    *buf = &buf[header.payload_length..];
    Ok(out)
}
