use crate::value::Pk;

// ── Key encoding ────────────────────────────────────────────
//
// Row keys:   [tag][payload]
//   tag 'i' → 8-byte BE i64 with the sign bit flipped (sorts numerically)
//   tag 's' → UTF-8 bytes
//
// Join keys:  [4-byte BE owner key len][owner key][target key]
//
// Sequence keys live in the `_sys` CF: b"seq:" + table name.

const TAG_INT: u8 = b'i';
const TAG_STR: u8 = b's';
const SEQ_PREFIX: &[u8] = b"seq:";

pub(crate) fn encode_pk(pk: &Pk) -> Vec<u8> {
    match pk {
        Pk::Int(i) => {
            let mut buf = Vec::with_capacity(9);
            buf.push(TAG_INT);
            buf.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
            buf
        }
        Pk::Str(s) => {
            let mut buf = Vec::with_capacity(1 + s.len());
            buf.push(TAG_STR);
            buf.extend_from_slice(s.as_bytes());
            buf
        }
    }
}

pub(crate) fn decode_pk(bytes: &[u8]) -> Option<Pk> {
    let (tag, payload) = bytes.split_first()?;
    match *tag {
        TAG_INT => {
            let raw: [u8; 8] = payload.try_into().ok()?;
            Some(Pk::Int((u64::from_be_bytes(raw) ^ (1 << 63)) as i64))
        }
        TAG_STR => std::str::from_utf8(payload)
            .ok()
            .map(|s| Pk::Str(s.to_string())),
        _ => None,
    }
}

pub(crate) fn join_prefix(owner: &Pk) -> Vec<u8> {
    let owner = encode_pk(owner);
    let mut buf = Vec::with_capacity(4 + owner.len());
    buf.extend_from_slice(&(owner.len() as u32).to_be_bytes());
    buf.extend_from_slice(&owner);
    buf
}

pub(crate) fn join_key(owner: &Pk, target: &Pk) -> Vec<u8> {
    let mut buf = join_prefix(owner);
    buf.extend_from_slice(&encode_pk(target));
    buf
}

/// Split a join key back into (owner, target).
pub(crate) fn decode_join_key(bytes: &[u8]) -> Option<(Pk, Pk)> {
    let len_bytes: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let owner = decode_pk(bytes.get(4..4 + len)?)?;
    let target = decode_pk(bytes.get(4 + len..)?)?;
    Some((owner, target))
}

pub(crate) fn sequence_key(table: &str) -> Vec<u8> {
    let mut buf = SEQ_PREFIX.to_vec();
    buf.extend_from_slice(table.as_bytes());
    buf
}
