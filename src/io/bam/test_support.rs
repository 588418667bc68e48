//! Byte builders for BAM unit tests.

use super::header::BAM_MAGIC;

/// Serialize a BAM header.
pub(crate) fn header_bytes(text: &str, refs: &[(&str, u32)]) -> Vec<u8> {
    let mut data = BAM_MAGIC.to_vec();
    data.extend_from_slice(&(text.len() as i32).to_le_bytes());
    data.extend_from_slice(text.as_bytes());
    data.extend_from_slice(&(refs.len() as i32).to_le_bytes());
    for (name, len) in refs {
        data.extend_from_slice(&(name.len() as i32 + 1).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        data.extend_from_slice(&(*len as i32).to_le_bytes());
    }
    data
}

/// Fields of a record to serialize.
pub(crate) struct RecordFields<'a> {
    pub ref_id: i32,
    /// 0-based
    pub pos: i32,
    pub name: &'a str,
    pub mapq: u8,
    pub flag: u16,
    /// (code, length)
    pub cigar: &'a [(u32, u32)],
    pub seq: &'a str,
    pub aux: &'a [u8],
}

impl Default for RecordFields<'_> {
    fn default() -> Self {
        Self {
            ref_id: 0,
            pos: 0,
            name: "r1",
            mapq: 60,
            flag: 0,
            cigar: &[],
            seq: "",
            aux: &[],
        }
    }
}

fn base_code(base: u8) -> u8 {
    match base {
        b'=' => 0,
        b'A' => 1,
        b'C' => 2,
        b'G' => 4,
        b'T' => 8,
        _ => 15,
    }
}

/// Serialize one alignment record, including its block_size prefix.
pub(crate) fn record_bytes(fields: &RecordFields<'_>) -> Vec<u8> {
    let seq = fields.seq.as_bytes();
    let mut body = Vec::new();
    body.extend_from_slice(&fields.ref_id.to_le_bytes());
    body.extend_from_slice(&fields.pos.to_le_bytes());
    body.push(fields.name.len() as u8 + 1);
    body.push(fields.mapq);
    body.extend_from_slice(&0u16.to_le_bytes()); // bin
    body.extend_from_slice(&(fields.cigar.len() as u16).to_le_bytes());
    body.extend_from_slice(&fields.flag.to_le_bytes());
    body.extend_from_slice(&(seq.len() as i32).to_le_bytes());
    body.extend_from_slice(&(-1i32).to_le_bytes()); // next_refID
    body.extend_from_slice(&(-1i32).to_le_bytes()); // next_pos
    body.extend_from_slice(&0i32.to_le_bytes()); // tlen
    body.extend_from_slice(fields.name.as_bytes());
    body.push(0);
    for (code, len) in fields.cigar {
        body.extend_from_slice(&((len << 4) | code).to_le_bytes());
    }
    for pair in seq.chunks(2) {
        let high = base_code(pair[0]) << 4;
        let low = pair.get(1).map(|b| base_code(*b)).unwrap_or(0);
        body.push(high | low);
    }
    body.extend(std::iter::repeat(30u8).take(seq.len()));
    body.extend_from_slice(fields.aux);

    let mut data = (body.len() as i32).to_le_bytes().to_vec();
    data.extend_from_slice(&body);
    data
}
