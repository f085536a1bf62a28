//! Canonical binary encoding of protocol entities.
//!
//! # Layouts
//! ```text
//! bytes   : len:u32 || raw
//! fixvec  : count:u32 || item_0 || item_1 || ...
//! dynvec  : total:u32 || offset_0:u32 || ... || offset_n-1:u32 || item_0 || ...
//! table   : same layout as dynvec, one entry per field
//! option  : empty when absent, otherwise the inner encoding
//! struct  : fixed-size fields concatenated
//! ```
//! All integers are little-endian. An empty dynvec is the 4-byte header `[4, 0, 0, 0]`.
//! Transaction hashes and signatures commit to these exact bytes.

use crate::types::{
    CellDep, CellInput, CellOutput, OutPoint, RawTransaction, Script, Transaction, WitnessArgs,
};

const NUMBER_SIZE: usize = 4;

/// Canonical serialization.
pub trait Pack {
    fn pack(&self) -> Vec<u8>;
}

fn number(n: usize) -> [u8; NUMBER_SIZE] {
    (n as u32).to_le_bytes()
}

/// `len || raw`.
pub fn bytes(raw: &[u8]) -> Vec<u8> {
    fixvec(raw.len(), raw)
}

/// `count || items`, where `items` holds `count` fixed-size encodings.
pub fn fixvec(count: usize, items: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(NUMBER_SIZE + items.len());
    out.extend_from_slice(&number(count));
    out.extend_from_slice(items);
    out
}

/// Offset-indexed vector of variable-size items.
pub fn dynvec(items: &[Vec<u8>]) -> Vec<u8> {
    let header = NUMBER_SIZE * (items.len() + 1);
    let total = header + items.iter().map(Vec::len).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&number(total));
    let mut offset = header;
    for item in items {
        out.extend_from_slice(&number(offset));
        offset += item.len();
    }
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// Table of fields; shares the dynvec layout.
pub fn table(fields: &[Vec<u8>]) -> Vec<u8> {
    dynvec(fields)
}

pub fn option(value: Option<Vec<u8>>) -> Vec<u8> {
    value.unwrap_or_default()
}

fn concat<T: Pack>(items: &[T]) -> Vec<u8> {
    items.iter().flat_map(Pack::pack).collect()
}

impl Pack for OutPoint {
    fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(36);
        out.extend_from_slice(self.tx_hash.as_bytes());
        out.extend_from_slice(&self.index.to_le_bytes());
        out
    }
}

impl Pack for CellInput {
    fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(44);
        out.extend_from_slice(&self.since.to_le_bytes());
        out.extend_from_slice(&self.previous_output.pack());
        out
    }
}

impl Pack for CellDep {
    fn pack(&self) -> Vec<u8> {
        let mut out = self.out_point.pack();
        out.push(self.dep_type.as_byte());
        out
    }
}

impl Pack for Script {
    fn pack(&self) -> Vec<u8> {
        table(&[
            self.code_hash.as_bytes().to_vec(),
            vec![self.hash_type.as_byte()],
            bytes(&self.args),
        ])
    }
}

impl Pack for CellOutput {
    fn pack(&self) -> Vec<u8> {
        table(&[
            self.capacity.to_le_bytes().to_vec(),
            self.lock.pack(),
            option(self.type_.as_ref().map(Pack::pack)),
        ])
    }
}

impl Pack for WitnessArgs {
    fn pack(&self) -> Vec<u8> {
        table(&[
            option(self.lock.as_deref().map(bytes)),
            option(self.input_type.as_deref().map(bytes)),
            option(self.output_type.as_deref().map(bytes)),
        ])
    }
}

impl Pack for RawTransaction {
    fn pack(&self) -> Vec<u8> {
        let header_deps: Vec<u8> = self.header_deps.iter().flat_map(|h| h.0).collect();
        let outputs: Vec<Vec<u8>> = self.outputs.iter().map(Pack::pack).collect();
        let outputs_data: Vec<Vec<u8>> = self.outputs_data.iter().map(|d| bytes(d)).collect();
        table(&[
            self.version.to_le_bytes().to_vec(),
            fixvec(self.cell_deps.len(), &concat(&self.cell_deps)),
            fixvec(self.header_deps.len(), &header_deps),
            fixvec(self.inputs.len(), &concat(&self.inputs)),
            dynvec(&outputs),
            dynvec(&outputs_data),
        ])
    }
}

impl Pack for Transaction {
    fn pack(&self) -> Vec<u8> {
        let witnesses: Vec<Vec<u8>> = self.witnesses.iter().map(|w| bytes(w)).collect();
        table(&[self.raw.pack(), dynvec(&witnesses)])
    }
}
