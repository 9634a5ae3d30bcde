//! Two-pass serialization of a laid-out [`Ir`].
//!
//! Pass one sizes every name and attribute block and assigns payload
//! offsets. Record offsets depend only on layout position, so every
//! reference target is known before pass two writes a single byte.

use ncd_common::InternalError;
use ncd_ir::{Ir, IrNode, IrValue, NodeId};

use crate::error::CompileError;
use crate::format::{
    body_checksum, home_slot, index_slot_count, Header, FORMAT_VERSION, HEADER_LEN, RECORD_LEN,
    SLOT_LEN, VALUE_BOOL, VALUE_FLOAT, VALUE_INT, VALUE_REF, VALUE_STR,
};

/// Where one node's payload lives.
#[derive(Debug, Clone, Copy)]
struct Placement {
    name_offset: u64,
    attrs_offset: u64,
    attrs_len: u64,
}

fn str_size(s: &str) -> u64 {
    4 + s.len() as u64
}

fn value_size(value: &IrValue) -> u64 {
    match value {
        IrValue::Int(_) | IrValue::Float(_) => 8,
        IrValue::Bool(_) => 1,
        IrValue::Str(s) => str_size(s),
        IrValue::Ref(_) => 4,
    }
}

fn attrs_size(node: &IrNode) -> u64 {
    node.attributes
        .iter()
        .map(|a| str_size(&a.name) + 1 + value_size(&a.value))
        .sum()
}

fn narrow(value: u64) -> Result<u32, CompileError> {
    u32::try_from(value).map_err(|_| CompileError::TooLarge {
        size: value,
        max: u32::MAX as u64,
    })
}

/// Serializes `ir` with records in `order`.
pub fn write_artifact(ir: &Ir, order: &[NodeId], load_factor: f64) -> Result<Vec<u8>, CompileError> {
    if order.len() != ir.len() {
        return Err(InternalError::new(format!(
            "layout order has {} entries, IR has {}",
            order.len(),
            ir.len()
        ))
        .into());
    }

    let count = order.len();
    let index_offset = (HEADER_LEN + count * RECORD_LEN) as u64;
    let slot_count = index_slot_count(count, load_factor);
    // Bound the index before allocating it.
    let payload_offset = slot_count
        .checked_mul(SLOT_LEN as u64)
        .and_then(|len| len.checked_add(index_offset))
        .ok_or(CompileError::TooLarge {
            size: u64::MAX,
            max: u32::MAX as u64,
        })?;
    narrow(payload_offset)?;
    let slots = slot_count as usize;

    // Pass one: sizes and offsets.
    let mut position_of = vec![0u32; ir.len()];
    let mut placements = Vec::with_capacity(count);
    let mut cursor = payload_offset;
    for (position, &id) in order.iter().enumerate() {
        position_of[id.index()] = position as u32;
        let node = &ir.nodes[id];
        let name_offset = cursor;
        let attrs_offset = name_offset + str_size(&node.name);
        let attrs_len = attrs_size(node);
        cursor = attrs_offset + attrs_len;
        placements.push(Placement {
            name_offset,
            attrs_offset,
            attrs_len,
        });
    }
    let total_len = narrow(cursor)?;
    let record_offset = |id: NodeId| (HEADER_LEN + position_of[id.index()] as usize * RECORD_LEN) as u32;

    // Pass two: serialize.
    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(&[0u8; HEADER_LEN]);

    for (&id, placement) in order.iter().zip(&placements) {
        let node = &ir.nodes[id];
        for field in [
            node.tag,
            narrow(placement.name_offset)?,
            narrow(placement.attrs_offset)?,
            narrow(placement.attrs_len)?,
            node.attributes.len() as u32,
            0,
        ] {
            put_u32(&mut out, field);
        }
    }

    let mut index = vec![0u32; slots];
    for (position, &id) in order.iter().enumerate() {
        let mut slot = home_slot(&ir.nodes[id].name, slots);
        while index[slot] != 0 {
            slot = (slot + 1) % slots;
        }
        index[slot] = position as u32 + 1;
    }
    for slot in index {
        put_u32(&mut out, slot);
    }

    for &id in order {
        let node = &ir.nodes[id];
        put_str(&mut out, &node.name);
        for attr in &node.attributes {
            put_str(&mut out, &attr.name);
            match &attr.value {
                IrValue::Int(i) => {
                    out.push(VALUE_INT);
                    out.extend_from_slice(&i.to_le_bytes());
                }
                IrValue::Float(x) => {
                    out.push(VALUE_FLOAT);
                    out.extend_from_slice(&x.to_bits().to_le_bytes());
                }
                IrValue::Bool(b) => {
                    out.push(VALUE_BOOL);
                    out.push(u8::from(*b));
                }
                IrValue::Str(s) => {
                    out.push(VALUE_STR);
                    put_str(&mut out, s);
                }
                IrValue::Ref(target) => {
                    out.push(VALUE_REF);
                    put_u32(&mut out, record_offset(*target));
                }
            }
        }
    }

    if out.len() != total_len as usize {
        return Err(InternalError::new(format!(
            "serialized {} bytes, sized {total_len}",
            out.len()
        ))
        .into());
    }

    let header = Header {
        version: FORMAT_VERSION,
        entry_count: count as u32,
        record_table_offset: HEADER_LEN as u32,
        index_offset: index_offset as u32,
        index_slots: slots as u32,
        payload_offset: payload_offset as u32,
        total_len,
        checksum: body_checksum(&out),
    };
    out[..HEADER_LEN].copy_from_slice(&header.encode());
    Ok(out)
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}
