//! Byte-level construction of stack-map sections.

struct RecordSpec {
    id: i64,
    offset: u32,
    locations: Vec<(u8, u16, u16, i32)>,
    live_outs: Vec<(u16, u8)>,
}

/// Assembles a little-endian stack-map section of a given version for a 64-bit target.
///
/// `location` and `live_out` attach to the most recently added record.
pub struct StackMapBuilder {
    version: u8,
    stack_sizes: Vec<(u64, u64)>,
    constants: Vec<i64>,
    records: Vec<RecordSpec>,
}

impl StackMapBuilder {
    pub fn new(version: u8) -> Self {
        StackMapBuilder {
            version,
            stack_sizes: Vec::new(),
            constants: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn stack_size(mut self, function_offset: u64, size: u64) -> Self {
        self.stack_sizes.push((function_offset, size));
        self
    }

    pub fn constant(mut self, value: i64) -> Self {
        self.constants.push(value);
        self
    }

    pub fn record(mut self, id: i64, offset: u32) -> Self {
        self.records.push(RecordSpec {
            id,
            offset,
            locations: Vec::new(),
            live_outs: Vec::new(),
        });
        self
    }

    pub fn location(mut self, kind: u8, size: u16, register: u16, offset: i32) -> Self {
        if let Some(record) = self.records.last_mut() {
            record.locations.push((kind, size, register, offset));
        }
        self
    }

    pub fn live_out(mut self, register: u16, size: u8) -> Self {
        if let Some(record) = self.records.last_mut() {
            record.live_outs.push((register, size));
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        let aligned = self.version >= 1;
        let mut out = vec![self.version, 0, 0, 0];
        push_u32(&mut out, self.stack_sizes.len());
        if aligned {
            push_u32(&mut out, self.constants.len());
            push_u32(&mut out, self.records.len());
        }

        for (function_offset, size) in &self.stack_sizes {
            if self.version == 0 {
                out.extend_from_slice(&(*function_offset as u32).to_le_bytes());
                out.extend_from_slice(&(*size as u32).to_le_bytes());
            } else {
                out.extend_from_slice(&function_offset.to_le_bytes());
                out.extend_from_slice(&size.to_le_bytes());
                if self.version >= 3 {
                    out.extend_from_slice(&(self.records.len() as u64).to_le_bytes());
                }
            }
        }

        if !aligned {
            push_u32(&mut out, self.constants.len());
        }
        for constant in &self.constants {
            out.extend_from_slice(&constant.to_le_bytes());
        }

        if !aligned {
            push_u32(&mut out, self.records.len());
        }
        for record in &self.records {
            out.extend_from_slice(&record.id.to_le_bytes());
            out.extend_from_slice(&record.offset.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(record.locations.len() as u16).to_le_bytes());
            for (kind, size, register, offset) in &record.locations {
                out.push(*kind);
                out.push(0);
                out.extend_from_slice(&size.to_le_bytes());
                out.extend_from_slice(&register.to_le_bytes());
                out.extend_from_slice(&0u16.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
            }
            if aligned {
                align(&mut out);
            }

            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(record.live_outs.len() as u16).to_le_bytes());
            for (register, size) in &record.live_outs {
                out.extend_from_slice(&register.to_le_bytes());
                out.push(0);
                out.push(*size);
            }
            if aligned {
                align(&mut out);
            }
        }
        out
    }
}

fn push_u32(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&(value as u32).to_le_bytes());
}

fn align(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}
