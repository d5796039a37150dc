use ahash::AHashMap;

/// A segment's field-number namespace and document count.
///
/// Field numbers are small dense integers starting at 1, allocated on demand and
/// stable for the lifetime of the segment. Number 0 is never assigned.
#[derive(Debug, Clone)]
pub struct Segment {
    number: u64,
    by_name: AHashMap<String, u32>,
    names: Vec<String>,
    count: u64,
}

impl Segment {
    pub fn new(number: u64) -> Segment {
        Segment {
            number,
            by_name: AHashMap::new(),
            names: Vec::new(),
            count: 0,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Directory-style name of the segment, `seg_` followed by the segment number
    /// in base 36.
    pub fn name(&self) -> String {
        format!("seg_{}", to_base36(self.number))
    }

    /// Number assigned to `field`, if any.
    pub fn field_num(&self, field: &str) -> Option<u32> {
        self.by_name.get(field).copied()
    }

    /// Returns the number of `field`, assigning the next free one on first use.
    pub fn add_field(&mut self, field: &str) -> u32 {
        if let Some(num) = self.field_num(field) {
            return num;
        }
        self.names.push(field.to_string());
        let num = self.names.len() as u32;
        self.by_name.insert(field.to_string(), num);
        num
    }

    /// Name of the field numbered `num`.
    pub fn field_name(&self, num: u32) -> Option<&str> {
        let index = (num as usize).checked_sub(1)?;
        self.names.get(index).map(String::as_str)
    }

    pub fn num_fields(&self) -> usize {
        self.names.len()
    }

    /// Number of documents recorded in the segment.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Records `by` more documents and returns the new count.
    pub fn increment_count(&mut self, by: u64) -> u64 {
        self.count += by;
        self.count
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut buf = Vec::with_capacity(13);
    loop {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    buf.iter().rev().map(|&b| b as char).collect()
}
