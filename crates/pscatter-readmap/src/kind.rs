use pscatter_core::StringEncoding;

/// What an entry reads and how its bytes should be interpreted. Carries
/// enough information to register the underlying `prepare_read` call and,
/// later, to decode the entry's captured bytes on demand.
#[derive(Debug, Clone, Copy)]
pub enum EntryKind {
    Value { size: u64 },
    Array { elem_size: u64, count: u64 },
    String { len: u64, encoding: StringEncoding },
    Pointer,
}

impl EntryKind {
    pub fn value<T>() -> EntryKind {
        EntryKind::Value {
            size: std::mem::size_of::<T>() as u64,
        }
    }

    pub fn array<T>(count: u64) -> EntryKind {
        EntryKind::Array {
            elem_size: std::mem::size_of::<T>() as u64,
            count,
        }
    }

    pub fn string(len: u64, encoding: StringEncoding) -> EntryKind {
        EntryKind::String { len, encoding }
    }

    pub fn pointer() -> EntryKind {
        EntryKind::Pointer
    }

    pub fn byte_len(&self) -> u64 {
        match self {
            EntryKind::Value { size } => *size,
            EntryKind::Array { elem_size, count } => elem_size * count,
            EntryKind::String { len, .. } => *len,
            EntryKind::Pointer => std::mem::size_of::<u64>() as u64,
        }
    }
}
