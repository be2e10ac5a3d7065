//! Part boundary arithmetic

/// Part size used for every upload: 5 MiB
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Byte range of the source file sent as one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub offset: u64,
    pub length: u64,
}

impl PartRange {
    /// Range starting at `offset`, clamped to the end of the file
    pub fn new(offset: u64, part_size: u64, file_len: u64) -> Self {
        Self {
            offset,
            length: part_size.min(file_len.saturating_sub(offset)),
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Number of parts needed to cover `file_len` bytes
pub fn part_count(file_len: u64, part_size: u64) -> u64 {
    file_len.div_ceil(part_size)
}

/// Parts still to upload when resuming from `position`
pub fn remaining_parts(position: u64, part_size: u64, file_len: u64) -> u64 {
    part_count(file_len.saturating_sub(position), part_size)
}
