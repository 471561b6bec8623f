use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBAccessMask: u32 {
        const FILE_READ_DATA = 0x00000001;
        const FILE_WRITE_DATA = 0x00000002;
        const FILE_APPEND_DATA = 0x00000004;
        const FILE_READ_EA = 0x00000008;
        const FILE_WRITE_EA = 0x00000010;
        const FILE_EXECUTE = 0x00000020;
        const FILE_DELETE_CHILD = 0x00000040;
        const FILE_READ_ATTRIBUTES = 0x00000080;
        const FILE_WRITE_ATTRIBUTES = 0x00000100;
        const DELETE = 0x00010000;
        const READ_CONTROL = 0x00020000;
        const WRITE_DAC = 0x00040000;
        const WRITE_OWNER = 0x00080000;
        const SYNCHRONIZE = 0x00100000;
        const GENERIC_ALL = 0x10000000;
        const GENERIC_EXECUTE = 0x20000000;
        const GENERIC_WRITE = 0x40000000;
        const GENERIC_READ = 0x80000000;
    }
}

/// The coarse access kind a share-level policy decides on.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Copy, Clone)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    pub fn includes_write(&self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

impl SMBAccessMask {
    pub fn requests_read(&self) -> bool {
        self.intersects(
            SMBAccessMask::FILE_READ_DATA | SMBAccessMask::GENERIC_READ | SMBAccessMask::GENERIC_ALL,
        )
    }

    pub fn requests_write(&self) -> bool {
        self.intersects(
            SMBAccessMask::FILE_WRITE_DATA
                | SMBAccessMask::FILE_APPEND_DATA
                | SMBAccessMask::DELETE
                | SMBAccessMask::GENERIC_WRITE
                | SMBAccessMask::GENERIC_ALL,
        )
    }

    /// The coarse access kind this mask amounts to, for policy checks.
    pub fn file_access(&self) -> FileAccess {
        match (self.requests_read(), self.requests_write()) {
            (_, false) => FileAccess::Read,
            (false, true) => FileAccess::Write,
            (true, true) => FileAccess::ReadWrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_access_classification() {
        assert_eq!(SMBAccessMask::FILE_READ_DATA.file_access(), FileAccess::Read);
        assert_eq!(SMBAccessMask::FILE_WRITE_DATA.file_access(), FileAccess::Write);
        let both = SMBAccessMask::FILE_READ_DATA | SMBAccessMask::FILE_WRITE_DATA;
        assert_eq!(both.file_access(), FileAccess::ReadWrite);
        assert_eq!(SMBAccessMask::GENERIC_ALL.file_access(), FileAccess::ReadWrite);
    }
}
