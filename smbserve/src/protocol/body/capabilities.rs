use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct Capabilities: u32 {
        const DFS = 0x1;
        const LEASING = 0x2;
        const LARGE_MTU = 0x4;
        const MULTI_CHANNEL = 0x8;
        const PERSISTENT_HANDLES = 0x10;
        const DIRECTORY_LEASING = 0x20;
        const ENCRYPTION = 0x40;
    }
}
