use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SecurityMode: u16 {
        const SIGNING_ENABLED = 0x1;
        const SIGNING_REQUIRED = 0x2;
    }
}
