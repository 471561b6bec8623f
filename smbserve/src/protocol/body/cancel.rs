use serde::{Deserialize, Serialize};

/// Modern-family cancel addresses the in-flight operation via the header's
/// async id (or message id for synchronously pending requests).
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBCancelRequest {}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBCancelResponse {}

/// Legacy-family out-of-band cancel; the target is identified by the
/// header's PID/MID pair and no response is ever produced.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct LegacySMBCancelRequest {}
