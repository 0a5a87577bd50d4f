//! Small helpers shared by canopy front ends: JSON decoding, atomic writes,
//! value masking, an async FIFO lock and drift-corrected timers.
//! canopy 前端共用的小工具。

mod fs;
mod json;
mod lock;
mod mask;
mod timer;

pub use fs::{temp_sibling, write_atomic};
pub use json::{decode_json, safe_json_parse};
pub use lock::FifoMutex;
pub use mask::{desensitize, MaskError, MaskKind};
pub use timer::{SelfCorrectingClock, SelfCorrectingCountdown};
