//! Request/response surface and framing. The transport below this point is
//! a plain byte stream; everything security- or encoding-exotic (TLS, SASL)
//! lives outside the gateway.

pub mod frame;
pub mod messages;
pub mod status;

pub use frame::{FrameError, MAX_FRAME_LEN, read_frame, write_frame};
pub use messages::{Request, Response};
pub use status::{Status, StatusCode};
