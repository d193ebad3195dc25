//! Frame encoding and delivery to collectors.
//!
//! Each frame is encoded once as JPEG and POSTed to every destination at
//! `{destination}/{device}/{sequence}`. Delivery is sequential and blocking;
//! the first failure aborts the whole frame set.

mod encode;
mod sender;

pub use encode::{encode_jpeg, JPEG_CONTENT_TYPE};
pub use sender::{
    FramePoster, HttpPoster, PostError, SendReport, TransportError, TransportSender,
    ACCEPTED_STATUS,
};
