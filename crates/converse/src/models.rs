//! These models represent the objects passed between the router and the upstream
//!
//! Two formats overlap here: the invocation payloads accepted by the router, and
//! the Converse API shapes sent to and received from the inference service. The
//! request side is modelled as typed structs that serialize straight into the
//! upstream shape; the stream side is decoded into [`event::StreamEvent`].
pub mod event;
pub mod message;
pub mod request;
pub mod tool;
