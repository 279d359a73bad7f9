//! Network endpoint for the responder.

pub mod socket;

pub use socket::{DatagramSocket, MulticastSocket, interface_ipv4, is_closed};
