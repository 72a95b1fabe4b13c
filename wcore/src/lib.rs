pub mod base64;
pub mod buf;
pub mod crypto;
pub mod hash;
pub mod key;
pub mod msgpack;
