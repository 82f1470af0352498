pub mod decode;
pub mod framer;
pub mod spectrum;
