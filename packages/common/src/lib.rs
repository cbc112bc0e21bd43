pub mod clock;
pub mod error;
pub mod filesystem;
pub mod id_generator;
pub mod result;

pub use clock::*;
pub use error::*;
pub use filesystem::*;
pub use id_generator::*;
pub use result::*;
