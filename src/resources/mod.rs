pub mod constants;
pub mod runtime;
pub mod settings;

pub use constants::*;
pub use runtime::*;
pub use settings::*;
