pub mod amounts;
pub mod runtime;
pub mod ss58;
