pub mod naming;

pub use naming::to_kebab_ascii;
