pub mod sir_ua;

pub use sir_ua::SirUaParams;
