pub mod builder;
pub mod checksum;
pub mod injection;
pub mod packet;

pub use injection::PacketInjector;
