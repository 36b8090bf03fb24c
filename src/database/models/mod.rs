pub mod protocol;
pub mod protocol_schema;
pub mod tag;

pub use protocol::Protocol;
pub use protocol_schema::ProtocolSchema;
pub use tag::Tag;
