mod binary_header;
mod logical_message;
mod rpc_type;

pub use binary_header::BinaryFrameHeader;
pub use logical_message::LogicalMessage;
pub use rpc_type::RpcType;
