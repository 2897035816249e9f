#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RpcType {
    Request = 0x0,
    Response = 0x1,
    Notification = 0x2,
}

impl TryFrom<u8> for RpcType {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0x0 => Ok(RpcType::Request),
            0x1 => Ok(RpcType::Response),
            0x2 => Ok(RpcType::Notification),
            other => Err(other),
        }
    }
}
