use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("resulting subnet mask /{0} is not narrower than 32 bits")]
    MaskTooWide(u8),

    #[error("address {0} is outside of range {1}")]
    OutOfRange(String, String),

    #[error("address {0} is already allocated")]
    AlreadyAllocated(String),

    #[error("address {0} is not allocated")]
    NotAllocated(String),

    #[error("no free address available in range {0}")]
    RangeFull(String),

    #[error("no free CIDR available in the pool")]
    PoolExhausted,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
