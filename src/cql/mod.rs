pub mod codec;
pub mod header;
pub mod opcode;
pub mod result;
pub mod statement;
pub mod types;

pub(crate) const CQL_VERSION_KEY: &str = "CQL_VERSION";
pub(crate) const CQL_VERSION_VALUE: &str = "4.0.0";

/// Consistency level, passed through opaquely to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl Consistency {
    pub fn to_wire(self) -> u16 {
        match self {
            Consistency::Any => 0x0000,
            Consistency::One => 0x0001,
            Consistency::Two => 0x0002,
            Consistency::Three => 0x0003,
            Consistency::Quorum => 0x0004,
            Consistency::All => 0x0005,
            Consistency::LocalQuorum => 0x0006,
            Consistency::EachQuorum => 0x0007,
            Consistency::Serial => 0x0008,
            Consistency::LocalSerial => 0x0009,
            Consistency::LocalOne => 0x000A,
        }
    }
}

impl Default for Consistency {
    fn default() -> Self {
        Consistency::All
    }
}
