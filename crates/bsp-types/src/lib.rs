//! The subset of the [BSP structures](https://build-server-protocol.github.io/docs/specification)
//! spoken by the build-system integration layer of the language server,
//! plus the SourceKit-flavored extension records carried in `data` fields.

pub use basic_structures::*;
pub use connection_details::*;
pub use requests::SourcesItem;

pub mod basic_structures;
pub mod connection_details;
pub mod notifications;
pub mod requests;

pub const PROTOCOL_VERSION: &str = "2.1.0";

pub mod tests {
    use serde::Deserialize;

    pub fn test_deserialization<T>(json: &str, expected: &T)
    where
        T: for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug,
    {
        let value = serde_json::from_str::<T>(json).unwrap();
        assert_eq!(&value, expected);
    }
}
