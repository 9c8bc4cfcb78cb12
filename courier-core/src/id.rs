//! Entity identifiers.
//!
//! An [`EntityId`] names a user or a group on the network. It is
//! structural: an optional name (the meta seed for seeded metas), an
//! address derived from the key-binding proof, and an optional terminal
//! tag for a login point. IDs are immutable and serve as the key for
//! every cache and tracker in the workspace.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::IdError;

/// Network discriminator embedded in an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum NetworkType {
    /// Ordinary user account.
    User = 0x08,
    /// Group (polylogue).
    Group = 0x10,
    /// Relay station.
    Station = 0x88,
    /// Service bot.
    Bot = 0xC8,
}

impl NetworkType {
    /// Parse a network byte. Unknown values are rejected.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x08 => Some(Self::User),
            0x10 => Some(Self::Group),
            0x88 => Some(Self::Station),
            0xC8 => Some(Self::Bot),
            _ => None,
        }
    }

    /// True for any non-group network.
    pub fn is_user(self) -> bool {
        !self.is_group()
    }

    /// True for group networks.
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// Address of an entity: a hex fingerprint prefixed with its network
/// byte, or one of the two broadcast addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    /// Broadcast address reaching any user ("anywhere").
    Anywhere,
    /// Broadcast address reaching every group member ("everywhere").
    Everywhere,
    /// Concrete address derived from a meta.
    Concrete {
        network: NetworkType,
        /// Hex digest of the key material, without the network prefix.
        digest: String,
    },
}

impl Address {
    pub fn new(network: NetworkType, digest: impl Into<String>) -> Self {
        Self::Concrete {
            network,
            digest: digest.into(),
        }
    }

    /// The network this address belongs to. Broadcast addresses map to
    /// their natural network (anywhere = user, everywhere = group).
    pub fn network(&self) -> NetworkType {
        match self {
            Self::Anywhere => NetworkType::User,
            Self::Everywhere => NetworkType::Group,
            Self::Concrete { network, .. } => *network,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Anywhere | Self::Everywhere)
    }

    pub fn is_user(&self) -> bool {
        self.network().is_user()
    }

    pub fn is_group(&self) -> bool {
        self.network().is_group()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anywhere => write!(f, "anywhere"),
            Self::Everywhere => write!(f, "everywhere"),
            Self::Concrete { network, digest } => write!(f, "{:02x}{}", *network as u8, digest),
        }
    }
}

impl FromStr for Address {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anywhere" => return Ok(Self::Anywhere),
            "everywhere" => return Ok(Self::Everywhere),
            _ => {}
        }
        if s.len() < 4 {
            return Err(IdError::BadAddress {
                address: s.to_string(),
            });
        }
        // get() keeps multi-byte input a rejection instead of a slice panic
        let prefix = s
            .get(..2)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| IdError::BadAddress {
                address: s.to_string(),
            })?;
        let network = NetworkType::from_u8(prefix).ok_or_else(|| IdError::UnknownNetwork {
            network: prefix,
        })?;
        Ok(Self::Concrete {
            network,
            digest: s[2..].to_string(),
        })
    }
}

/// Identifier of a user or group: `name@address[/terminal]`.
///
/// Immutable once created; at most one valid [`crate::Meta`] ever binds
/// to a given id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    name: Option<String>,
    address: Address,
    terminal: Option<String>,
}

impl EntityId {
    pub fn new(name: Option<String>, address: Address) -> Self {
        Self {
            name,
            address,
            terminal: None,
        }
    }

    pub fn with_terminal(name: Option<String>, address: Address, terminal: String) -> Self {
        Self {
            name,
            address,
            terminal: Some(terminal),
        }
    }

    /// The broadcast id `anyone@anywhere`.
    pub fn anyone() -> Self {
        Self::new(Some("anyone".to_string()), Address::Anywhere)
    }

    /// The broadcast id `everyone@everywhere`.
    pub fn everyone() -> Self {
        Self::new(Some("everyone".to_string()), Address::Everywhere)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn terminal(&self) -> Option<&str> {
        self.terminal.as_deref()
    }

    pub fn network(&self) -> NetworkType {
        self.address.network()
    }

    pub fn is_user(&self) -> bool {
        self.address.is_user()
    }

    pub fn is_group(&self) -> bool {
        self.address.is_group()
    }

    /// Broadcast ids are never queried, cached, or persisted.
    pub fn is_broadcast(&self) -> bool {
        self.address.is_broadcast()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}@{}", name, self.address)?;
        } else {
            write!(f, "{}", self.address)?;
        }
        if let Some(terminal) = &self.terminal {
            write!(f, "/{}", terminal)?;
        }
        Ok(())
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        let (main, terminal) = match s.split_once('/') {
            Some((main, term)) => (main, Some(term.to_string())),
            None => (s, None),
        };
        let (name, address) = match main.split_once('@') {
            Some((name, addr)) => (Some(name.to_string()), addr.parse()?),
            None => (None, main.parse()?),
        };
        Ok(Self {
            name,
            address,
            terminal,
        })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
