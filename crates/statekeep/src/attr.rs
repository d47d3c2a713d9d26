//! Minimal attribute-list collaborator.
//!
//! Packet parsing and encoding happen elsewhere; the cache only needs to find
//! the State attribute, move attribute sets between lists, and append a new
//! State to an outbound packet.

use crate::token::Token;

/// Attribute number of the State attribute (RFC 2865 section 5.24).
pub const STATE: u32 = 24;

/// A single protocol attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute number.
    pub number: u32,

    /// Raw value octets.
    pub value: Vec<u8>,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(number: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            value: value.into(),
        }
    }
}

/// An ordered list of attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    attrs: Vec<Attribute>,
}

impl AttributeList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the first attribute with the given number.
    pub fn find(&self, number: u32) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.number == number)
    }

    /// Append an attribute.
    pub fn push(&mut self, attr: Attribute) {
        self.attrs.push(attr);
    }

    /// Append every attribute of `other`, preserving order.
    pub fn extend(&mut self, other: AttributeList) {
        self.attrs.extend(other.attrs);
    }

    /// Remove every attribute with the given number, returning how many went.
    pub fn remove_all(&mut self, number: u32) -> usize {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.number != number);
        before - self.attrs.len()
    }

    /// Move every attribute out, leaving this list empty.
    pub fn take_all(&mut self) -> AttributeList {
        std::mem::take(self)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }
}

impl FromIterator<Attribute> for AttributeList {
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        Self {
            attrs: iter.into_iter().collect(),
        }
    }
}

/// The parts of a protocol packet the cache looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Attributes carried by the packet.
    pub attributes: AttributeList,
}

impl Packet {
    /// Create a packet with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet carrying `token` as its State attribute.
    pub fn with_state(token: &Token) -> Self {
        let mut packet = Self::new();
        packet.set_state(token);
        packet
    }

    /// Raw octets of the first State attribute, if any.
    pub fn state(&self) -> Option<&[u8]> {
        self.attributes.find(STATE).map(|a| a.value.as_slice())
    }

    /// Attach `token` as the packet's only State attribute.
    pub fn set_state(&mut self, token: &Token) {
        self.attributes.remove_all(STATE);
        self.attributes
            .push(Attribute::new(STATE, token.as_bytes().to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_returns_first_match() {
        let list: AttributeList = vec![
            Attribute::new(1, b"a".to_vec()),
            Attribute::new(2, b"b".to_vec()),
            Attribute::new(1, b"c".to_vec()),
        ]
        .into_iter()
        .collect();

        assert_eq!(list.find(1).map(|a| a.value.as_slice()), Some(&b"a"[..]));
        assert!(list.find(3).is_none());
    }

    #[test]
    fn test_take_all_empties_source() {
        let mut list = AttributeList::new();
        list.push(Attribute::new(1, b"x".to_vec()));
        list.push(Attribute::new(2, b"y".to_vec()));

        let taken = list.take_all();
        assert!(list.is_empty());
        assert_eq!(taken.len(), 2);
    }

    #[test]
    fn test_set_state_replaces_existing() {
        let mut packet = Packet::new();
        packet.attributes.push(Attribute::new(STATE, b"short".to_vec()));
        packet.attributes.push(Attribute::new(1, b"user".to_vec()));

        let token = Token::from_bytes([9; 16]);
        packet.set_state(&token);

        assert_eq!(packet.state(), Some(&[9u8; 16][..]));
        assert_eq!(
            packet.attributes.iter().filter(|a| a.number == STATE).count(),
            1
        );
        assert!(packet.attributes.find(1).is_some());
    }
}
