//! Decoded field values, keyed by template letter

use std::fmt;
use std::ops::Index;

/// Values of the named fields of one instruction
///
/// Templates rarely use more than four or five letters, so this is a small
/// vector rather than a hash map. Entries keep the order in which the letters
/// first appear in the template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(char, u64)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a field, if the template declares it
    pub fn get(&self, letter: char) -> Option<u64> {
        self.entries
            .iter()
            .find(|(c, _)| *c == letter)
            .map(|(_, v)| *v)
    }

    /// Insert or replace a field value
    pub fn set(&mut self, letter: char, value: u64) {
        match self.entries.iter_mut().find(|(c, _)| *c == letter) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((letter, value)),
        }
    }

    pub fn contains(&self, letter: char) -> bool {
        self.entries.iter().any(|(c, _)| *c == letter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, u64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Field access for instruction semantics
///
/// # Panics
///
/// Panics if the letter is not part of the instruction's template. Semantics
/// only ever ask for letters of their own template, so this is a bug in the
/// ISA description rather than in the program being simulated.
impl Index<char> for Fields {
    type Output = u64;

    fn index(&self, letter: char) -> &u64 {
        match self.entries.iter().find(|(c, _)| *c == letter) {
            Some((_, value)) => value,
            None => panic!("field '{letter}' is not declared by this template"),
        }
    }
}

impl FromIterator<(char, u64)> for Fields {
    fn from_iter<T: IntoIterator<Item = (char, u64)>>(iter: T) -> Self {
        let mut fields = Fields::new();
        for (letter, value) in iter {
            fields.set(letter, value);
        }
        fields
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(c, v)| format!("{c}={v:#x}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut fields = Fields::new();
        fields.set('d', 8);
        fields.set('i', 4);
        assert_eq!(fields.get('d'), Some(8));
        assert_eq!(fields['i'], 4);
        assert_eq!(fields.get('x'), None);

        fields.set('d', 9);
        assert_eq!(fields['d'], 9);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_order_is_preserved() {
        let fields: Fields = [('s', 1), ('t', 2), ('i', 3)].into_iter().collect();
        let letters: Vec<char> = fields.iter().map(|(c, _)| c).collect();
        assert_eq!(letters, vec!['s', 't', 'i']);
        assert_eq!(fields.to_string(), "{s=0x1, t=0x2, i=0x3}");
    }

    #[test]
    #[should_panic(expected = "field 'q'")]
    fn test_index_missing_field() {
        let fields = Fields::new();
        let _ = fields['q'];
    }
}
