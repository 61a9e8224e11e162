use indexmap::IndexMap;

use crate::error::Error;

/// Label table. `None` marks a label that was referenced but not yet given
/// an address, so pass 2 can tell a forward reference from a missing
/// declaration. Insertion order is kept for the dump file.
#[derive(Debug, Default)]
pub struct Labels {
    table: IndexMap<String, Option<u16>>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a label to a concrete address. Rebinding is a fatal
    /// duplicate-definition error.
    pub fn bind(&mut self, name: &str, addr: u16, line: usize) -> Result<(), Error> {
        match self.table.get(name) {
            Some(Some(_)) => Err(Error::DuplicateLabel(line, name.to_string())),
            _ => {
                self.table.insert(name.to_string(), Some(addr));
                Ok(())
            }
        }
    }

    /// Record a reference without resolving it (pass 1 forward reference).
    pub fn reference(&mut self, name: &str) {
        self.table.entry(name.to_string()).or_insert(None);
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.table.get(name).copied().flatten()
    }

    /// Resolved labels in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.table
            .iter()
            .filter_map(|(k, v)| v.map(|addr| (k.as_str(), addr)))
    }
}
