use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};

use serde::Deserialize;

use crate::error::Fault;

pub const SLOTS: usize = 4;

/// One addressable byte-stream endpoint: an optional source and an optional
/// sink. A missing side makes the matching operation a fatal fault.
#[derive(Default)]
pub struct Device {
    input: Option<Box<dyn Read>>,
    output: Option<Box<dyn Write>>,
}

pub struct Devices([Device; SLOTS]);

impl Devices {
    /// All four slots inert.
    pub fn empty() -> Self {
        Devices(Default::default())
    }

    /// Slot 0 bound to the process standard streams, slots 1-3 inert.
    pub fn stdio() -> Self {
        let mut devices = Self::empty();
        devices.bind_input(0, Box::new(io::stdin()));
        devices.bind_output(0, Box::new(io::stdout()));
        devices
    }

    pub fn bind_input(&mut self, slot: usize, input: Box<dyn Read>) {
        self.0[slot].input = Some(input);
    }

    pub fn bind_output(&mut self, slot: usize, output: Box<dyn Write>) {
        self.0[slot].output = Some(output);
    }

    pub fn unbind_input(&mut self, slot: usize) {
        self.0[slot].input = None;
    }

    /// Read one byte from a slot. `Ok(None)` is end of stream, which callers
    /// treat as a no-op read.
    pub fn read(&mut self, slot: usize) -> Result<Option<u8>, Fault> {
        let input = self.0[slot]
            .input
            .as_mut()
            .ok_or(Fault::DeviceAbsent(slot))?;
        let mut buf = [0u8; 1];
        match input.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(Fault::DeviceIo(slot, e)),
        }
    }

    pub fn write(&mut self, slot: usize, byte: u8) -> Result<(), Fault> {
        let output = self.0[slot]
            .output
            .as_mut()
            .ok_or(Fault::DeviceAbsent(slot))?;
        output
            .write_all(&[byte])
            .and_then(|()| output.flush())
            .map_err(|e| Fault::DeviceIo(slot, e))
    }
}

/// YAML device map for the CLI: binds slots 1-3 to files ahead of a run.
///
/// ```yaml
/// 1:
///   input: tape.bin
/// 2:
///   output: punch.out
/// ```
#[derive(Debug, Deserialize)]
pub struct DeviceMap(HashMap<usize, DeviceConfig>);

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl DeviceMap {
    pub fn apply(self, devices: &mut Devices) -> io::Result<()> {
        for (slot, config) in self.0 {
            if let Some(path) = config.input {
                devices.bind_input(slot, Box::new(File::open(path)?));
            }
            if let Some(path) = config.output {
                devices.bind_output(slot, Box::new(File::create(path)?));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_until_end_of_stream() {
        let mut devices = Devices::empty();
        devices.bind_input(1, Box::new(&[0x10u8, 0x20][..]));
        assert_eq!(devices.read(1).unwrap(), Some(0x10));
        assert_eq!(devices.read(1).unwrap(), Some(0x20));
        assert_eq!(devices.read(1).unwrap(), None);
    }

    #[test]
    fn absent_device_is_a_fault() {
        let mut devices = Devices::empty();
        assert!(matches!(devices.read(2), Err(Fault::DeviceAbsent(2))));
        assert!(matches!(devices.write(3, 0), Err(Fault::DeviceAbsent(3))));
    }

    #[test]
    fn device_map_parses() {
        let map: DeviceMap = serde_yaml::from_str("1:\n  input: tape.bin\n").unwrap();
        assert_eq!(map.0.len(), 1);
        assert_eq!(map.0[&1].input.as_deref(), Some("tape.bin"));
        assert!(map.0[&1].output.is_none());
    }
}
