//! Inputs, outputs and their bindings to states and transitions.

use super::error::ModelError;
use super::value::{PlcDataType, PlcValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an [`Input`], assigned in increasing order by the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputId(pub u32);

/// Identity of an [`Output`], assigned in increasing order by the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId(pub u32);

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}", self.0)
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// Location of a value inside a data block image.
///
/// `bit` is only meaningful for BIT signals and is 0 for every other type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub start: u32,
    pub bit: u8,
}

impl Address {
    /// Build an address for a signal of `data_type`, rejecting bit numbers
    /// outside 0-7 for BIT signals.
    pub fn new(data_type: PlcDataType, start: u32, bit: u8) -> Result<Self, ModelError> {
        if data_type.is_bit() {
            if bit > 7 {
                return Err(ModelError::BitAddressOutOfRange { bit });
            }
            Ok(Self { start, bit })
        } else {
            Ok(Self { start, bit: 0 })
        }
    }

    /// First byte past the value stored at this address.
    pub fn end(&self, data_type: PlcDataType) -> usize {
        self.start as usize + data_type.byte_width()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.start, self.bit)
    }
}

/// A PLC input or output declared in the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal<Id> {
    pub id: Id,
    pub name: String,
    pub data_type: PlcDataType,
    pub address: Address,
    pub value: PlcValue,
}

pub type Input = Signal<InputId>;
pub type Output = Signal<OutputId>;

/// Unvalidated signal fields as they arrive from an editor.
///
/// ```rust
/// use plc_conformance::core::{PlcDataType, SignalDraft};
///
/// let draft = SignalDraft::new("start_button", PlcDataType::Bit, 4).bit(2).value("1");
/// assert_eq!(draft.bit_address, 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalDraft {
    pub name: String,
    pub data_type: PlcDataType,
    pub start_address: u32,
    pub bit_address: u8,
    pub value: String,
}

impl SignalDraft {
    pub fn new(name: impl Into<String>, data_type: PlcDataType, start_address: u32) -> Self {
        Self {
            name: name.into(),
            data_type,
            start_address,
            bit_address: 0,
            value: "0".to_string(),
        }
    }

    pub fn bit(mut self, bit_address: u8) -> Self {
        self.bit_address = bit_address;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Validate every field before anything is written to the model.
    pub(crate) fn into_signal<Id>(self, id: Id) -> Result<Signal<Id>, ModelError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        let address = Address::new(self.data_type, self.start_address, self.bit_address)?;
        let value = PlcValue::parse(self.data_type, &self.value)?;
        Ok(Signal {
            id,
            name,
            data_type: self.data_type,
            address,
            value,
        })
    }
}

/// An output bound to a state with the values expected before and after
/// the state's timer condition elapses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateOutput {
    pub output: OutputId,
    pub value_before_time_condition: PlcValue,
    pub value_after_time_condition: PlcValue,
}

impl StateOutput {
    pub fn expected(&self, after_time_condition: bool) -> PlcValue {
        if after_time_condition {
            self.value_after_time_condition
        } else {
            self.value_before_time_condition
        }
    }
}

/// An input bound to a transition with the value the test writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub input: InputId,
    pub value: PlcValue,
}

/// Two or more signals sharing the same address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressConflict<Id> {
    pub address: Address,
    pub signals: Vec<Id>,
}

impl<Id: fmt::Display> fmt::Display for AddressConflict<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.signals.iter().map(ToString::to_string).collect();
        write!(f, "address {} is shared by {}", self.address, ids.join(", "))
    }
}

/// Group signals by address and report every address used more than once.
pub(crate) fn find_conflicts<Id: Copy + Ord>(signals: &[Signal<Id>]) -> Vec<AddressConflict<Id>> {
    let mut by_address: std::collections::BTreeMap<Address, Vec<Id>> = Default::default();
    for signal in signals {
        by_address.entry(signal.address).or_default().push(signal.id);
    }
    by_address
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(address, signals)| AddressConflict { address, signals })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_address_is_checked_only_for_bits() {
        assert!(matches!(
            Address::new(PlcDataType::Bit, 4, 9),
            Err(ModelError::BitAddressOutOfRange { bit: 9 })
        ));
        let word = Address::new(PlcDataType::Word, 4, 9).unwrap();
        assert_eq!(word, Address { start: 4, bit: 0 });
    }

    #[test]
    fn draft_rejects_blank_names_and_bad_values() {
        let blank = SignalDraft::new("  ", PlcDataType::Byte, 0);
        assert!(matches!(blank.into_signal(InputId(0)), Err(ModelError::EmptyName)));

        let bad = SignalDraft::new("level", PlcDataType::Byte, 0).value("300");
        assert!(matches!(bad.into_signal(InputId(0)), Err(ModelError::Value(_))));
    }

    #[test]
    fn conflicts_group_equal_addresses() {
        let make = |id, start, bit| Signal {
            id: InputId(id),
            name: format!("in{id}"),
            data_type: PlcDataType::Bit,
            address: Address { start, bit },
            value: PlcValue::Bit(false),
        };
        let signals = vec![make(0, 0, 0), make(1, 0, 1), make(2, 0, 0)];
        let conflicts = find_conflicts(&signals);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].signals, vec![InputId(0), InputId(2)]);
        assert_eq!(conflicts[0].to_string(), "address 0.0 is shared by I0, I2");
    }

    #[test]
    fn state_output_selects_expected_value() {
        let binding = StateOutput {
            output: OutputId(1),
            value_before_time_condition: PlcValue::Bit(false),
            value_after_time_condition: PlcValue::Bit(true),
        };
        assert_eq!(binding.expected(false), PlcValue::Bit(false));
        assert_eq!(binding.expected(true), PlcValue::Bit(true));
    }
}
