//! Tagged layer parameters
//!
//! Every layer owns some subset of a fixed set of parameter slots. The
//! slot name doubles as the checkpoint file prefix.

use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::fmt;

/// Parameter slot a layer may own
///
/// Declaration order is the save/load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamSlot {
    /// Primary weight
    W,
    /// Auxiliary weight 0
    W0,
    /// Auxiliary weight 1
    W1,
    /// Primary bias
    B,
    /// Auxiliary bias 0
    B0,
    /// Auxiliary bias 1
    B1,
}

impl ParamSlot {
    pub const ALL: [ParamSlot; 6] = [
        ParamSlot::W,
        ParamSlot::W0,
        ParamSlot::W1,
        ParamSlot::B,
        ParamSlot::B0,
        ParamSlot::B1,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParamSlot::W => "W",
            ParamSlot::W0 => "W0",
            ParamSlot::W1 => "W1",
            ParamSlot::B => "b",
            ParamSlot::B0 => "b0",
            ParamSlot::B1 => "b1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

impl fmt::Display for ParamSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A layer's checkpointable parameters
pub trait ParamSet {
    /// Array held in `slot`, or `None` if the layer does not own it
    fn param(&self, slot: ParamSlot) -> Option<&ArrayD<f32>>;

    /// Mutable access to the array held in `slot`
    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut ArrayD<f32>>;

    /// Slots this layer owns, in save order
    fn owned_slots(&self) -> Vec<ParamSlot> {
        ParamSlot::ALL
            .into_iter()
            .filter(|&slot| self.param(slot).is_some())
            .collect()
    }
}

/// Map-backed parameter set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerParams {
    params: BTreeMap<ParamSlot, ArrayD<f32>>,
}

impl LayerParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a slot with its initial value
    pub fn with(mut self, slot: ParamSlot, value: ArrayD<f32>) -> Self {
        self.params.insert(slot, value);
        self
    }

    /// Set a slot, returning the previous value
    pub fn insert(&mut self, slot: ParamSlot, value: ArrayD<f32>) -> Option<ArrayD<f32>> {
        self.params.insert(slot, value)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of scalars across all slots
    pub fn num_elements(&self) -> usize {
        self.params.values().map(|a| a.len()).sum()
    }
}

impl ParamSet for LayerParams {
    fn param(&self, slot: ParamSlot) -> Option<&ArrayD<f32>> {
        self.params.get(&slot)
    }

    fn param_mut(&mut self, slot: ParamSlot) -> Option<&mut ArrayD<f32>> {
        self.params.get_mut(&slot)
    }

    fn owned_slots(&self) -> Vec<ParamSlot> {
        self.params.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_slot_names() {
        let names: Vec<_> = ParamSlot::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["W", "W0", "W1", "b", "b0", "b1"]);
        assert_eq!(ParamSlot::from_name("b0"), Some(ParamSlot::B0));
        assert_eq!(ParamSlot::from_name("B"), None);
    }

    #[test]
    fn test_owned_slots_in_schema_order() {
        let layer = LayerParams::new()
            .with(ParamSlot::B, ArrayD::zeros(IxDyn(&[4])))
            .with(ParamSlot::W, ArrayD::zeros(IxDyn(&[4, 3])));
        assert_eq!(layer.owned_slots(), vec![ParamSlot::W, ParamSlot::B]);
        assert_eq!(layer.num_elements(), 16);
        assert!(layer.param(ParamSlot::W1).is_none());
    }
}
