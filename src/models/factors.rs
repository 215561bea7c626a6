use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;

/// The seven preference factors a caller can weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Factor {
    Rent,
    GroceryCost,
    DeliveryAvailability,
    Aqi,
    Hygiene,
    Amenities,
    Connectivity,
}

/// Which end of a factor's native scale is desirable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

impl Factor {
    pub const COUNT: usize = 7;

    pub const ALL: [Factor; Factor::COUNT] = [
        Factor::Rent,
        Factor::GroceryCost,
        Factor::DeliveryAvailability,
        Factor::Aqi,
        Factor::Hygiene,
        Factor::Amenities,
        Factor::Connectivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::Rent => "rent",
            Factor::GroceryCost => "grocery_cost",
            Factor::DeliveryAvailability => "delivery_availability",
            Factor::Aqi => "aqi",
            Factor::Hygiene => "hygiene",
            Factor::Amenities => "amenities",
            Factor::Connectivity => "connectivity",
        }
    }

    /// Cost-type factors (rent, grocery, transport cost, AQI) are inverted during
    /// normalization so that every factor ends up "higher is better".
    pub fn direction(self) -> Direction {
        match self {
            Factor::Rent | Factor::GroceryCost | Factor::Aqi | Factor::Connectivity => {
                Direction::LowerIsBetter
            }
            Factor::DeliveryAvailability | Factor::Hygiene | Factor::Amenities => {
                Direction::HigherIsBetter
            }
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown factor '{0}'")]
pub struct UnknownFactor(pub String);

impl FromStr for Factor {
    type Err = UnknownFactor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Factor::ALL
            .iter()
            .copied()
            .find(|factor| factor.as_str() == s)
            .ok_or_else(|| UnknownFactor(s.to_string()))
    }
}

/// Fixed-size map with one slot per [`Factor`]
///
/// Serializes as a JSON object keyed by factor name, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorMap<T>([T; Factor::COUNT]);

impl<T: Copy> FactorMap<T> {
    pub fn splat(value: T) -> Self {
        Self([value; Factor::COUNT])
    }
}

impl<T> FactorMap<T> {
    pub fn from_fn(mut f: impl FnMut(Factor) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Factor::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, &T)> + '_ {
        Factor::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Factor, &T) -> U) -> FactorMap<U> {
        FactorMap::from_fn(|factor| f(factor, &self[factor]))
    }
}

impl<T: Default> Default for FactorMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Factor> for FactorMap<T> {
    type Output = T;

    fn index(&self, factor: Factor) -> &T {
        &self.0[factor.index()]
    }
}

impl<T> IndexMut<Factor> for FactorMap<T> {
    fn index_mut(&mut self, factor: Factor) -> &mut T {
        &mut self.0[factor.index()]
    }
}

impl<T: Serialize> Serialize for FactorMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Factor::COUNT))?;
        for (factor, value) in self.iter() {
            map.serialize_entry(factor.as_str(), value)?;
        }
        map.end()
    }
}

/// Errors raised while validating a caller-supplied weight bag
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightError {
    #[error("unknown weight key '{0}' (expected one of: rent, grocery_cost, delivery_availability, aqi, hygiene, amenities, connectivity)")]
    UnknownKey(String),

    #[error("weight for '{factor}' must be >= 0, got {value}")]
    Negative { factor: Factor, value: f64 },

    #[error("weight for '{0}' must be a finite number")]
    NotFinite(Factor),
}

/// Validated, non-negative preference weights indexed by [`Factor`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightVector(FactorMap<f64>);

impl WeightVector {
    pub fn zero() -> Self {
        Self(FactorMap::splat(0.0))
    }

    /// Build a weight vector from a loosely-typed key/value bag.
    ///
    /// Unknown keys are rejected, missing keys default to 0.
    pub fn from_map(weights: &BTreeMap<String, f64>) -> Result<Self, WeightError> {
        let mut vector = Self::zero();
        for (key, &value) in weights {
            let factor =
                Factor::from_str(key).map_err(|_| WeightError::UnknownKey(key.clone()))?;
            vector.set(factor, value)?;
        }
        Ok(vector)
    }

    pub fn set(&mut self, factor: Factor, value: f64) -> Result<(), WeightError> {
        if !value.is_finite() {
            return Err(WeightError::NotFinite(factor));
        }
        if value < 0.0 {
            return Err(WeightError::Negative { factor, value });
        }
        self.0[factor] = value;
        Ok(())
    }

    /// Builder-style setter for known-good literals (tests, defaults)
    pub fn with(mut self, factor: Factor, value: f64) -> Result<Self, WeightError> {
        self.set(factor, value)?;
        Ok(self)
    }

    #[inline]
    pub fn weight(&self, factor: Factor) -> f64 {
        self.0[factor]
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, w)| *w).sum()
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self(FactorMap::from_fn(|factor| match factor {
            Factor::Rent => 0.25,
            Factor::GroceryCost => 0.15,
            Factor::DeliveryAvailability => 0.10,
            Factor::Aqi => 0.15,
            Factor::Hygiene => 0.10,
            Factor::Amenities => 0.15,
            Factor::Connectivity => 0.10,
        }))
    }
}
