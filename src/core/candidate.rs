use crate::core::normalizer::Desirability;
use crate::models::{Constraint, Factor, FactorMap, Neighborhood};

/// A neighborhood that survived the hard constraints, with the values the
/// later pipeline stages fill in.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub neighborhood: &'a Neighborhood,
    pub rent: f64,
    /// Grocery cost for the whole household
    pub grocery_cost: Option<f64>,
    pub transport_cost: Option<f64>,
    pub travel_distance_km: Option<f64>,
    pub total_monthly_cost: f64,
    /// Raw factor values; `None` means unknown
    pub raw: FactorMap<Option<f64>>,
    pub desirability: FactorMap<Desirability>,
    pub score: f64,
}

impl<'a> Candidate<'a> {
    pub fn new(
        neighborhood: &'a Neighborhood,
        constraint: &Constraint,
        rent: f64,
        travel_distance_km: Option<f64>,
    ) -> Self {
        let metrics = &neighborhood.metrics;
        let people = constraint.number_of_people.max(1) as f64;

        let grocery_cost = known(metrics.grocery_cost_per_person).map(|g| g.max(0.0) * people);
        let transport_cost = known(metrics.transport_cost_monthly).map(|t| t.max(0.0));

        let restaurants_count = metrics.restaurants.map(|r| r.restaurants_count).unwrap_or(0);
        let raw = FactorMap::from_fn(|factor| match factor {
            Factor::Rent => Some(rent),
            Factor::GroceryCost => grocery_cost,
            Factor::DeliveryAvailability => metrics.delivery.map(|d| d.available_count() as f64),
            Factor::Aqi => known(metrics.aqi),
            Factor::Hygiene => known(metrics.restaurants.and_then(|r| r.avg_rating)),
            Factor::Amenities => known(metrics.amenities_score)
                .or_else(|| metrics.amenities.map(|a| a.score(restaurants_count))),
            Factor::Connectivity => transport_cost,
        });

        let total_monthly_cost =
            rent + grocery_cost.unwrap_or(0.0) + transport_cost.unwrap_or(0.0);

        Self {
            neighborhood,
            rent,
            grocery_cost,
            transport_cost,
            travel_distance_km,
            total_monthly_cost,
            raw,
            desirability: FactorMap::default(),
            score: Desirability::NEUTRAL,
        }
    }
}

/// NaN and infinite readings are treated as missing.
#[inline]
fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
