use crate::limit::RateLimiter;
use crate::{UpstreamError, get_json};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PRICES_API_BASE: &str = "https://prices.runescape.wiki/api/v1/osrs";
const PRICE_BUDGET: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct MappingEntry {
    id: i32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    data: HashMap<String, LatestPrice>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestPrice {
    high: Option<i64>,
    low: Option<i64>,
    high_time: Option<i64>,
    low_time: Option<i64>,
}

impl LatestPrice {
    fn most_recent(&self) -> Option<i64> {
        match (self.high, self.low, self.high_time, self.low_time) {
            (Some(high), Some(low), Some(ht), Some(lt)) => {
                Some(if ht > lt { high } else { low })
            }
            (Some(high), _, Some(_), _) => Some(high),
            (_, Some(low), _, Some(_)) => Some(low),
            _ => None,
        }
    }
}

/// Which synthetic-value derivation applies to an untradeable item whose
/// market value is inferred from a related tradeable.
#[derive(Debug, PartialEq)]
enum SyntheticSource {
    /// price(ring) - 3 * price("Chromium ingot")
    Vestige { ring: String },
    /// A third of the assembled item's price.
    ThirdOf(&'static str),
    /// price(a) - price(b)
    Difference(&'static str, &'static str),
    /// price("Confliction gauntlets") - price("Tormented bracelet")
    ///   - 10_000 * price("Demon tear"), floored at 5M.
    MokhaiotlCloth,
}

fn synthetic_source(item_name: &str) -> Option<SyntheticSource> {
    let lower = item_name.to_lowercase();

    if lower.contains("vestige") {
        return Some(SyntheticSource::Vestige {
            ring: lower.replace("vestige", "ring"),
        });
    }
    if matches!(
        lower.as_str(),
        "bludgeon axon" | "bludgeon claw" | "bludgeon spine"
    ) {
        return Some(SyntheticSource::ThirdOf("Abyssal bludgeon"));
    }
    if matches!(lower.as_str(), "hydra's eye" | "hydra's fang" | "hydra's heart") {
        return Some(SyntheticSource::ThirdOf("Brimstone ring"));
    }
    if lower.contains("noxious")
        && ["point", "blade", "pommel"].iter().any(|p| lower.contains(p))
    {
        return Some(SyntheticSource::ThirdOf("Noxious halberd"));
    }
    if lower == "araxyte fang" {
        return Some(SyntheticSource::Difference(
            "Amulet of rancour",
            "Amulet of torture",
        ));
    }
    if lower == "mokhaiotl cloth" {
        return Some(SyntheticSource::MokhaiotlCloth);
    }
    None
}

/// Client for the wiki's real-time Grand Exchange pricing API. Keeps the
/// (large, slow-moving) id mapping cached for name lookups.
#[derive(Clone)]
pub struct PricingApi {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    mapping: Arc<Mutex<Option<HashMap<String, i32>>>>,
}

impl PricingApi {
    pub fn new(client: reqwest::Client, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            limiter,
            mapping: Arc::new(Mutex::new(None)),
        }
    }

    async fn item_id_by_name(&self, name: &str) -> Result<Option<i32>, UpstreamError> {
        let mut mapping = self.mapping.lock().await;
        if mapping.is_none() {
            let request = self.client.get(format!("{PRICES_API_BASE}/mapping"));
            let entries: Vec<MappingEntry> =
                get_json(&self.client, &self.limiter, PRICE_BUDGET, request).await?;
            *mapping = Some(
                entries
                    .into_iter()
                    .map(|e| (e.name.to_lowercase(), e.id))
                    .collect(),
            );
        }
        Ok(mapping
            .as_ref()
            .and_then(|m| m.get(&name.to_lowercase()).copied()))
    }

    pub async fn latest_price_by_id(&self, item_id: i32) -> Result<Option<i64>, UpstreamError> {
        let request = self
            .client
            .get(format!("{PRICES_API_BASE}/latest"))
            .query(&[("id", item_id)]);
        let response: LatestResponse =
            get_json(&self.client, &self.limiter, PRICE_BUDGET, request).await?;
        Ok(response
            .data
            .get(&item_id.to_string())
            .and_then(LatestPrice::most_recent))
    }

    pub async fn latest_price_by_name(&self, name: &str) -> Result<Option<i64>, UpstreamError> {
        match self.item_id_by_name(name).await? {
            Some(id) => self.latest_price_by_id(id).await,
            None => Ok(None),
        }
    }

    /// The true value of an item, accounting for untradeables whose market
    /// value is inferred from a related tradeable minus components. Falls
    /// back to the declared value whenever a derivation cannot be priced.
    pub async fn true_item_value(
        &self,
        item_name: &str,
        declared_value: i64,
    ) -> Result<i64, UpstreamError> {
        let Some(source) = synthetic_source(item_name) else {
            return Ok(declared_value);
        };

        let derived = match source {
            SyntheticSource::Vestige { ring } => {
                let ring_price = self.latest_price_by_name(&ring).await?;
                let ingot_price = self.latest_price_by_name("Chromium ingot").await?;
                match (ring_price, ingot_price) {
                    (Some(ring), Some(ingot)) => Some(ring - ingot * 3),
                    _ => None,
                }
            }
            SyntheticSource::ThirdOf(assembled) => self
                .latest_price_by_name(assembled)
                .await?
                .map(|price| price / 3),
            SyntheticSource::Difference(a, b) => {
                let a = self.latest_price_by_name(a).await?;
                let b = self.latest_price_by_name(b).await?;
                match (a, b) {
                    (Some(a), Some(b)) => Some(a - b),
                    _ => None,
                }
            }
            SyntheticSource::MokhaiotlCloth => {
                let gauntlets = self.latest_price_by_name("Confliction gauntlets").await?;
                let bracelet = self.latest_price_by_name("Tormented bracelet").await?;
                let tear = self.latest_price_by_name("Demon tear").await?;
                match (gauntlets, bracelet, tear) {
                    (Some(g), Some(b), Some(t)) => Some((g - b - t * 10_000).max(5_000_000)),
                    // The cloth has a known floor even when pricing is down.
                    _ => Some(5_000_000),
                }
            }
        };

        Ok(derived.unwrap_or(declared_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_synthetic_value_families() {
        assert_eq!(
            synthetic_source("Ultor vestige"),
            Some(SyntheticSource::Vestige {
                ring: "ultor ring".to_string()
            })
        );
        assert_eq!(
            synthetic_source("Bludgeon claw"),
            Some(SyntheticSource::ThirdOf("Abyssal bludgeon"))
        );
        assert_eq!(
            synthetic_source("Hydra's eye"),
            Some(SyntheticSource::ThirdOf("Brimstone ring"))
        );
        assert_eq!(
            synthetic_source("Noxious blade"),
            Some(SyntheticSource::ThirdOf("Noxious halberd"))
        );
        assert_eq!(
            synthetic_source("Araxyte fang"),
            Some(SyntheticSource::Difference(
                "Amulet of rancour",
                "Amulet of torture"
            ))
        );
        assert_eq!(
            synthetic_source("Mokhaiotl cloth"),
            Some(SyntheticSource::MokhaiotlCloth)
        );
        assert_eq!(synthetic_source("Dragon med helm"), None);
        // A complete halberd is not a piece.
        assert_eq!(synthetic_source("Noxious halberd"), None);
    }

    #[test]
    fn most_recent_price_prefers_the_newer_side() {
        let price = LatestPrice {
            high: Some(100),
            low: Some(90),
            high_time: Some(10),
            low_time: Some(20),
        };
        assert_eq!(price.most_recent(), Some(90));

        let price = LatestPrice {
            high: Some(100),
            low: None,
            high_time: Some(10),
            low_time: None,
        };
        assert_eq!(price.most_recent(), Some(100));

        let price = LatestPrice {
            high: None,
            low: None,
            high_time: None,
            low_time: None,
        };
        assert_eq!(price.most_recent(), None);
    }
}
