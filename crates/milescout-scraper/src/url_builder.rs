//! Search page URL construction.

use milescout_core::{AirportCode, PaymentMode, TravelDate};
use serde::Serialize;

/// One one-way search as the booking site's search page expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightSearchRequest {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub date: TravelDate,
    pub adults: u32,
    pub payment_mode: PaymentMode,
    pub pax: u32,
    pub trip_type: String,
    pub fare_type: String,
    pub locale: String,
    pub cabin: String,
    pub carriers: String,
    pub travel_type: String,
    pub allow_origin_nearby: bool,
    pub allow_destination_nearby: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SliceParam<'a> {
    orig: &'a str,
    orig_nearby: bool,
    dest: &'a str,
    dest_nearby: bool,
    date: String,
}

impl FlightSearchRequest {
    /// Request with the site's defaults for everything but the route, date, party size and payment mode.
    #[must_use]
    pub fn new(
        origin: AirportCode,
        destination: AirportCode,
        date: TravelDate,
        adults: u32,
        payment_mode: PaymentMode,
    ) -> Self {
        Self {
            origin,
            destination,
            date,
            adults,
            payment_mode,
            pax: 1,
            trip_type: "OneWay".to_string(),
            fare_type: "Lowest".to_string(),
            locale: "en_US".to_string(),
            cabin: String::new(),
            carriers: "ALL".to_string(),
            travel_type: "personal".to_string(),
            allow_origin_nearby: false,
            allow_destination_nearby: false,
        }
    }

    /// Same search priced in a different payment mode.
    #[must_use]
    pub fn with_payment_mode(&self, payment_mode: PaymentMode) -> Self {
        Self {
            payment_mode,
            ..self.clone()
        }
    }

    fn query_params(&self) -> [(&'static str, String); 9] {
        [
            ("locale", self.locale.clone()),
            ("fareType", self.fare_type.clone()),
            ("pax", self.pax.to_string()),
            ("adult", self.adults.to_string()),
            ("type", self.trip_type.clone()),
            ("searchType", self.payment_mode.as_str().to_string()),
            ("cabin", self.cabin.clone()),
            ("carriers", self.carriers.clone()),
            ("travelType", self.travel_type.clone()),
        ]
    }

    fn slices_json(&self) -> String {
        let slices = [SliceParam {
            orig: self.origin.as_str(),
            orig_nearby: self.allow_origin_nearby,
            dest: self.destination.as_str(),
            dest_nearby: self.allow_destination_nearby,
            date: self.date.to_string(),
        }];
        // Serializing a fixed struct of strings and bools cannot fail.
        serde_json::to_string(&slices).unwrap_or_default()
    }

    /// Full search URL under `base_url` (e.g. `https://www.aa.com/booking/search`).
    #[must_use]
    pub fn to_url(&self, base_url: &str) -> String {
        let query = self
            .query_params()
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{base_url}?{query}&slices={}",
            urlencoding::encode(&self.slices_json())
        )
    }
}
