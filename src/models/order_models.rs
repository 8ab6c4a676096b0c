use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalised names of the columns every input file must carry.
pub const REQUIRED_COLUMNS: [&str; 15] = [
    "row_id",
    "order_id",
    "order_date",
    "ship_date",
    "ship_mode",
    "customer_id",
    "segment",
    "region",
    "product_id",
    "category",
    "sub_category",
    "sales",
    "quantity",
    "discount",
    "profit",
];

/// Columns carried by the Superstore export that the analysis ignores.
pub const KNOWN_EXTRA_COLUMNS: [&str; 6] = [
    "customer_name",
    "country",
    "city",
    "state",
    "postal_code",
    "product_name",
];

pub const SHIP_MODES: [&str; 4] = ["Standard Class", "Second Class", "First Class", "Same Day"];
pub const SEGMENTS: [&str; 3] = ["Consumer", "Corporate", "Home Office"];
pub const REGIONS: [&str; 4] = ["East", "West", "Central", "South"];
pub const CATEGORIES: [&str; 3] = ["Furniture", "Office Supplies", "Technology"];
pub const SUB_CATEGORIES: [&str; 17] = [
    "Accessories",
    "Appliances",
    "Art",
    "Binders",
    "Bookcases",
    "Chairs",
    "Copiers",
    "Envelopes",
    "Fasteners",
    "Furnishings",
    "Labels",
    "Machines",
    "Paper",
    "Phones",
    "Storage",
    "Supplies",
    "Tables",
];

/// Categorical columns checked against a closed allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    Segment,
    ShipMode,
    Region,
    Category,
    SubCategory,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 5] = [
        CategoricalField::Segment,
        CategoricalField::ShipMode,
        CategoricalField::Region,
        CategoricalField::Category,
        CategoricalField::SubCategory,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            CategoricalField::Segment => "segment",
            CategoricalField::ShipMode => "ship_mode",
            CategoricalField::Region => "region",
            CategoricalField::Category => "category",
            CategoricalField::SubCategory => "sub_category",
        }
    }

    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            CategoricalField::Segment => &SEGMENTS,
            CategoricalField::ShipMode => &SHIP_MODES,
            CategoricalField::Region => &REGIONS,
            CategoricalField::Category => &CATEGORIES,
            CategoricalField::SubCategory => &SUB_CATEGORIES,
        }
    }

    pub fn is_allowed(&self, value: &str) -> bool {
        self.allowed_values().contains(&value)
    }
}

/// One product line item on an order.
///
/// Categorical fields keep the text as read so that values outside the
/// allow-lists flow through the analysis after being reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub row_id: u64,
    pub order_id: String,
    pub order_date: NaiveDate,
    pub ship_date: NaiveDate,
    pub ship_mode: String,
    pub customer_id: String,
    pub segment: String,
    pub region: String,
    pub product_id: String,
    pub category: String,
    pub sub_category: String,
    pub sales: f64,
    pub quantity: u32,
    pub discount: f64,
    pub profit: f64,
}

/// Half-open discount interval `[k/10, (k+1)/10)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiscountBucket {
    tenths: u8,
}

impl DiscountBucket {
    pub const WIDTH: f64 = 0.1;

    /// Left-closed bucketing; the small epsilon keeps `0.3` from landing
    /// in `[0.2, 0.3)` through `0.3 * 10.0 == 2.9999...`.
    pub fn from_discount(discount: f64) -> Self {
        let index = (discount / Self::WIDTH + 1e-9).floor();
        let tenths = index.clamp(0.0, u8::MAX as f64) as u8;
        DiscountBucket { tenths }
    }

    pub fn lower(&self) -> f64 {
        self.tenths as f64 / 10.0
    }

    pub fn upper(&self) -> f64 {
        (self.tenths as f64 + 1.0) / 10.0
    }

    pub fn contains(&self, discount: f64) -> bool {
        Self::from_discount(discount) == *self
    }

    pub fn label(&self) -> String {
        format!("[{:.1},{:.1})", self.lower(), self.upper())
    }
}

impl fmt::Display for DiscountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Columns computed once per row by the feature deriver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub turnaround: i64,
    pub margin: f64,
    pub discount_bucket: DiscountBucket,
    pub month: Month,
}

impl DerivedFeatures {
    pub fn month_name(&self) -> &'static str {
        self.month.name()
    }

    pub fn month_number(&self) -> u32 {
        self.month.number_from_month()
    }
}

/// An order line plus its derived columns. `order.discount` stays the
/// continuous rate; the bucket lives alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedOrder {
    pub order: OrderLine,
    pub features: DerivedFeatures,
}

/// Model outputs appended after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedOrder {
    pub enriched: EnrichedOrder,
    pub fitted_profit: f64,
    pub residual: f64,
}

pub fn month_of(date: NaiveDate) -> Month {
    // month() is always 1..=12
    Month::try_from(date.month() as u8).unwrap_or(Month::January)
}
